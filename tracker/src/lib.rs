//! Dual-gyro orientation tracker.
//!
//! Two gyroscopes are sampled once per control-loop pass. Their raw rates are
//! averaged over a shared window, integrated into cumulative angles, and the
//! primary sensor's angles are streamed to a host over WebSocket. Transport
//! loss never stalls integration: telemetry is dropped while disconnected and
//! reconnects are throttled.
//!
//! ```text
//! GyroBus ─▶ SampleAverager ─▶ OrientationIntegrator ─▶ TelemetryRecord ─▶ ConnectionManager
//!                 (per pass)        (per tick)              (per tick)        (send / retry)
//! ```

use std::error::Error as StdError;
use std::fmt;

pub mod averager;
pub mod clock;
pub mod config;
pub mod connection;
pub mod integrator;
pub mod scheduler;
pub mod telemetry;
pub mod transport;
pub mod trigger;
pub mod ws;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use averager::{Reduction, SampleAverager};
pub use clock::{Clock, MonotonicClock, SharedClock};
pub use config::TrackerConfig;
pub use connection::{ConnectionManager, ConnectionState};
pub use gyro_traits::{GyroBus, GyroError, RateSample};
pub use integrator::{Angles, AxisOffset, OrientationIntegrator, OrientationState};
pub use scheduler::{ThroughputCounter, TickScheduler};
pub use telemetry::TelemetryRecord;
pub use transport::{EventSink, Transport, TransportError, TransportEvent};
pub use trigger::{NoTrigger, ResetTrigger, SysfsGpioTrigger};
pub use ws::WsTransport;

/// Identity of one of the two gyroscopes.
///
/// `Secondary` is read last in every pass; `Primary` is the reference sensor
/// whose angles are transmitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SensorId {
    Primary,
    Secondary,
}

impl SensorId {
    /// Bus read order within a pass.
    pub const ALL: [SensorId; 2] = [SensorId::Primary, SensorId::Secondary];

    pub(crate) fn index(self) -> usize {
        match self {
            SensorId::Primary => 0,
            SensorId::Secondary => 1,
        }
    }
}

impl fmt::Display for SensorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SensorId::Primary => write!(f, "primary"),
            SensorId::Secondary => write!(f, "secondary"),
        }
    }
}

#[derive(Debug)]
pub enum TrackerError {
    /// Transport failure while connecting or sending
    Transport(TransportError),
    /// Telemetry record could not be encoded
    Encode(serde_json::Error),
    /// Invalid or unreadable configuration
    Config(String),
    /// Operation requires an open connection
    NotConnected,
}

impl fmt::Display for TrackerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackerError::Transport(e) => write!(f, "Transport error: {}", e),
            TrackerError::Encode(e) => write!(f, "Encode error: {}", e),
            TrackerError::Config(s) => write!(f, "Configuration error: {}", s),
            TrackerError::NotConnected => write!(f, "Not connected"),
        }
    }
}

impl StdError for TrackerError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            TrackerError::Transport(e) => Some(e),
            TrackerError::Encode(e) => Some(e),
            TrackerError::Config(_) | TrackerError::NotConnected => None,
        }
    }
}

impl From<TransportError> for TrackerError {
    fn from(error: TransportError) -> Self {
        TrackerError::Transport(error)
    }
}

impl From<serde_json::Error> for TrackerError {
    fn from(error: serde_json::Error) -> Self {
        TrackerError::Encode(error)
    }
}

impl From<toml::de::Error> for TrackerError {
    fn from(error: toml::de::Error) -> Self {
        TrackerError::Config(error.to_string())
    }
}
