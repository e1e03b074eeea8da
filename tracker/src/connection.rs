//! Transport lifecycle: connect, detect loss, throttled reconnect.
//!
//! The manager never blocks the control loop longer than one bounded
//! transport call, and it attempts at most one reconnect per retry interval.

use crate::clock::SharedClock;
use crate::telemetry::TelemetryRecord;
use crate::transport::{Endpoint, EventSink, Transport, TransportEvent};
use crate::TrackerError;
use log::{debug, info, warn};
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connected,
}

#[derive(Debug, Clone)]
pub struct ConnectionSettings {
    pub endpoint: Endpoint,
    /// Minimum time between two connect attempts.
    pub retry_interval_ms: u64,
    /// Pause between closing a stale handle and reopening.
    pub settle_delay: Duration,
    /// Sent once after every successful connect.
    pub greeting: String,
}

/// Event sink holding the link state.
#[derive(Debug)]
struct LinkStatus {
    state: ConnectionState,
}

impl EventSink for LinkStatus {
    fn on_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Opened => {
                info!("Connection opened");
                self.state = ConnectionState::Connected;
            }
            TransportEvent::Closed => {
                info!("Connection closed");
                self.state = ConnectionState::Disconnected;
            }
            TransportEvent::Ping => debug!("Got a ping"),
            TransportEvent::Pong => debug!("Got a pong"),
            TransportEvent::Message(text) => info!("Got message from server: {}", text),
        }
    }
}

pub struct ConnectionManager<T: Transport> {
    transport: T,
    status: LinkStatus,
    settings: ConnectionSettings,
    clock: SharedClock,
    last_attempt_ms: Option<u64>,
    attempts: u64,
}

impl<T: Transport> ConnectionManager<T> {
    pub fn new(transport: T, settings: ConnectionSettings, clock: SharedClock) -> Self {
        ConnectionManager {
            transport,
            status: LinkStatus {
                state: ConnectionState::Disconnected,
            },
            settings,
            clock,
            last_attempt_ms: None,
            attempts: 0,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.status.state
    }

    pub fn is_connected(&self) -> bool {
        self.status.state == ConnectionState::Connected
    }

    /// Clock reading of the most recent connect attempt.
    pub fn last_attempt_ms(&self) -> Option<u64> {
        self.last_attempt_ms
    }

    pub fn attempts(&self) -> u64 {
        self.attempts
    }

    pub fn settings(&self) -> &ConnectionSettings {
        &self.settings
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Opens a fresh connection, closing any existing handle first.
    ///
    /// The attempt time is stamped whatever the outcome. Returns whether the
    /// connection is now open.
    pub fn connect(&mut self) -> bool {
        self.last_attempt_ms = Some(self.clock.now_ms());
        self.attempts += 1;
        info!("Connecting to WebSocket server at {}", self.settings.endpoint);

        if self.transport.is_open() {
            self.transport.close();
            if !self.settings.settle_delay.is_zero() {
                thread::sleep(self.settings.settle_delay);
            }
        }

        match self.transport.connect(&self.settings.endpoint) {
            Ok(()) => {
                info!("Connected to WebSocket server");
                self.status.state = ConnectionState::Connected;
                if let Err(e) = self.transport.send(&self.settings.greeting) {
                    warn!("Failed to send greeting: {}", e);
                }
                true
            }
            Err(e) => {
                warn!("Failed to connect to WebSocket server: {}", e);
                self.status.state = ConnectionState::Disconnected;
                false
            }
        }
    }

    /// Attempts a reconnect when disconnected and the retry interval has
    /// passed since the last attempt. Returns whether an attempt was made.
    pub fn tick(&mut self) -> bool {
        if self.is_connected() {
            return false;
        }
        let now = self.clock.now_ms();
        if let Some(last) = self.last_attempt_ms {
            if now.saturating_sub(last) < self.settings.retry_interval_ms {
                return false;
            }
        }
        info!("Not connected, attempting to reconnect...");
        self.connect();
        true
    }

    /// Dispatches pending transport events to the link state.
    pub fn poll(&mut self) {
        self.transport.poll(&mut self.status);
    }

    /// Sends one record. Only valid while connected.
    ///
    /// A failed send on a transport that no longer reports itself open drops
    /// the link to `Disconnected`, handing recovery to [`Self::tick`].
    pub fn send(&mut self, record: &TelemetryRecord) -> Result<(), TrackerError> {
        if !self.is_connected() {
            return Err(TrackerError::NotConnected);
        }
        let json = record.to_json()?;
        if let Err(e) = self.transport.send(&json) {
            if !self.transport.is_open() {
                info!("Transport lost while sending");
                self.status.state = ConnectionState::Disconnected;
            }
            return Err(e.into());
        }
        Ok(())
    }

    /// Sends when connected, otherwise gives the throttled reconnect a turn.
    /// Returns whether the record went out.
    pub fn service(&mut self, record: &TelemetryRecord) -> bool {
        if !self.is_connected() {
            self.tick();
            return false;
        }
        self.poll();
        match self.send(record) {
            Ok(()) => true,
            Err(TrackerError::NotConnected) => false,
            Err(e) => {
                debug!("Telemetry dropped: {}", e);
                false
            }
        }
    }
}
