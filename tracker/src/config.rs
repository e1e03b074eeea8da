use crate::connection::ConnectionSettings;
use crate::integrator::AxisOffset;
use crate::transport::Endpoint;
use crate::TrackerError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub path: String,
    /// Milliseconds between reconnect attempts.
    pub retry_interval_ms: u64,
    pub settle_delay_ms: u64,
    pub connect_timeout_ms: u64,
    pub greeting: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            host: "192.168.1.213".to_string(),
            port: 8765,
            path: "/".to_string(),
            retry_interval_ms: 5000,
            settle_delay_ms: 100,
            connect_timeout_ms: 2000,
            greeting: "ESP32 Connected".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorConfig {
    pub address: u8,
    pub offset: AxisOffset,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorsConfig {
    pub i2c_bus: String,
    pub primary: SensorConfig,
    /// Read last in every pass.
    pub secondary: SensorConfig,
    pub window_depth: usize,
    /// Raw counts per degree per second (131 at ±250 °/s).
    pub sensitivity_divisor: i32,
}

impl Default for SensorsConfig {
    fn default() -> Self {
        SensorsConfig {
            i2c_bus: "/dev/i2c-1".to_string(),
            primary: SensorConfig {
                address: 0x68,
                offset: AxisOffset::new(5, 0, 0),
            },
            secondary: SensorConfig {
                address: 0x69,
                offset: AxisOffset::new(0, 1, 0),
            },
            window_depth: 8,
            sensitivity_divisor: 131,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResetConfig {
    /// sysfs GPIO number of the reset button, if wired.
    pub gpio: Option<u32>,
    /// sysfs GPIO number of the reset indicator LED.
    pub indicator_gpio: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    pub server: ServerConfig,
    pub sensors: SensorsConfig,
    pub reset: ResetConfig,
    /// Stream telemetry; when off, tick throughput is logged instead.
    pub telemetry_enabled: bool,
    /// Log both sensors' angles on every tick, at info level.
    pub log_angles: bool,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        TrackerConfig {
            server: ServerConfig::default(),
            sensors: SensorsConfig::default(),
            reset: ResetConfig::default(),
            telemetry_enabled: true,
            log_angles: true,
        }
    }
}

impl TrackerConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, TrackerError> {
        let config: TrackerConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, TrackerError> {
        let text = fs::read_to_string(path).map_err(|e| {
            TrackerError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<(), TrackerError> {
        if self.sensors.window_depth == 0 {
            return Err(TrackerError::Config("window_depth must be at least 1".to_string()));
        }
        if self.sensors.sensitivity_divisor == 0 {
            return Err(TrackerError::Config("sensitivity_divisor must be non-zero".to_string()));
        }
        if self.sensors.primary.address == self.sensors.secondary.address {
            return Err(TrackerError::Config(format!(
                "both sensors use address {:#04x}",
                self.sensors.primary.address
            )));
        }
        if self.server.host.trim().is_empty() {
            return Err(TrackerError::Config("server host is empty".to_string()));
        }
        Ok(())
    }

    pub fn endpoint(&self) -> Endpoint {
        let path = if self.server.path.starts_with('/') {
            self.server.path.clone()
        } else {
            format!("/{}", self.server.path)
        };
        Endpoint {
            host: self.server.host.clone(),
            port: self.server.port,
            path,
        }
    }

    pub fn connection_settings(&self) -> ConnectionSettings {
        ConnectionSettings {
            endpoint: self.endpoint(),
            retry_interval_ms: self.server.retry_interval_ms,
            settle_delay: Duration::from_millis(self.server.settle_delay_ms),
            greeting: self.server.greeting.clone(),
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.server.connect_timeout_ms)
    }

    pub fn offsets(&self) -> [AxisOffset; 2] {
        [self.sensors.primary.offset, self.sensors.secondary.offset]
    }
}
