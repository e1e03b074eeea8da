use byteorder::{BigEndian, ByteOrder};
use std::error::Error as StdError;
use std::fmt;

// --- Basic Types ---

/// One raw angular-rate reading, in sensor-native units.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RateSample {
    pub x: i16,
    pub y: i16,
    pub z: i16,
}

impl RateSample {
    pub const fn new(x: i16, y: i16, z: i16) -> Self {
        RateSample { x, y, z }
    }

    /// Decodes the six bytes of a gyro burst read: big-endian x, y, z pairs.
    pub fn from_be_bytes(bytes: [u8; 6]) -> Self {
        RateSample {
            x: BigEndian::read_i16(&bytes[0..2]),
            y: BigEndian::read_i16(&bytes[2..4]),
            z: BigEndian::read_i16(&bytes[4..6]),
        }
    }
}

impl fmt::Display for RateSample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RateSample(x={}, y={}, z={})", self.x, self.y, self.z)
    }
}

// --- Standard Error Type ---
#[derive(Debug)]
pub enum GyroError {
    /// Error originating from the underlying bus communication (I2C)
    DeviceError(String),
    /// Error reading data from the device
    ReadError(String),
    /// Error writing configuration to the device
    WriteError(String),
    /// Error during device configuration or setup
    ConfigurationError(String),
    /// No device was opened at the requested address
    UnknownDevice(u8),
}

impl fmt::Display for GyroError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GyroError::DeviceError(s) => write!(f, "Device error: {}", s),
            GyroError::ReadError(s) => write!(f, "Read error: {}", s),
            GyroError::WriteError(s) => write!(f, "Write error: {}", s),
            GyroError::ConfigurationError(s) => write!(f, "Configuration error: {}", s),
            GyroError::UnknownDevice(addr) => write!(f, "No gyro at address {:#04x}", addr),
        }
    }
}

impl StdError for GyroError {}

/// A bus carrying one or more gyroscopes, addressed by device address.
///
/// Bus setup and register configuration belong to the implementor; callers
/// only ever pull the six raw rate bytes of a device.
pub trait GyroBus {
    /// Reads the six raw rate bytes (x, y, z big-endian pairs) of one device.
    fn read_raw_rate(&mut self, address: u8) -> Result<[u8; 6], GyroError>;

    fn read_rate(&mut self, address: u8) -> Result<RateSample, GyroError> {
        self.read_raw_rate(address).map(RateSample::from_be_bytes)
    }
}

impl<B: GyroBus + ?Sized> GyroBus for Box<B> {
    fn read_raw_rate(&mut self, address: u8) -> Result<[u8; 6], GyroError> {
        (**self).read_raw_rate(address)
    }
}
