use i2cdev::core::I2CDevice;
use i2cdev::linux::LinuxI2CDevice;
use log::{debug, warn};
use std::fmt;
use std::thread;
use std::time::Duration;
// Import types from the shared traits crate
use gyro_traits::{GyroBus, GyroError, RateSample};

mod registers;
pub use registers::{ClockSource, GyroRange};
use registers::{ConfigRegisters, Constants, GyroRegisters, WHO_AM_I_VALUE};

pub const PRIMARY_ADDR: u8 = Constants::DefaultI2cAddr as u8; // AD0 low
pub const SECONDARY_ADDR: u8 = Constants::AlternateI2cAddr as u8; // AD0 high

/// Errors for MPU-6050 operations. (Local)
#[derive(Debug)]
pub enum Error {
    I2c(String),
    InvalidChipId(u8),
    ShortRead,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::I2c(e) => write!(f, "I2C error: {}", e),
            Error::InvalidChipId(id) => write!(f, "Invalid chip ID {:#04x}", id),
            Error::ShortRead => write!(f, "Short read from gyro registers"),
        }
    }
}

impl std::error::Error for Error {}

// Map local Error to GyroError
impl From<Error> for GyroError {
    fn from(err: Error) -> Self {
        match err {
            Error::I2c(e) => GyroError::DeviceError(format!("I2C error: {}", e)),
            Error::InvalidChipId(id) => {
                GyroError::ConfigurationError(format!("Invalid chip ID {:#04x}", id))
            }
            Error::ShortRead => GyroError::ReadError("MPU-6050 short read".to_string()),
        }
    }
}

fn i2c_error<E: fmt::Display>(err: E) -> Error {
    Error::I2c(err.to_string())
}

/// Low-level MPU-6050 driver for a single device.
pub struct Mpu6050<D: I2CDevice> {
    i2c: D,
    range: GyroRange,
}

impl<D: I2CDevice> Mpu6050<D> {
    /// Wakes the device and configures the gyroscope.
    ///
    /// The clock is taken from the Z gyro PLL, which is more stable than the
    /// internal oscillator, and the range is fixed at ±250 °/s.
    pub fn new(mut i2c: D) -> Result<Self, Error> {
        debug!("Initializing Mpu6050...");

        let who_am_i = i2c
            .smbus_read_byte_data(ConfigRegisters::WhoAmI as u8)
            .map_err(i2c_error)?;
        if who_am_i & 0x7E != WHO_AM_I_VALUE {
            return Err(Error::InvalidChipId(who_am_i));
        }
        debug!("Mpu6050 chip ID verified: 0x{:02X}", who_am_i);

        i2c.smbus_write_byte_data(ConfigRegisters::PwrMgmt1 as u8, ClockSource::PllGyroZ as u8)
            .map_err(i2c_error)?;
        thread::sleep(Duration::from_millis(10));

        let mut imu = Mpu6050 {
            i2c,
            range: GyroRange::Dps250,
        };
        imu.set_range(GyroRange::Dps250)?;
        Ok(imu)
    }

    pub fn set_range(&mut self, range: GyroRange) -> Result<(), Error> {
        self.i2c
            .smbus_write_byte_data(ConfigRegisters::GyroConfig as u8, range as u8)
            .map_err(i2c_error)?;
        self.range = range;
        Ok(())
    }

    pub fn range(&self) -> GyroRange {
        self.range
    }

    /// Burst-reads GYRO_XOUT_H..GYRO_ZOUT_L without converting.
    pub fn read_raw_gyroscope(&mut self) -> Result<[u8; 6], Error> {
        self.i2c
            .write(&[GyroRegisters::XoutH as u8])
            .map_err(i2c_error)?;
        let mut buf = [0u8; 6];
        self.i2c.read(&mut buf).map_err(i2c_error)?;
        Ok(buf)
    }

    /// Reads the gyroscope and scales it to degrees per second.
    pub fn read_gyroscope_dps(&mut self) -> Result<[f32; 3], Error> {
        let raw = RateSample::from_be_bytes(self.read_raw_gyroscope()?);
        let scale = self.range.counts_per_dps();
        Ok([
            raw.x as f32 / scale,
            raw.y as f32 / scale,
            raw.z as f32 / scale,
        ])
    }
}

/// All gyroscopes sharing one I2C bus, keyed by device address.
pub struct Mpu6050Bus<D: I2CDevice> {
    devices: Vec<(u8, Mpu6050<D>)>,
}

impl Mpu6050Bus<LinuxI2CDevice> {
    /// Opens and configures one device per address on `i2c_path`.
    pub fn open(i2c_path: &str, addresses: &[u8]) -> Result<Self, Error> {
        let mut devices = Vec::with_capacity(addresses.len());
        for &address in addresses {
            let i2c = LinuxI2CDevice::new(i2c_path, address as u16).map_err(i2c_error)?;
            debug!("Opened {} at 0x{:02X}", i2c_path, address);
            devices.push((address, Mpu6050::new(i2c)?));
        }
        Ok(Mpu6050Bus { devices })
    }
}

impl<D: I2CDevice> Mpu6050Bus<D> {
    pub fn from_devices(devices: Vec<(u8, Mpu6050<D>)>) -> Self {
        Mpu6050Bus { devices }
    }

    pub fn device_mut(&mut self, address: u8) -> Option<&mut Mpu6050<D>> {
        self.devices
            .iter_mut()
            .find(|(addr, _)| *addr == address)
            .map(|(_, device)| device)
    }
}

impl<D: I2CDevice> GyroBus for Mpu6050Bus<D> {
    fn read_raw_rate(&mut self, address: u8) -> Result<[u8; 6], GyroError> {
        let device = self
            .device_mut(address)
            .ok_or(GyroError::UnknownDevice(address))?;
        device.read_raw_gyroscope().map_err(|e| {
            warn!("Failed to read gyroscope at 0x{:02X}: {}", address, e);
            GyroError::from(e)
        })
    }
}
