use num_derive::{FromPrimitive, ToPrimitive};

#[derive(Debug, Clone, Copy, FromPrimitive, ToPrimitive)]
pub enum ConfigRegisters {
    SmplrtDiv = 0x19,
    Config = 0x1A,
    GyroConfig = 0x1B,
    PwrMgmt1 = 0x6B,
    WhoAmI = 0x75,
}

#[derive(Debug, Clone, Copy, FromPrimitive, ToPrimitive)]
pub enum GyroRegisters {
    XoutH = 0x43,
    XoutL = 0x44,
    YoutH = 0x45,
    YoutL = 0x46,
    ZoutH = 0x47,
    ZoutL = 0x48,
}

/// PWR_MGMT_1 clock source selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive, ToPrimitive)]
pub enum ClockSource {
    Internal8Mhz = 0x00,
    PllGyroX = 0x01,
    PllGyroY = 0x02,
    PllGyroZ = 0x03,
}

/// GYRO_CONFIG full-scale range, FS_SEL in bits 4:3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive, ToPrimitive)]
pub enum GyroRange {
    Dps250 = 0x00,
    Dps500 = 0x08,
    Dps1000 = 0x10,
    Dps2000 = 0x18,
}

impl GyroRange {
    /// Raw counts per degree per second.
    pub fn counts_per_dps(self) -> f32 {
        match self {
            GyroRange::Dps250 => 131.0,
            GyroRange::Dps500 => 65.5,
            GyroRange::Dps1000 => 32.8,
            GyroRange::Dps2000 => 16.4,
        }
    }
}

#[derive(Debug, Clone, Copy, FromPrimitive, ToPrimitive)]
pub enum Constants {
    DefaultI2cAddr = 0x68,
    AlternateI2cAddr = 0x69,
}

/// WHO_AM_I bits 6:1; reads the same whichever way AD0 is strapped.
pub const WHO_AM_I_VALUE: u8 = 0x68;
