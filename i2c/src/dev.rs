//! I2C driver for bus adapters exposed by the kernel as `/dev/i2c-*`
//! character devices, using the `i2cdev` library.
//!
//! The `i2c-dev` kernel module must be loaded (on Raspberry Pi OS, enable
//! I2C in `raspi-config`).

use crate::{I2cBus, I2cDriver, I2cError, I2cResult};
use i2cdev::core::I2CDevice;
use i2cdev::linux::{LinuxI2CDevice, LinuxI2CError};
use log::debug;
use std::fmt::{Debug, Formatter};

/// An I2C adapter reachable through `/dev/i2c-<bus>`.
///
/// Construction stores the bus number only; the device node is first touched
/// by [`I2cDriver::open`].
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct LinuxI2cDriver {
    bus: u8,
}

impl LinuxI2cDriver {
    pub fn new(bus: u8) -> Self {
        Self { bus }
    }

    /// Number of the bus this driver opens.
    pub fn bus(&self) -> u8 {
        self.bus
    }

    fn path(&self) -> String {
        format!("/dev/i2c-{}", self.bus)
    }
}

impl From<LinuxI2CError> for I2cError {
    fn from(err: LinuxI2CError) -> Self {
        I2cError::Bus(err.to_string())
    }
}

impl I2cDriver for LinuxI2cDriver {
    fn open(&self, address: u8) -> I2cResult<Box<dyn I2cBus + '_>> {
        debug!("Opening {} for slave 0x{:02x}", self.path(), address);
        let dev = LinuxI2CDevice::new(self.path(), address as u16)?;
        Ok(Box::new(LinuxI2cBus {
            bus: self.bus,
            address,
            dev,
        }))
    }
}

struct LinuxI2cBus {
    bus: u8,
    address: u8,
    dev: LinuxI2CDevice,
}

impl Debug for LinuxI2cBus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "LinuxI2cBus(/dev/i2c-{}, 0x{:02x})", self.bus, self.address)
    }
}

impl I2cBus for LinuxI2cBus {
    fn write(&mut self, data: &[u8]) -> I2cResult<()> {
        self.dev.write(data)?;
        Ok(())
    }
}
