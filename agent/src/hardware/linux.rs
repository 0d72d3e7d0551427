//! Native transport over the Linux i2c-dev interface
//!
//! Only available on Linux with the `hardware` feature.

use i2cdev::core::I2CDevice;
use i2cdev::linux::LinuxI2CDevice;
use tracing::debug;

use crate::errors::SenseError;
use crate::hardware::i2c::I2cTransport;

/// An open `/dev/i2c-*` handle bound to one slave address.
///
/// The file descriptor is closed when the value is dropped.
pub struct LinuxTransport {
    device: LinuxI2CDevice,
    bus_path: String,
    address: u8,
}

impl LinuxTransport {
    /// Open `bus_path` and select `address`
    pub fn open(bus_path: &str, address: u8) -> Result<Self, SenseError> {
        let device = LinuxI2CDevice::new(bus_path, u16::from(address)).map_err(|e| {
            SenseError::TransactionFailure(format!(
                "cannot open {} at {:#04x}: {}",
                bus_path, address, e
            ))
        })?;

        debug!("Opened {} at {:#04x}", bus_path, address);
        Ok(Self {
            device,
            bus_path: bus_path.to_string(),
            address,
        })
    }

    pub fn bus_path(&self) -> &str {
        &self.bus_path
    }
}

impl I2cTransport for LinuxTransport {
    fn address(&self) -> u8 {
        self.address
    }

    fn write(&mut self, data: &[u8]) -> Result<(), SenseError> {
        self.device.write(data).map_err(|e| {
            SenseError::TransactionFailure(format!(
                "write to {} at {:#04x} failed: {}",
                self.bus_path, self.address, e
            ))
        })
    }

    fn read(&mut self, buffer: &mut [u8]) -> Result<(), SenseError> {
        self.device.read(buffer).map_err(|e| {
            SenseError::TransactionFailure(format!(
                "read from {} at {:#04x} failed: {}",
                self.bus_path, self.address, e
            ))
        })
    }
}

impl Drop for LinuxTransport {
    fn drop(&mut self) {
        debug!("Closing {} at {:#04x}", self.bus_path, self.address);
    }
}
