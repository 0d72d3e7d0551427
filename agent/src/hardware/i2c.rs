//! Byte-level I2C transport

use std::time::Duration;

use crate::errors::SenseError;

/// A handle to one device (bus + 7-bit address).
///
/// Each call is a complete bus transaction. Implementations are not safe for
/// interleaved use by several drivers on the same bus; see
/// [`crate::hardware::lock::BusLocks`].
pub trait I2cTransport: Send {
    /// 7-bit address this handle talks to
    fn address(&self) -> u8;

    /// START - ADDR(W) - DATA - STOP
    fn write(&mut self, data: &[u8]) -> Result<(), SenseError>;

    /// START - ADDR(R) - DATA - STOP
    fn read(&mut self, buffer: &mut [u8]) -> Result<(), SenseError>;

    /// Write a register pointer, then read from it
    fn write_read(&mut self, data: &[u8], buffer: &mut [u8]) -> Result<(), SenseError> {
        self.write(data)?;
        self.read(buffer)
    }

    /// SMBus write-byte-data
    fn write_byte_data(&mut self, register: u8, value: u8) -> Result<(), SenseError> {
        self.write(&[register, value])
    }

    /// SMBus read-word-data (low byte first)
    fn read_word_le(&mut self, register: u8) -> Result<u16, SenseError> {
        let mut buffer = [0u8; 2];
        self.write_read(&[register], &mut buffer)?;
        Ok(u16::from_le_bytes(buffer))
    }

    /// Register read of a big-endian 16-bit value
    fn read_word_be(&mut self, register: u8) -> Result<u16, SenseError> {
        let mut buffer = [0u8; 2];
        self.write_read(&[register], &mut buffer)?;
        Ok(u16::from_be_bytes(buffer))
    }

    /// Wait for a conversion to finish
    fn delay(&mut self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

impl<T: I2cTransport + ?Sized> I2cTransport for Box<T> {
    fn address(&self) -> u8 {
        (**self).address()
    }

    fn write(&mut self, data: &[u8]) -> Result<(), SenseError> {
        (**self).write(data)
    }

    fn read(&mut self, buffer: &mut [u8]) -> Result<(), SenseError> {
        (**self).read(buffer)
    }

    fn write_read(&mut self, data: &[u8], buffer: &mut [u8]) -> Result<(), SenseError> {
        (**self).write_read(data, buffer)
    }

    fn write_byte_data(&mut self, register: u8, value: u8) -> Result<(), SenseError> {
        (**self).write_byte_data(register, value)
    }

    fn read_word_le(&mut self, register: u8) -> Result<u16, SenseError> {
        (**self).read_word_le(register)
    }

    fn read_word_be(&mut self, register: u8) -> Result<u16, SenseError> {
        (**self).read_word_be(register)
    }

    fn delay(&mut self, duration: Duration) {
        (**self).delay(duration)
    }
}

/// Type-erased transport used by drivers opened from configuration
pub type BoxedTransport = Box<dyn I2cTransport>;

/// Reject addresses outside the 7-bit range
pub fn check_address(address: u16) -> Result<u8, SenseError> {
    u8::try_from(address)
        .ok()
        .filter(|addr| *addr <= 0x7f)
        .ok_or(SenseError::InvalidAddress(address))
}

/// Open the native transport for `address` on `bus_path`
#[cfg(all(feature = "hardware", target_os = "linux"))]
pub fn open_transport(bus_path: &str, address: u8) -> Result<BoxedTransport, SenseError> {
    let transport = crate::hardware::linux::LinuxTransport::open(bus_path, address)?;
    Ok(Box::new(transport))
}

/// Open the native transport for `address` on `bus_path`
#[cfg(not(all(feature = "hardware", target_os = "linux")))]
pub fn open_transport(bus_path: &str, address: u8) -> Result<BoxedTransport, SenseError> {
    Err(SenseError::Unsupported(format!(
        "cannot open {} at {:#04x}: native I2C support is not compiled in",
        bus_path, address
    )))
}

/// Common I2C device addresses
pub mod addresses {
    /// AM2315 humidity/temperature sensor
    pub const AM2315: u8 = 0x5c;

    /// BMP180 pressure/temperature sensor
    pub const BMP180: u8 = 0x77;

    /// MPL115A2 pressure/temperature sensor
    pub const MPL115A2: u8 = 0x60;

    /// TSL2561 light sensor, ADDR pin floating
    pub const TSL2561: u8 = 0x39;

    /// TSL2561 light sensor, ADDR pin tied low
    pub const TSL2561_LOW: u8 = 0x29;

    /// TSL2561 light sensor, ADDR pin tied high
    pub const TSL2561_HIGH: u8 = 0x49;

    /// MCP9808 temperature sensor
    pub const MCP9808: u8 = 0x18;

    /// LM75 temperature sensor
    pub const LM75: u8 = 0x48;
}
