//! MCP9808 digital temperature sensor

use crate::errors::SenseError;
use crate::hardware::i2c::{check_address, I2cTransport};
use crate::sensors::measurement::{Measurement, MeasurementResult, Quantity, QuantityKind};
use crate::sensors::{SensorDriver, SensorKind};

const REG_AMBIENT: u8 = 0x05;
const REG_MANUFACTURER_ID: u8 = 0x06;
const REG_DEVICE_ID: u8 = 0x07;

/// Microchip manufacturer ID
pub const MANUFACTURER_ID: u16 = 0x0054;

/// Ambient temperature register to °C.
///
/// Bits 15..13 are alert flags, bit 12 is the sign, bits 11..0 are 1/16 °C.
pub fn decode_ambient(raw: u16) -> f32 {
    let value = raw & 0x1FFF;
    if value & 0x1000 != 0 {
        f32::from(value) / 16.0 - 512.0
    } else {
        f32::from(value) / 16.0
    }
}

/// MCP9808 driver
pub struct Mcp9808<T: I2cTransport> {
    transport: T,
    bus_path: String,
    address: u8,
}

impl<T: I2cTransport> Mcp9808<T> {
    pub fn new(bus_path: impl Into<String>, transport: T) -> Result<Self, SenseError> {
        let address = check_address(u16::from(transport.address()))?;
        Ok(Self {
            transport,
            bus_path: bus_path.into(),
            address,
        })
    }

    /// Degrees Celsius
    pub fn temperature(&mut self) -> Result<f32, SenseError> {
        let raw = self.transport.read_word_be(REG_AMBIENT)?;
        Ok(decode_ambient(raw))
    }

    /// (manufacturer ID, device ID/revision)
    pub fn identify(&mut self) -> Result<(u16, u16), SenseError> {
        let manufacturer = self.transport.read_word_be(REG_MANUFACTURER_ID)?;
        let device = self.transport.read_word_be(REG_DEVICE_ID)?;
        Ok((manufacturer, device))
    }
}

impl<T: I2cTransport> SensorDriver for Mcp9808<T> {
    fn kind(&self) -> SensorKind {
        SensorKind::Mcp9808
    }

    fn address(&self) -> u8 {
        self.address
    }

    fn bus_path(&self) -> &str {
        &self.bus_path
    }

    fn measure(&mut self) -> MeasurementResult {
        let temperature = self.temperature()?;
        Ok(Measurement::new(
            SensorKind::Mcp9808,
            self.address,
            &self.bus_path,
            vec![Quantity::new(QuantityKind::Temperature, f64::from(temperature))],
        ))
    }
}
