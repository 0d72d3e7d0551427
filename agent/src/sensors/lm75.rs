//! LM75 digital temperature sensor

use crate::errors::SenseError;
use crate::hardware::i2c::{check_address, I2cTransport};
use crate::sensors::measurement::{Measurement, MeasurementResult, Quantity, QuantityKind};
use crate::sensors::{SensorDriver, SensorKind};

const REG_TEMPERATURE: u8 = 0x00;

/// 9-bit two's complement, left-aligned, 0.5 °C per LSB
pub fn decode_temperature(raw: u16) -> f32 {
    f32::from((raw as i16) >> 7) * 0.5
}

/// LM75 driver
pub struct Lm75<T: I2cTransport> {
    transport: T,
    bus_path: String,
    address: u8,
}

impl<T: I2cTransport> Lm75<T> {
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
        let raw = self.transport.read_word_be(REG_TEMPERATURE)?;
        Ok(decode_temperature(raw))
    }
}

impl<T: I2cTransport> SensorDriver for Lm75<T> {
    fn kind(&self) -> SensorKind {
        SensorKind::Lm75
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
            SensorKind::Lm75,
            self.address,
            &self.bus_path,
            vec![Quantity::new(QuantityKind::Temperature, f64::from(temperature))],
        ))
    }
}
