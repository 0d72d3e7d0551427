//! BMP180 barometric pressure/temperature sensor
//!
//! Eleven calibration words are read once when the driver is created. Every
//! reading runs a temperature conversion followed, for pressure, by a
//! pressure conversion, and compensates both with the integer algorithm from
//! the Bosch datasheet.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::SenseError;
use crate::hardware::i2c::{check_address, I2cTransport};
use crate::sensors::measurement::{Measurement, MeasurementResult, Quantity, QuantityKind};
use crate::sensors::{SensorDriver, SensorKind};

const REG_CALIBRATION: u8 = 0xAA;
const CALIBRATION_LEN: usize = 22;
const REG_CONTROL: u8 = 0xF4;
const REG_RESULT: u8 = 0xF6;
const CMD_TEMPERATURE: u8 = 0x2E;
const CMD_PRESSURE: u8 = 0x34;

const TEMPERATURE_DELAY: Duration = Duration::from_micros(4500);

/// Standard sea-level pressure in Pa
pub const SEA_LEVEL_PA: f64 = 101_325.0;

/// Pressure oversampling setting (`oss`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Oversampling {
    UltraLowPower,
    #[default]
    Standard,
    HighResolution,
    UltraHighResolution,
}

impl Oversampling {
    pub fn oss(&self) -> u8 {
        match self {
            Oversampling::UltraLowPower => 0,
            Oversampling::Standard => 1,
            Oversampling::HighResolution => 2,
            Oversampling::UltraHighResolution => 3,
        }
    }

    /// Maximum conversion time
    pub fn conversion_time(&self) -> Duration {
        match self {
            Oversampling::UltraLowPower => Duration::from_micros(4500),
            Oversampling::Standard => Duration::from_micros(7500),
            Oversampling::HighResolution => Duration::from_micros(13500),
            Oversampling::UltraHighResolution => Duration::from_micros(25500),
        }
    }
}

/// Factory calibration coefficients
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Calibration {
    pub ac1: i16,
    pub ac2: i16,
    pub ac3: i16,
    pub ac4: u16,
    pub ac5: u16,
    pub ac6: u16,
    pub b1: i16,
    pub b2: i16,
    pub mb: i16,
    pub mc: i16,
    pub md: i16,
}

impl Calibration {
    /// Decode the 22-byte big-endian calibration block.
    ///
    /// A word of 0x0000 or 0xFFFF means the EEPROM did not answer.
    pub fn from_bytes(raw: &[u8; CALIBRATION_LEN]) -> Result<Self, SenseError> {
        let words: Vec<u16> = raw
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();

        if let Some(index) = words.iter().position(|w| *w == 0x0000 || *w == 0xFFFF) {
            return Err(SenseError::CalibrationReadFailure(format!(
                "BMP180 calibration word {} is {:#06x}",
                index, words[index]
            )));
        }

        Ok(Self {
            ac1: words[0] as i16,
            ac2: words[1] as i16,
            ac3: words[2] as i16,
            ac4: words[3],
            ac5: words[4],
            ac6: words[5],
            b1: words[6] as i16,
            b2: words[7] as i16,
            mb: words[8] as i16,
            mc: words[9] as i16,
            md: words[10] as i16,
        })
    }

    /// Intermediate temperature term shared by both compensations
    fn b5(&self, ut: i64) -> Result<i64, SenseError> {
        let x1 = ((ut - i64::from(self.ac6)) * i64::from(self.ac5)) >> 15;
        let denominator = x1 + i64::from(self.md);
        if denominator == 0 {
            return Err(SenseError::TransactionFailure(
                "BMP180 temperature compensation diverged".to_string(),
            ));
        }
        let x2 = (i64::from(self.mc) << 11) / denominator;
        Ok(x1 + x2)
    }

    /// Temperature in units of 0.1 °C
    pub fn compensate_temperature(&self, ut: i64) -> Result<i64, SenseError> {
        Ok((self.b5(ut)? + 8) >> 4)
    }

    /// Pressure in Pa
    pub fn compensate_pressure(&self, ut: i64, up: i64, oss: u8) -> Result<i64, SenseError> {
        let b6 = self.b5(ut)? - 4000;

        let x1 = (i64::from(self.b2) * ((b6 * b6) >> 12)) >> 11;
        let x2 = (i64::from(self.ac2) * b6) >> 11;
        let x3 = x1 + x2;
        let b3 = (((i64::from(self.ac1) * 4 + x3) << oss) + 2) >> 2;

        let x1 = (i64::from(self.ac3) * b6) >> 13;
        let x2 = (i64::from(self.b1) * ((b6 * b6) >> 12)) >> 16;
        let x3 = ((x1 + x2) + 2) >> 2;
        let b4 = (i64::from(self.ac4) * (x3 + 32768)) >> 15;
        if b4 == 0 {
            return Err(SenseError::TransactionFailure(
                "BMP180 pressure compensation diverged".to_string(),
            ));
        }

        let b7 = (up - b3) * (50000 >> oss);
        let p = (b7 * 2) / b4;

        let x1 = (p >> 8) * (p >> 8);
        let x1 = (x1 * 3038) >> 16;
        let x2 = (-7357 * p) >> 16;
        Ok(p + ((x1 + x2 + 3791) >> 4))
    }
}

/// Altitude in metres for pressure `pressure_pa` given sea-level pressure `sea_level_pa`
pub fn altitude(pressure_pa: f64, sea_level_pa: f64) -> f64 {
    44330.0 * (1.0 - (pressure_pa / sea_level_pa).powf(1.0 / 5.255))
}

/// One BMP180 reading
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BarometerReading {
    /// Degrees Celsius
    pub temperature: f32,

    /// Pascal
    pub pressure: i64,

    /// Metres above the reference pressure level
    pub altitude: f64,
}

/// BMP180 driver
pub struct Bmp180<T: I2cTransport> {
    transport: T,
    bus_path: String,
    address: u8,
    calibration: Calibration,
    oversampling: Oversampling,
    sea_level_pa: f64,
}

impl<T: I2cTransport> Bmp180<T> {
    /// Create a driver and read its calibration block.
    ///
    /// Fails with `CalibrationReadFailure` when the block cannot be read or is
    /// blank; no driver exists in that case.
    pub fn new(bus_path: impl Into<String>, mut transport: T) -> Result<Self, SenseError> {
        let address = check_address(u16::from(transport.address()))?;

        let mut raw = [0u8; CALIBRATION_LEN];
        transport
            .write_read(&[REG_CALIBRATION], &mut raw)
            .map_err(|e| SenseError::CalibrationReadFailure(e.to_string()))?;
        let calibration = Calibration::from_bytes(&raw)?;
        debug!("BMP180 {:#04x} calibration: {:?}", address, calibration);

        Ok(Self {
            transport,
            bus_path: bus_path.into(),
            address,
            calibration,
            oversampling: Oversampling::default(),
            sea_level_pa: SEA_LEVEL_PA,
        })
    }

    pub fn with_oversampling(mut self, oversampling: Oversampling) -> Self {
        self.oversampling = oversampling;
        self
    }

    pub fn with_sea_level_pressure(mut self, sea_level_pa: f64) -> Self {
        self.sea_level_pa = sea_level_pa;
        self
    }

    pub fn calibration(&self) -> &Calibration {
        &self.calibration
    }

    /// Degrees Celsius
    pub fn temperature(&mut self) -> Result<f32, SenseError> {
        let ut = self.read_raw_temperature()?;
        Ok(self.calibration.compensate_temperature(ut)? as f32 / 10.0)
    }

    /// Pascal
    pub fn pressure(&mut self) -> Result<i64, SenseError> {
        Ok(self.read()?.pressure)
    }

    /// Metres above the configured sea-level pressure
    pub fn altitude(&mut self) -> Result<f64, SenseError> {
        Ok(self.read()?.altitude)
    }

    /// Temperature, pressure and altitude from one conversion pair
    pub fn read(&mut self) -> Result<BarometerReading, SenseError> {
        let ut = self.read_raw_temperature()?;
        let up = self.read_raw_pressure()?;
        let oss = self.oversampling.oss();

        let temperature = self.calibration.compensate_temperature(ut)? as f32 / 10.0;
        let pressure = self.calibration.compensate_pressure(ut, up, oss)?;
        debug!(
            "BMP180 {:#04x} UT={} UP={} -> {} C, {} Pa",
            self.address, ut, up, temperature, pressure
        );

        Ok(BarometerReading {
            temperature,
            pressure,
            altitude: altitude(pressure as f64, self.sea_level_pa),
        })
    }

    fn read_raw_temperature(&mut self) -> Result<i64, SenseError> {
        self.transport.write(&[REG_CONTROL, CMD_TEMPERATURE])?;
        self.transport.delay(TEMPERATURE_DELAY);
        Ok(i64::from(self.transport.read_word_be(REG_RESULT)?))
    }

    fn read_raw_pressure(&mut self) -> Result<i64, SenseError> {
        let oss = self.oversampling.oss();
        self.transport
            .write(&[REG_CONTROL, CMD_PRESSURE + (oss << 6)])?;
        self.transport.delay(self.oversampling.conversion_time());

        let mut raw = [0u8; 3];
        self.transport.write_read(&[REG_RESULT], &mut raw)?;
        let up = (i64::from(raw[0]) << 16) | (i64::from(raw[1]) << 8) | i64::from(raw[2]);
        Ok(up >> (8 - oss))
    }
}

impl<T: I2cTransport> SensorDriver for Bmp180<T> {
    fn kind(&self) -> SensorKind {
        SensorKind::Bmp180
    }

    fn address(&self) -> u8 {
        self.address
    }

    fn bus_path(&self) -> &str {
        &self.bus_path
    }

    fn measure(&mut self) -> MeasurementResult {
        let reading = self.read()?;
        Ok(Measurement::new(
            SensorKind::Bmp180,
            self.address,
            &self.bus_path,
            vec![
                Quantity::new(QuantityKind::Temperature, f64::from(reading.temperature)),
                Quantity::new(QuantityKind::Pressure, reading.pressure as f64),
                Quantity::new(QuantityKind::Altitude, reading.altitude),
            ],
        ))
    }
}
