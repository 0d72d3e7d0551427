//! MPL115A2 barometric pressure/temperature sensor
//!
//! Compensation follows Freescale AN3785:
//! `Pcomp = a0 + (b1 + c12 * Tadc) * Padc + b2 * Tadc`.

use std::time::Duration;

use tracing::debug;

use crate::errors::SenseError;
use crate::hardware::i2c::{check_address, I2cTransport};
use crate::sensors::measurement::{Measurement, MeasurementResult, Quantity, QuantityKind};
use crate::sensors::{SensorDriver, SensorKind};

const REG_PADC: u8 = 0x00;
const REG_A0: u8 = 0x04;
const COEFFICIENTS_LEN: usize = 8;
const CMD_CONVERT: u8 = 0x12;

const CONVERSION_DELAY: Duration = Duration::from_millis(3);

/// Compensation coefficients, already scaled from their fixed-point encodings
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coefficients {
    pub a0: f64,
    pub b1: f64,
    pub b2: f64,
    pub c12: f64,
}

impl Coefficients {
    /// Decode the 8-byte coefficient block at 0x04.
    ///
    /// a0 is Q12.3, b1 is Q2.13, b2 is Q1.14 and c12 is a 14-bit value
    /// scaled by 2^-22.
    pub fn from_bytes(raw: &[u8; COEFFICIENTS_LEN]) -> Result<Self, SenseError> {
        if raw.iter().all(|b| *b == 0x00) || raw.iter().all(|b| *b == 0xFF) {
            return Err(SenseError::CalibrationReadFailure(
                "MPL115A2 coefficient block is blank".to_string(),
            ));
        }

        let word = |i: usize| i16::from_be_bytes([raw[i], raw[i + 1]]);
        Ok(Self {
            a0: f64::from(word(0)) / 8.0,
            b1: f64::from(word(2)) / 8192.0,
            b2: f64::from(word(4)) / 16384.0,
            c12: f64::from(word(6) >> 2) / 4_194_304.0,
        })
    }

    /// Compensated pressure count, 0..=1023 over the 50..115 kPa range
    pub fn compensate(&self, padc: u16, tadc: u16) -> f64 {
        let padc = f64::from(padc);
        let tadc = f64::from(tadc);
        self.a0 + (self.b1 + self.c12 * tadc) * padc + self.b2 * tadc
    }

    /// Pressure in kPa
    pub fn pressure_kpa(&self, padc: u16, tadc: u16) -> f64 {
        self.compensate(padc, tadc) * ((115.0 - 50.0) / 1023.0) + 50.0
    }
}

/// Temperature in °C from the raw temperature count (-5.35 counts/°C, 498 at 25 °C)
pub fn temperature_from_adc(tadc: u16) -> f64 {
    (f64::from(tadc) - 498.0) / -5.35 + 25.0
}

/// One MPL115A2 reading
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PressureReading {
    /// Degrees Celsius
    pub temperature: f64,

    /// Kilopascal
    pub pressure: f64,
}

/// MPL115A2 driver
pub struct Mpl115a2<T: I2cTransport> {
    transport: T,
    bus_path: String,
    address: u8,
    coefficients: Coefficients,
}

impl<T: I2cTransport> Mpl115a2<T> {
    /// Create a driver and read its coefficients.
    ///
    /// Fails with `CalibrationReadFailure` when the coefficients cannot be read.
    pub fn new(bus_path: impl Into<String>, mut transport: T) -> Result<Self, SenseError> {
        let address = check_address(u16::from(transport.address()))?;

        let mut raw = [0u8; COEFFICIENTS_LEN];
        transport
            .write_read(&[REG_A0], &mut raw)
            .map_err(|e| SenseError::CalibrationReadFailure(e.to_string()))?;
        let coefficients = Coefficients::from_bytes(&raw)?;
        debug!("MPL115A2 {:#04x} coefficients: {:?}", address, coefficients);

        Ok(Self {
            transport,
            bus_path: bus_path.into(),
            address,
            coefficients,
        })
    }

    pub fn coefficients(&self) -> &Coefficients {
        &self.coefficients
    }

    /// Temperature and pressure from one conversion
    pub fn read(&mut self) -> Result<PressureReading, SenseError> {
        let (padc, tadc) = self.convert()?;
        Ok(PressureReading {
            temperature: temperature_from_adc(tadc),
            pressure: self.coefficients.pressure_kpa(padc, tadc),
        })
    }

    /// Degrees Celsius
    pub fn temperature(&mut self) -> Result<f64, SenseError> {
        Ok(self.read()?.temperature)
    }

    /// Kilopascal
    pub fn pressure(&mut self) -> Result<f64, SenseError> {
        Ok(self.read()?.pressure)
    }

    fn convert(&mut self) -> Result<(u16, u16), SenseError> {
        self.transport.write(&[CMD_CONVERT, 0x00])?;
        self.transport.delay(CONVERSION_DELAY);

        let mut raw = [0u8; 4];
        self.transport.write_read(&[REG_PADC], &mut raw)?;

        // 10-bit results, left-aligned in 16 bits
        let padc = u16::from_be_bytes([raw[0], raw[1]]) >> 6;
        let tadc = u16::from_be_bytes([raw[2], raw[3]]) >> 6;
        debug!("MPL115A2 {:#04x} Padc={} Tadc={}", self.address, padc, tadc);
        Ok((padc, tadc))
    }
}

impl<T: I2cTransport> SensorDriver for Mpl115a2<T> {
    fn kind(&self) -> SensorKind {
        SensorKind::Mpl115a2
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
            SensorKind::Mpl115a2,
            self.address,
            &self.bus_path,
            vec![
                Quantity::new(QuantityKind::Temperature, reading.temperature),
                // Reported in Pa like the other barometer
                Quantity::new(QuantityKind::Pressure, reading.pressure * 1000.0),
            ],
        ))
    }
}
