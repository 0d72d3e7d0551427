//! AM2315 humidity/temperature sensor
//!
//! The sensor answers a Modbus-style register read with an 8-byte frame:
//! `[function, length, hum_hi, hum_lo, tmp_hi, tmp_lo, crc_lo, crc_hi]`.
//! The CRC covers the first six bytes.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::errors::SenseError;
use crate::hardware::i2c::{check_address, I2cTransport};
use crate::sensors::measurement::{Measurement, MeasurementResult, Quantity, QuantityKind};
use crate::sensors::{SensorDriver, SensorKind};

/// Modbus function code: read registers
const CMD_READ_REGISTERS: u8 = 0x03;

/// First register (humidity high byte)
const REG_START: u8 = 0x00;

/// Humidity and temperature, two bytes each
const REG_COUNT: u8 = 0x04;

const FRAME_LEN: usize = 8;

/// The sensor sleeps between reads and NACKs the wake-up write
const WAKEUP_DELAY: Duration = Duration::from_micros(900);

const CONVERSION_DELAY: Duration = Duration::from_millis(10);

/// What to do with a frame whose checksum does not match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "mode")]
pub enum ChecksumPolicy {
    /// Return the decoded values with `crc_valid = false`
    #[default]
    Advisory,

    /// Repeat the transaction up to `attempts` more times, then behave as `Advisory`
    Retry { attempts: u8 },

    /// Fail the read with `ChecksumMismatch`
    Reject,
}

/// One AM2315 reading
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HumidityReading {
    /// Degrees Celsius
    pub temperature: f32,

    /// Percent relative humidity
    pub humidity: f32,

    /// Frame checksum and header matched
    pub crc_valid: bool,
}

/// CRC-16/MODBUS: init 0xFFFF, reflected polynomial 0xA001
pub fn crc16(data: &[u8]) -> u16 {
    data.iter().fold(0xFFFF_u16, |crc, byte| {
        (0..8).fold(crc ^ u16::from(*byte), |crc, _| {
            if crc & 0x0001 != 0 {
                (crc >> 1) ^ 0xA001
            } else {
                crc >> 1
            }
        })
    })
}

/// Decode a response frame. Never fails: integrity is reported in `crc_valid`.
pub fn decode_frame(frame: &[u8; FRAME_LEN]) -> (HumidityReading, u16, u16) {
    let humidity = f32::from(u16::from_be_bytes([frame[2], frame[3]])) / 10.0;

    // Sign-magnitude: bit 7 of the high byte is the sign
    let magnitude = f32::from(u16::from_be_bytes([frame[4] & 0x7f, frame[5]])) / 10.0;
    let temperature = if frame[4] & 0x80 != 0 { -magnitude } else { magnitude };

    let expected = u16::from_le_bytes([frame[6], frame[7]]);
    let computed = crc16(&frame[..6]);
    let header_ok = frame[0] == CMD_READ_REGISTERS && frame[1] == REG_COUNT;

    (
        HumidityReading {
            temperature,
            humidity,
            crc_valid: header_ok && expected == computed,
        },
        expected,
        computed,
    )
}

/// AM2315 driver
pub struct Am2315<T: I2cTransport> {
    transport: T,
    bus_path: String,
    address: u8,
    policy: ChecksumPolicy,
}

impl<T: I2cTransport> Am2315<T> {
    /// Create a driver. No bus traffic happens until the first read.
    pub fn new(bus_path: impl Into<String>, transport: T) -> Result<Self, SenseError> {
        let address = check_address(u16::from(transport.address()))?;
        Ok(Self {
            transport,
            bus_path: bus_path.into(),
            address,
            policy: ChecksumPolicy::default(),
        })
    }

    pub fn with_checksum_policy(mut self, policy: ChecksumPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn checksum_policy(&self) -> ChecksumPolicy {
        self.policy
    }

    /// Read temperature and humidity, applying the checksum policy
    pub fn read(&mut self) -> Result<HumidityReading, SenseError> {
        let extra_attempts = match self.policy {
            ChecksumPolicy::Retry { attempts } => attempts,
            _ => 0,
        };

        let mut attempt = 0;
        loop {
            let (reading, expected, computed) = self.transact()?;
            if reading.crc_valid {
                return Ok(reading);
            }

            match self.policy {
                ChecksumPolicy::Reject => {
                    return Err(SenseError::ChecksumMismatch { expected, computed });
                }
                ChecksumPolicy::Retry { .. } if attempt < extra_attempts => {
                    attempt += 1;
                    debug!(
                        "AM2315 {:#04x} checksum mismatch, retry {}/{}",
                        self.address, attempt, extra_attempts
                    );
                }
                _ => {
                    warn!(
                        "AM2315 {:#04x} checksum mismatch (expected {:#06x}, computed {:#06x})",
                        self.address, expected, computed
                    );
                    return Ok(reading);
                }
            }
        }
    }

    /// Degrees Celsius; checksum validity is discarded
    pub fn temperature(&mut self) -> Result<f32, SenseError> {
        Ok(self.read()?.temperature)
    }

    /// Percent relative humidity; checksum validity is discarded
    pub fn humidity(&mut self) -> Result<f32, SenseError> {
        Ok(self.read()?.humidity)
    }

    fn transact(&mut self) -> Result<(HumidityReading, u16, u16), SenseError> {
        // Wake-up: the sleeping sensor does not acknowledge this write
        let _ = self.transport.write(&[0x00]);
        self.transport.delay(WAKEUP_DELAY);

        self.transport
            .write(&[CMD_READ_REGISTERS, REG_START, REG_COUNT])?;
        self.transport.delay(CONVERSION_DELAY);

        let mut frame = [0u8; FRAME_LEN];
        self.transport.read(&mut frame)?;
        debug!("AM2315 {:#04x} frame: {:02x?}", self.address, frame);

        Ok(decode_frame(&frame))
    }
}

impl<T: I2cTransport> SensorDriver for Am2315<T> {
    fn kind(&self) -> SensorKind {
        SensorKind::Am2315
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
            SensorKind::Am2315,
            self.address,
            &self.bus_path,
            vec![
                Quantity::new(QuantityKind::Temperature, f64::from(reading.temperature)),
                Quantity::new(QuantityKind::RelativeHumidity, f64::from(reading.humidity)),
            ],
        )
        .with_checksum(reading.crc_valid))
    }
}
