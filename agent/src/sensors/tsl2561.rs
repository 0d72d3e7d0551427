//! TSL2561 light-to-digital converter
//!
//! Gain and integration time changes are staged and written to the timing
//! register at the start of the next read. Lux uses the integer
//! approximation from the TAOS datasheet.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::SenseError;
use crate::hardware::i2c::{check_address, I2cTransport};
use crate::sensors::acquisition::{AcquisitionEvent, AcquisitionFsm, AcquisitionState};
use crate::sensors::measurement::{Measurement, MeasurementResult, Quantity, QuantityKind};
use crate::sensors::{SensorDriver, SensorKind};

const CMD_BIT: u8 = 0x80;
const WORD_BIT: u8 = 0x20;

const REG_CONTROL: u8 = 0x00;
const REG_TIMING: u8 = 0x01;
const REG_CH0_LOW: u8 = 0x0C;
const REG_CH1_LOW: u8 = 0x0E;

const POWER_ON: u8 = 0x03;
const POWER_OFF: u8 = 0x00;

const LUX_SCALE: u32 = 14;
const RATIO_SCALE: u32 = 9;
const CH_SCALE: u32 = 10;
const CH_SCALE_TINT0: u64 = 0x7517;
const CH_SCALE_TINT1: u64 = 0x0FE7;

/// Integration time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntegrationTime {
    #[serde(rename = "13ms")]
    Ms13,
    #[serde(rename = "101ms")]
    Ms101,
    #[default]
    #[serde(rename = "402ms")]
    Ms402,
}

impl IntegrationTime {
    fn bits(&self) -> u8 {
        match self {
            IntegrationTime::Ms13 => 0x00,
            IntegrationTime::Ms101 => 0x01,
            IntegrationTime::Ms402 => 0x02,
        }
    }

    /// Time to wait for the ADC, with margin
    fn wait(&self) -> Duration {
        match self {
            IntegrationTime::Ms13 => Duration::from_millis(14),
            IntegrationTime::Ms101 => Duration::from_millis(102),
            IntegrationTime::Ms402 => Duration::from_millis(403),
        }
    }

    /// Autogain window (low, high) on channel 0
    fn autogain_window(&self) -> (u16, u16) {
        match self {
            IntegrationTime::Ms13 => (100, 4850),
            IntegrationTime::Ms101 => (200, 36000),
            IntegrationTime::Ms402 => (500, 63000),
        }
    }

    /// Counts above which a channel is considered clipped
    fn clipping_threshold(&self) -> u16 {
        match self {
            IntegrationTime::Ms13 => 4900,
            IntegrationTime::Ms101 => 37000,
            IntegrationTime::Ms402 => 65000,
        }
    }
}

/// Analog gain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gain {
    #[default]
    #[serde(rename = "1x")]
    X1,
    #[serde(rename = "16x")]
    X16,
}

impl Gain {
    fn bits(&self) -> u8 {
        match self {
            Gain::X1 => 0x00,
            Gain::X16 => 0x10,
        }
    }
}

/// Package variant; selects the lux coefficient table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Package {
    /// T, FN and CL packages
    #[default]
    T,
    /// ChipScale package
    Cs,
}

/// (ratio break point, b, m)
const T_COEFFICIENTS: [(u64, u64, u64); 8] = [
    (0x0040, 0x01F2, 0x01BE),
    (0x0080, 0x0214, 0x02D1),
    (0x00C0, 0x023F, 0x037B),
    (0x0100, 0x0270, 0x03FE),
    (0x0138, 0x016F, 0x01FC),
    (0x019A, 0x00D2, 0x00FB),
    (0x029A, 0x0018, 0x0012),
    (0x029A, 0x0000, 0x0000),
];

const CS_COEFFICIENTS: [(u64, u64, u64); 8] = [
    (0x0043, 0x0204, 0x01AD),
    (0x0085, 0x0228, 0x02C1),
    (0x00C8, 0x0253, 0x0363),
    (0x010A, 0x0282, 0x03DF),
    (0x014D, 0x0177, 0x01DD),
    (0x019A, 0x0101, 0x0127),
    (0x029A, 0x0037, 0x002B),
    (0x029A, 0x0000, 0x0000),
];

/// Acquisition settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LightSettings {
    #[serde(default)]
    pub gain: Gain,

    #[serde(default)]
    pub integration_time: IntegrationTime,

    #[serde(default)]
    pub autogain: bool,

    #[serde(default)]
    pub package: Package,
}

/// Raw channel counts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Luminosity {
    /// Channel 0: visible + infrared
    pub broadband: u16,

    /// Channel 1: infrared only
    pub infrared: u16,
}

/// Integer lux approximation for counts taken with `settings`
pub fn compute_lux(settings: &LightSettings, luminosity: Luminosity) -> u64 {
    let mut ch_scale = match settings.integration_time {
        IntegrationTime::Ms13 => CH_SCALE_TINT0,
        IntegrationTime::Ms101 => CH_SCALE_TINT1,
        IntegrationTime::Ms402 => 1 << CH_SCALE,
    };

    // Nominal is 16x; scale 1x up
    if settings.gain == Gain::X1 {
        ch_scale <<= 4;
    }

    let channel0 = (u64::from(luminosity.broadband) * ch_scale) >> CH_SCALE;
    let channel1 = (u64::from(luminosity.infrared) * ch_scale) >> CH_SCALE;

    let ratio1 = if channel0 != 0 {
        (channel1 << (RATIO_SCALE + 1)) / channel0
    } else {
        0
    };
    let ratio = (ratio1 + 1) >> 1;

    let table = match settings.package {
        Package::T => &T_COEFFICIENTS,
        Package::Cs => &CS_COEFFICIENTS,
    };
    let (_, b, m) = table
        .iter()
        .copied()
        .find(|(k, _, _)| ratio <= *k)
        .unwrap_or(table[table.len() - 1]);

    let temp = (channel0 * b).saturating_sub(channel1 * m);
    (temp + (1 << (LUX_SCALE - 1))) >> LUX_SCALE
}

/// TSL2561 driver
pub struct Tsl2561<T: I2cTransport> {
    transport: T,
    bus_path: String,
    address: u8,
    settings: LightSettings,
    fsm: AcquisitionFsm,
}

impl<T: I2cTransport> Tsl2561<T> {
    /// Create a driver. The timing register is written on the first read.
    pub fn new(bus_path: impl Into<String>, transport: T) -> Result<Self, SenseError> {
        let address = check_address(u16::from(transport.address()))?;
        let mut fsm = AcquisitionFsm::new();
        fsm.process(AcquisitionEvent::Configure)
            .map_err(SenseError::Internal)?;

        Ok(Self {
            transport,
            bus_path: bus_path.into(),
            address,
            settings: LightSettings::default(),
            fsm,
        })
    }

    pub fn with_settings(mut self, settings: LightSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn settings(&self) -> &LightSettings {
        &self.settings
    }

    pub fn state(&self) -> AcquisitionState {
        self.fsm.state()
    }

    pub fn set_timing(&mut self, integration_time: IntegrationTime, gain: Gain) -> Result<(), SenseError> {
        self.configure(|s| {
            s.integration_time = integration_time;
            s.gain = gain;
        })
    }

    pub fn set_gain(&mut self, gain: Gain) -> Result<(), SenseError> {
        self.configure(|s| s.gain = gain)
    }

    pub fn set_integration_time(&mut self, integration_time: IntegrationTime) -> Result<(), SenseError> {
        self.configure(|s| s.integration_time = integration_time)
    }

    pub fn set_package(&mut self, package: Package) {
        // Only affects lux computation, nothing to write
        self.settings.package = package;
    }

    pub fn enable_autogain(&mut self) {
        self.settings.autogain = true;
    }

    pub fn disable_autogain(&mut self) {
        self.settings.autogain = false;
    }

    /// Raw channel counts, with one autogain adjustment if enabled
    pub fn luminosity(&mut self) -> Result<Luminosity, SenseError> {
        let pending = self.fsm.has_pending_config();
        self.fsm
            .process(AcquisitionEvent::BeginRead)
            .map_err(SenseError::Internal)?;

        match self.acquire(pending) {
            Ok(luminosity) => {
                self.fsm
                    .process(AcquisitionEvent::Complete)
                    .map_err(SenseError::Internal)?;
                Ok(luminosity)
            }
            Err(e) => {
                let _ = self.fsm.process(AcquisitionEvent::Fail(e.to_string()));
                // Device timing is unknown after a failed read; write it again next time
                let _ = self.fsm.process(AcquisitionEvent::Configure);
                Err(e)
            }
        }
    }

    /// Illuminance in lux. Clipped channels yield `Saturated`.
    pub fn lux(&mut self) -> Result<u64, SenseError> {
        let luminosity = self.luminosity()?;
        self.lux_from(luminosity)
    }

    fn lux_from(&self, luminosity: Luminosity) -> Result<u64, SenseError> {
        let threshold = self.settings.integration_time.clipping_threshold();
        if luminosity.broadband > threshold || luminosity.infrared > threshold {
            return Err(SenseError::Saturated(format!(
                "TSL2561 {:#04x} channel counts {}/{} exceed {}",
                self.address, luminosity.broadband, luminosity.infrared, threshold
            )));
        }
        Ok(compute_lux(&self.settings, luminosity))
    }

    fn configure<F>(&mut self, change: F) -> Result<(), SenseError>
    where
        F: FnOnce(&mut LightSettings),
    {
        self.fsm
            .process(AcquisitionEvent::Configure)
            .map_err(SenseError::Internal)?;
        change(&mut self.settings);
        Ok(())
    }

    fn acquire(&mut self, pending: bool) -> Result<Luminosity, SenseError> {
        if pending {
            self.write_timing()?;
        }

        let luminosity = self.sample()?;
        if !self.settings.autogain {
            return Ok(luminosity);
        }

        let (low, high) = self.settings.integration_time.autogain_window();
        let next_gain = match self.settings.gain {
            Gain::X1 if luminosity.broadband < low => Gain::X16,
            Gain::X16 if luminosity.broadband > high => Gain::X1,
            _ => return Ok(luminosity),
        };

        debug!(
            "TSL2561 {:#04x} autogain {:?} -> {:?} (ch0={})",
            self.address, self.settings.gain, next_gain, luminosity.broadband
        );
        self.settings.gain = next_gain;
        self.write_timing()?;
        self.sample()
    }

    fn write_timing(&mut self) -> Result<(), SenseError> {
        let timing = self.settings.integration_time.bits() | self.settings.gain.bits();
        self.transport
            .write_byte_data(CMD_BIT | REG_TIMING, timing)
    }

    /// Power up, integrate once, read both channels, power down
    fn sample(&mut self) -> Result<Luminosity, SenseError> {
        self.transport
            .write_byte_data(CMD_BIT | REG_CONTROL, POWER_ON)?;
        self.transport
            .delay(self.settings.integration_time.wait());

        let channels = self.read_channels();
        let powered_off = self
            .transport
            .write_byte_data(CMD_BIT | REG_CONTROL, POWER_OFF);

        let luminosity = channels?;
        powered_off?;
        debug!(
            "TSL2561 {:#04x} ch0={} ch1={}",
            self.address, luminosity.broadband, luminosity.infrared
        );
        Ok(luminosity)
    }

    fn read_channels(&mut self) -> Result<Luminosity, SenseError> {
        let broadband = self
            .transport
            .read_word_le(CMD_BIT | WORD_BIT | REG_CH0_LOW)?;
        let infrared = self
            .transport
            .read_word_le(CMD_BIT | WORD_BIT | REG_CH1_LOW)?;
        Ok(Luminosity {
            broadband,
            infrared,
        })
    }
}

impl<T: I2cTransport> SensorDriver for Tsl2561<T> {
    fn kind(&self) -> SensorKind {
        SensorKind::Tsl2561
    }

    fn address(&self) -> u8 {
        self.address
    }

    fn bus_path(&self) -> &str {
        &self.bus_path
    }

    fn measure(&mut self) -> MeasurementResult {
        let luminosity = self.luminosity()?;
        let lux = self.lux_from(luminosity)?;
        Ok(Measurement::new(
            SensorKind::Tsl2561,
            self.address,
            &self.bus_path,
            vec![
                Quantity::new(QuantityKind::Illuminance, lux as f64),
                Quantity::new(QuantityKind::Broadband, f64::from(luminosity.broadband)),
                Quantity::new(QuantityKind::Infrared, f64::from(luminosity.infrared)),
            ],
        ))
    }
}
