//! Sensor drivers
//!
//! Every family implements [`SensorDriver`]. The family is chosen once, when
//! the driver is opened from its [`SensorSettings`].

pub mod acquisition;
pub mod am2315;
pub mod bmp180;
pub mod guarded;
pub mod lm75;
pub mod mcp9808;
pub mod measurement;
pub mod mpl115a2;
pub mod tsl2561;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::errors::SenseError;
use crate::hardware::i2c::{addresses, check_address, open_transport, BoxedTransport};

pub use am2315::{Am2315, ChecksumPolicy};
pub use bmp180::{Bmp180, Oversampling};
pub use guarded::GuardedDriver;
pub use lm75::Lm75;
pub use mcp9808::Mcp9808;
pub use measurement::{Measurement, MeasurementReport, MeasurementResult, Quantity, QuantityKind};
pub use mpl115a2::Mpl115a2;
pub use tsl2561::{LightSettings, Tsl2561};

/// Default bus for configured sensors
pub const DEFAULT_BUS: &str = "/dev/i2c-1";

/// Supported sensor families
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SensorKind {
    Am2315,
    Bmp180,
    Mpl115a2,
    Tsl2561,
    Mcp9808,
    Lm75,
}

/// How a family talks to its device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorFamily {
    ChecksumGuarded,
    CalibratedPolynomial,
    ConfigurableLight,
    SimpleRegister,
}

impl SensorKind {
    pub fn all() -> [SensorKind; 6] {
        [
            SensorKind::Am2315,
            SensorKind::Bmp180,
            SensorKind::Mpl115a2,
            SensorKind::Tsl2561,
            SensorKind::Mcp9808,
            SensorKind::Lm75,
        ]
    }

    pub fn default_address(&self) -> u8 {
        match self {
            SensorKind::Am2315 => addresses::AM2315,
            SensorKind::Bmp180 => addresses::BMP180,
            SensorKind::Mpl115a2 => addresses::MPL115A2,
            SensorKind::Tsl2561 => addresses::TSL2561,
            SensorKind::Mcp9808 => addresses::MCP9808,
            SensorKind::Lm75 => addresses::LM75,
        }
    }

    pub fn family(&self) -> SensorFamily {
        match self {
            SensorKind::Am2315 => SensorFamily::ChecksumGuarded,
            SensorKind::Bmp180 | SensorKind::Mpl115a2 => SensorFamily::CalibratedPolynomial,
            SensorKind::Tsl2561 => SensorFamily::ConfigurableLight,
            SensorKind::Mcp9808 | SensorKind::Lm75 => SensorFamily::SimpleRegister,
        }
    }

    /// Families that commonly answer at `address`
    pub fn candidates_for(address: u8) -> Vec<SensorKind> {
        let mut kinds: Vec<SensorKind> = Self::all()
            .into_iter()
            .filter(|kind| kind.default_address() == address)
            .collect();
        if (address == addresses::TSL2561_LOW || address == addresses::TSL2561_HIGH)
            && !kinds.contains(&SensorKind::Tsl2561)
        {
            kinds.push(SensorKind::Tsl2561);
        }
        kinds
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SensorKind::Am2315 => "am2315",
            SensorKind::Bmp180 => "bmp180",
            SensorKind::Mpl115a2 => "mpl115a2",
            SensorKind::Tsl2561 => "tsl2561",
            SensorKind::Mcp9808 => "mcp9808",
            SensorKind::Lm75 => "lm75",
        }
    }
}

impl fmt::Display for SensorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for SensorKind {
    type Err = SenseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        Self::all()
            .into_iter()
            .find(|kind| kind.as_str() == lower)
            .ok_or_else(|| SenseError::ConfigError(format!("unknown sensor kind '{}'", s)))
    }
}

/// Common driver contract.
///
/// `measure()` performs one transaction (or the family's fixed sequence of
/// transactions) and never panics on device misbehaviour.
pub trait SensorDriver: Send {
    fn kind(&self) -> SensorKind;

    /// 7-bit device address
    fn address(&self) -> u8;

    fn bus_path(&self) -> &str;

    fn measure(&mut self) -> MeasurementResult;
}

impl<D: SensorDriver + ?Sized> SensorDriver for Box<D> {
    fn kind(&self) -> SensorKind {
        (**self).kind()
    }

    fn address(&self) -> u8 {
        (**self).address()
    }

    fn bus_path(&self) -> &str {
        (**self).bus_path()
    }

    fn measure(&mut self) -> MeasurementResult {
        (**self).measure()
    }
}

pub type BoxedDriver = Box<dyn SensorDriver>;

fn default_bus() -> String {
    DEFAULT_BUS.to_string()
}

fn default_sea_level_pa() -> f64 {
    bmp180::SEA_LEVEL_PA
}

/// One configured sensor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorSettings {
    pub kind: SensorKind,

    /// Defaults to the family's usual address
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<u8>,

    #[serde(default = "default_bus")]
    pub bus: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// AM2315 only
    #[serde(default)]
    pub checksum: ChecksumPolicy,

    /// TSL2561 only
    #[serde(default)]
    pub light: LightSettings,

    /// BMP180 only
    #[serde(default)]
    pub oversampling: Oversampling,

    /// BMP180 only
    #[serde(default = "default_sea_level_pa")]
    pub sea_level_pa: f64,
}

impl SensorSettings {
    pub fn new(kind: SensorKind) -> Self {
        Self {
            kind,
            address: None,
            bus: default_bus(),
            name: None,
            checksum: ChecksumPolicy::default(),
            light: LightSettings::default(),
            oversampling: Oversampling::default(),
            sea_level_pa: default_sea_level_pa(),
        }
    }

    /// Settings for `kind` at a discovered device
    pub fn for_device(kind: SensorKind, bus_path: &str, address: u8) -> Self {
        Self {
            address: Some(address),
            bus: bus_path.to_string(),
            ..Self::new(kind)
        }
    }

    pub fn address(&self) -> u8 {
        self.address.unwrap_or_else(|| self.kind.default_address())
    }

    /// Configured name, or `kind@address`
    pub fn label(&self) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => format!("{}@{:#04x}", self.kind, self.address()),
        }
    }
}

/// Open the driver for `settings` over the native transport
pub fn open_driver(settings: &SensorSettings) -> Result<BoxedDriver, SenseError> {
    let address = check_address(u16::from(settings.address()))?;
    let transport = open_transport(&settings.bus, address)?;
    open_driver_with(settings, transport)
}

/// Open the driver for `settings` over an existing transport.
///
/// The transport must talk to the configured address.
pub fn open_driver_with(
    settings: &SensorSettings,
    transport: BoxedTransport,
) -> Result<BoxedDriver, SenseError> {
    if transport.address() != settings.address() {
        return Err(SenseError::ConfigError(format!(
            "{} is configured at {:#04x} but the transport talks to {:#04x}",
            settings.label(),
            settings.address(),
            transport.address()
        )));
    }

    let bus = settings.bus.as_str();
    let driver: BoxedDriver = match settings.kind {
        SensorKind::Am2315 => {
            Box::new(Am2315::new(bus, transport)?.with_checksum_policy(settings.checksum))
        }
        SensorKind::Bmp180 => Box::new(
            Bmp180::new(bus, transport)?
                .with_oversampling(settings.oversampling)
                .with_sea_level_pressure(settings.sea_level_pa),
        ),
        SensorKind::Mpl115a2 => Box::new(Mpl115a2::new(bus, transport)?),
        SensorKind::Tsl2561 => Box::new(Tsl2561::new(bus, transport)?.with_settings(settings.light)),
        SensorKind::Mcp9808 => Box::new(Mcp9808::new(bus, transport)?),
        SensorKind::Lm75 => Box::new(Lm75::new(bus, transport)?),
    };

    info!(
        "Opened {} driver at {:#04x} on {}",
        driver.kind(),
        driver.address(),
        driver.bus_path()
    );
    Ok(driver)
}
