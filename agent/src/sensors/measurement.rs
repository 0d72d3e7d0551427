//! Measurement results

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::{ErrorKind, SenseError};
use crate::sensors::SensorKind;

/// Physical quantity of a reading
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuantityKind {
    Temperature,
    RelativeHumidity,
    Pressure,
    Altitude,
    Illuminance,
    Broadband,
    Infrared,
}

impl QuantityKind {
    pub fn unit(&self) -> &'static str {
        match self {
            QuantityKind::Temperature => "°C",
            QuantityKind::RelativeHumidity => "%RH",
            QuantityKind::Pressure => "Pa",
            QuantityKind::Altitude => "m",
            QuantityKind::Illuminance => "lx",
            QuantityKind::Broadband | QuantityKind::Infrared => "counts",
        }
    }
}

/// One value with its quantity
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quantity {
    pub kind: QuantityKind,
    pub value: f64,
}

impl Quantity {
    pub fn new(kind: QuantityKind, value: f64) -> Self {
        Self { kind, value }
    }
}

/// A successful reading
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    pub sensor: SensorKind,
    pub address: u8,
    pub bus_path: String,
    pub values: Vec<Quantity>,

    /// Present only for checksum-guarded families
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum_valid: Option<bool>,

    pub taken_at: DateTime<Utc>,
}

impl Measurement {
    pub fn new(sensor: SensorKind, address: u8, bus_path: &str, values: Vec<Quantity>) -> Self {
        Self {
            sensor,
            address,
            bus_path: bus_path.to_string(),
            values,
            checksum_valid: None,
            taken_at: Utc::now(),
        }
    }

    pub fn with_checksum(mut self, valid: bool) -> Self {
        self.checksum_valid = Some(valid);
        self
    }

    /// First value of the given quantity
    pub fn get(&self, kind: QuantityKind) -> Option<f64> {
        self.values.iter().find(|q| q.kind == kind).map(|q| q.value)
    }
}

/// Outcome of one driver transaction
pub type MeasurementResult = Result<Measurement, SenseError>;

/// Serialisable form of a [`MeasurementResult`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum MeasurementReport {
    Ok {
        #[serde(flatten)]
        measurement: Measurement,
    },
    Error {
        sensor: SensorKind,
        address: u8,
        bus_path: String,
        kind: ErrorKind,
        detail: String,
        taken_at: DateTime<Utc>,
    },
}

impl MeasurementReport {
    pub fn from_result(sensor: SensorKind, address: u8, bus_path: &str, result: &MeasurementResult) -> Self {
        match result {
            Ok(measurement) => MeasurementReport::Ok {
                measurement: measurement.clone(),
            },
            Err(e) => MeasurementReport::Error {
                sensor,
                address,
                bus_path: bus_path.to_string(),
                kind: e.kind(),
                detail: e.to_string(),
                taken_at: Utc::now(),
            },
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, MeasurementReport::Ok { .. })
    }
}
