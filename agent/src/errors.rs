//! Error types for envsense

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for discovery and sensor drivers
#[derive(Error, Debug)]
pub enum SenseError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// The bus-listing or bus-probe tool could not be invoked
    #[error("Discovery unavailable: {0}")]
    DiscoveryUnavailable(String),

    /// A row or field of tool output could not be parsed
    #[error("Malformed scan output: {0}")]
    MalformedScanOutput(String),

    /// A bus transaction did not complete (bus error, no acknowledgment)
    #[error("Transaction failure: {0}")]
    TransactionFailure(String),

    /// Only raised when the checksum policy rejects invalid frames
    #[error("Checksum mismatch: expected {expected:#06x}, computed {computed:#06x}")]
    ChecksumMismatch { expected: u16, computed: u16 },

    #[error("Calibration read failure: {0}")]
    CalibrationReadFailure(String),

    #[error("Invalid I2C address: {0:#x}")]
    InvalidAddress(u16),

    /// A channel reading exceeded the sensor's clipping threshold
    #[error("Sensor saturated: {0}")]
    Saturated(String),

    #[error("Unsupported: {0}")]
    Unsupported(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl SenseError {
    /// Coarse classification used when reporting a failure as data
    pub fn kind(&self) -> ErrorKind {
        match self {
            SenseError::IoError(_) => ErrorKind::Io,
            SenseError::JsonError(_) => ErrorKind::Json,
            SenseError::DiscoveryUnavailable(_) => ErrorKind::DiscoveryUnavailable,
            SenseError::MalformedScanOutput(_) => ErrorKind::MalformedScanOutput,
            SenseError::TransactionFailure(_) => ErrorKind::TransactionFailure,
            SenseError::ChecksumMismatch { .. } => ErrorKind::ChecksumMismatch,
            SenseError::CalibrationReadFailure(_) => ErrorKind::CalibrationReadFailure,
            SenseError::InvalidAddress(_) => ErrorKind::InvalidAddress,
            SenseError::Saturated(_) => ErrorKind::Saturated,
            SenseError::Unsupported(_) => ErrorKind::Unsupported,
            SenseError::ConfigError(_) => ErrorKind::Config,
            SenseError::Internal(_) => ErrorKind::Internal,
        }
    }
}

impl From<anyhow::Error> for SenseError {
    fn from(err: anyhow::Error) -> Self {
        SenseError::Internal(err.to_string())
    }
}

impl From<tokio::task::JoinError> for SenseError {
    fn from(err: tokio::task::JoinError) -> Self {
        SenseError::Internal(format!("blocking task failed: {}", err))
    }
}

/// Serialisable error classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Io,
    Json,
    DiscoveryUnavailable,
    MalformedScanOutput,
    TransactionFailure,
    ChecksumMismatch,
    CalibrationReadFailure,
    InvalidAddress,
    Saturated,
    Unsupported,
    Config,
    Internal,
}
