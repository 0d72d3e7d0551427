//! Settings file management

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::discovery::tool::DEFAULT_PROGRAM;
use crate::logs::LogLevel;
use crate::sensors::SensorSettings;

/// envsense settings (`settings.json`); every field has a default
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub log_level: LogLevel,

    #[serde(default)]
    pub log: LogSettings,

    #[serde(default)]
    pub discovery: DiscoverySettings,

    #[serde(default)]
    pub poller: PollerSettings,

    /// Sensors opened at startup
    #[serde(default)]
    pub sensors: Vec<SensorSettings>,
}

fn default_true() -> bool {
    true
}

/// Log output settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogSettings {
    /// Write logs to stdout
    #[serde(default = "default_true")]
    pub stdout: bool,

    /// JSON lines instead of human-readable output
    #[serde(default)]
    pub json: bool,

    /// Daily rolling log files are written here when set
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            stdout: true,
            json: false,
            dir: None,
        }
    }
}

/// Bus discovery settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoverySettings {
    /// Bus listing/probe program
    #[serde(default = "default_tool")]
    pub tool: String,

    /// Replay captured tool output from this directory instead of running `tool`
    #[serde(default)]
    pub replay_dir: Option<PathBuf>,
}

fn default_tool() -> String {
    DEFAULT_PROGRAM.to_string()
}

impl Default for DiscoverySettings {
    fn default() -> Self {
        Self {
            tool: default_tool(),
            replay_dir: None,
        }
    }
}

/// Measurement poller settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollerSettings {
    #[serde(default = "default_interval")]
    pub interval_secs: u64,

    #[serde(default)]
    pub initial_delay_secs: u64,

    /// Print every report to stdout as one JSON line
    #[serde(default = "default_true")]
    pub emit_json: bool,
}

fn default_interval() -> u64 {
    30
}

impl Default for PollerSettings {
    fn default() -> Self {
        Self {
            interval_secs: default_interval(),
            initial_delay_secs: 0,
            emit_json: true,
        }
    }
}
