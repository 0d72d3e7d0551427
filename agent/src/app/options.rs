//! Application configuration options

use std::path::PathBuf;
use std::time::Duration;

use crate::discovery::tool::DEFAULT_PROGRAM;
use crate::sensors::SensorSettings;
use crate::storage::settings::Settings;
use crate::workers::poller;

/// Main application options
#[derive(Debug, Clone)]
pub struct AppOptions {
    pub discovery: DiscoveryOptions,

    /// Sensors to open at startup
    pub sensors: Vec<SensorSettings>,

    /// Enable the measurement poller
    pub enable_poller: bool,

    pub poller: poller::Options,

    /// Maximum delay for graceful shutdown
    pub max_shutdown_delay: Duration,
}

impl Default for AppOptions {
    fn default() -> Self {
        Self {
            discovery: DiscoveryOptions::default(),
            sensors: Vec::new(),
            enable_poller: true,
            poller: poller::Options::default(),
            max_shutdown_delay: Duration::from_secs(10),
        }
    }
}

impl AppOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            discovery: DiscoveryOptions {
                tool: PathBuf::from(&settings.discovery.tool),
                replay_dir: settings.discovery.replay_dir.clone(),
            },
            sensors: settings.sensors.clone(),
            poller: poller::Options {
                interval: Duration::from_secs(settings.poller.interval_secs.max(1)),
                initial_delay: Duration::from_secs(settings.poller.initial_delay_secs),
                emit_json: settings.poller.emit_json,
            },
            ..Default::default()
        }
    }
}

/// Where bus discovery output comes from
#[derive(Debug, Clone)]
pub struct DiscoveryOptions {
    /// `i2cdetect` executable
    pub tool: PathBuf,

    /// Captured output to replay instead of running `tool`
    pub replay_dir: Option<PathBuf>,
}

impl Default for DiscoveryOptions {
    fn default() -> Self {
        Self {
            tool: PathBuf::from(DEFAULT_PROGRAM),
            replay_dir: None,
        }
    }
}
