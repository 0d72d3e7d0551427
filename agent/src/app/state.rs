//! Application state management

use std::sync::{Arc, Mutex};

use tracing::{error, info, warn};

use crate::app::options::{AppOptions, DiscoveryOptions};
use crate::discovery::parser::bus_number_from_path;
use crate::discovery::platform::Platform;
use crate::discovery::tool::{BusTool, I2cDetect, ReplayTool};
use crate::errors::SenseError;
use crate::hardware::lock::BusLocks;
use crate::sensors::guarded::GuardedDriver;
use crate::sensors::{open_driver, SensorSettings};
use crate::workers::poller::SharedDriver;

/// Build the discovery collaborator for `options`
pub fn build_bus_tool(options: &DiscoveryOptions) -> Result<Arc<dyn BusTool>, SenseError> {
    match &options.replay_dir {
        Some(dir) => {
            info!("Replaying bus discovery from {}", dir.display());
            Ok(Arc::new(ReplayTool::from_dir(dir)?))
        }
        None => Ok(Arc::new(I2cDetect::new(&options.tool))),
    }
}

/// Main application state
pub struct AppState {
    /// Discovered buses and devices
    pub platform: Arc<Platform>,

    /// Transaction locks shared by every driver
    pub bus_locks: Arc<BusLocks>,

    /// Drivers that opened successfully
    pub drivers: Vec<SharedDriver>,
}

impl AppState {
    /// Discover buses, then open every configured sensor.
    ///
    /// Discovery and driver construction block on bus I/O, so both run on
    /// the blocking pool. A sensor that fails to open is logged and skipped.
    pub async fn init(options: &AppOptions) -> Result<Self, SenseError> {
        info!("Initializing application state...");

        let tool = build_bus_tool(&options.discovery)?;
        let platform = tokio::task::spawn_blocking(move || Arc::new(Platform::enumerate(tool))).await?;
        let bus_locks = Arc::new(BusLocks::new());

        let sensors = options.sensors.clone();
        let drivers = {
            let platform = platform.clone();
            let bus_locks = bus_locks.clone();
            tokio::task::spawn_blocking(move || open_drivers(&sensors, &platform, &bus_locks)).await?
        };

        info!(
            "{} bus(es), {} device(s), {}/{} sensor(s) opened",
            platform.buses().len(),
            platform.devices().len(),
            drivers.len(),
            options.sensors.len()
        );

        Ok(Self {
            platform,
            bus_locks,
            drivers,
        })
    }

    /// Shutdown application state
    pub async fn shutdown(&self) -> Result<(), SenseError> {
        info!("Shutting down application state...");
        Ok(())
    }
}

/// Open `sensors`, warning about ones discovery did not see
pub fn open_drivers(sensors: &[SensorSettings], platform: &Platform, locks: &BusLocks) -> Vec<SharedDriver> {
    let mut drivers = Vec::new();

    for settings in sensors {
        let label = settings.label();
        let bus_number = bus_number_from_path(&settings.bus);
        if !platform.buses().is_empty()
            && platform.find_i2c_device(settings.address(), bus_number).is_empty()
        {
            warn!("{} not found by discovery on {}, opening anyway", label, settings.bus);
        }

        match open_driver(settings) {
            Ok(driver) => {
                drivers.push(Arc::new(Mutex::new(GuardedDriver::new(driver, locks))));
            }
            Err(e) => {
                error!("Failed to open {}: {}", label, e);
            }
        }
    }

    drivers
}
