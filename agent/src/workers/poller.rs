//! Polling worker for periodic measurements

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::future::join_all;
use tracing::{debug, error, info, warn};

use crate::errors::SenseError;
use crate::sensors::guarded::GuardedDriver;
use crate::sensors::measurement::MeasurementReport;
use crate::sensors::SensorDriver;

/// A driver shared between the poller and blocking measurement tasks
pub type SharedDriver = Arc<Mutex<GuardedDriver>>;

/// Poller worker options
#[derive(Debug, Clone)]
pub struct Options {
    /// Polling interval
    pub interval: Duration,

    /// Initial delay before first poll
    pub initial_delay: Duration,

    /// Print each report to stdout as one JSON line
    pub emit_json: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
            initial_delay: Duration::ZERO,
            emit_json: true,
        }
    }
}

/// Measure every driver once.
///
/// Drivers run concurrently on the blocking pool; the per-bus lock inside
/// each [`GuardedDriver`] serialises drivers that share a bus. Reports come
/// back in driver order.
pub async fn poll_once(drivers: &[SharedDriver]) -> Vec<MeasurementReport> {
    let tasks = drivers.iter().map(|driver| {
        let driver = driver.clone();
        tokio::task::spawn_blocking(move || {
            let mut driver = driver.lock().unwrap_or_else(|e| e.into_inner());
            let result = driver.measure();
            MeasurementReport::from_result(driver.kind(), driver.address(), driver.bus_path(), &result)
        })
    });

    let results = join_all(tasks).await;
    results
        .into_iter()
        .zip(drivers)
        .map(|(result, driver)| match result {
            Ok(report) => report,
            Err(e) => {
                // A panicking driver still yields a report
                let driver = driver.lock().unwrap_or_else(|e| e.into_inner());
                MeasurementReport::from_result(
                    driver.kind(),
                    driver.address(),
                    driver.bus_path(),
                    &Err(SenseError::from(e)),
                )
            }
        })
        .collect()
}

/// Log a report at a level matching its outcome
pub fn log_report(report: &MeasurementReport) {
    match report {
        MeasurementReport::Ok { measurement } => {
            let values: Vec<String> = measurement
                .values
                .iter()
                .map(|q| format!("{:?}={:.2}{}", q.kind, q.value, q.kind.unit()))
                .collect();
            if measurement.checksum_valid == Some(false) {
                warn!(
                    "{}@{:#04x}: {} (checksum mismatch)",
                    measurement.sensor,
                    measurement.address,
                    values.join(" ")
                );
            } else {
                info!("{}@{:#04x}: {}", measurement.sensor, measurement.address, values.join(" "));
            }
        }
        MeasurementReport::Error {
            sensor,
            address,
            detail,
            ..
        } => {
            error!("{}@{:#04x}: {}", sensor, address, detail);
        }
    }
}

/// Run the poller worker
pub async fn run<S, F, R>(
    options: &Options,
    drivers: &[SharedDriver],
    on_report: R,
    sleep_fn: S,
    mut shutdown_signal: Pin<Box<dyn Future<Output = ()> + Send>>,
) where
    S: Fn(Duration) -> F,
    F: Future<Output = ()>,
    R: Fn(&MeasurementReport),
{
    info!("Poller worker starting with {} sensor(s)...", drivers.len());

    tokio::select! {
        _ = &mut shutdown_signal => {
            info!("Poller worker shutting down...");
            return;
        }
        _ = sleep_fn(options.initial_delay) => {}
    }

    loop {
        debug!("Polling sensors...");
        for report in poll_once(drivers).await {
            on_report(&report);
        }

        tokio::select! {
            _ = &mut shutdown_signal => {
                info!("Poller worker shutting down...");
                return;
            }
            _ = sleep_fn(options.interval) => {}
        }
    }
}
