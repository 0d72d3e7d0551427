//! Main application run loop

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::app::options::AppOptions;
use crate::app::state::AppState;
use crate::errors::SenseError;
use crate::sensors::measurement::MeasurementReport;
use crate::workers::poller;

/// Run envsense until `shutdown_signal` resolves
pub async fn run(
    options: AppOptions,
    shutdown_signal: impl Future<Output = ()> + Send + 'static,
) -> Result<(), SenseError> {
    info!("Initializing envsense...");

    let (shutdown_tx, _shutdown_rx): (broadcast::Sender<()>, _) = broadcast::channel(1);
    let mut shutdown_manager = ShutdownManager::new(shutdown_tx.clone(), options.max_shutdown_delay);

    let app_state = match init(&options, shutdown_tx.clone(), &mut shutdown_manager).await {
        Ok(state) => state,
        Err(e) => {
            error!("Failed to start envsense: {}", e);
            shutdown_manager.shutdown().await?;
            return Err(e);
        }
    };

    shutdown_signal.await;
    info!("Shutdown signal received, shutting down...");

    drop(shutdown_tx);
    shutdown_manager.shutdown().await?;
    app_state.shutdown().await
}

// =============================== INITIALIZATION ================================== //

async fn init(
    options: &AppOptions,
    shutdown_tx: broadcast::Sender<()>,
    shutdown_manager: &mut ShutdownManager,
) -> Result<Arc<AppState>, SenseError> {
    let app_state = Arc::new(AppState::init(options).await?);

    if options.enable_poller {
        if app_state.drivers.is_empty() {
            info!("No sensors opened, poller disabled");
        } else {
            init_poller_worker(
                options.poller.clone(),
                app_state.clone(),
                shutdown_manager,
                shutdown_tx.subscribe(),
            )?;
        }
    }

    Ok(app_state)
}

fn init_poller_worker(
    options: poller::Options,
    app_state: Arc<AppState>,
    shutdown_manager: &mut ShutdownManager,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), SenseError> {
    info!("Initializing poller worker...");

    let drivers = app_state.drivers.clone();
    let emit_json = options.emit_json;

    let poller_handle = tokio::spawn(async move {
        poller::run(
            &options,
            &drivers,
            |report| emit_report(report, emit_json),
            tokio::time::sleep,
            Box::pin(async move {
                let _ = shutdown_rx.recv().await;
            }),
        )
        .await;
    });

    shutdown_manager.with_poller_worker_handle(poller_handle)
}

fn emit_report(report: &MeasurementReport, emit_json: bool) {
    poller::log_report(report);
    if emit_json {
        match serde_json::to_string(report) {
            Ok(line) => println!("{}", line),
            Err(e) => error!("Failed to serialize report: {}", e),
        }
    }
}

// ================================= SHUTDOWN ===================================== //

struct ShutdownManager {
    shutdown_tx: broadcast::Sender<()>,
    max_shutdown_delay: Duration,
    poller_worker_handle: Option<JoinHandle<()>>,
}

impl ShutdownManager {
    fn new(shutdown_tx: broadcast::Sender<()>, max_shutdown_delay: Duration) -> Self {
        Self {
            shutdown_tx,
            max_shutdown_delay,
            poller_worker_handle: None,
        }
    }

    fn with_poller_worker_handle(&mut self, handle: JoinHandle<()>) -> Result<(), SenseError> {
        if self.poller_worker_handle.is_some() {
            return Err(SenseError::Internal("poller_handle already set".to_string()));
        }
        self.poller_worker_handle = Some(handle);
        Ok(())
    }

    async fn shutdown(&mut self) -> Result<(), SenseError> {
        let _ = self.shutdown_tx.send(());

        match tokio::time::timeout(self.max_shutdown_delay, self.shutdown_impl()).await {
            Ok(result) => result,
            Err(_) => {
                // A hung bus transaction keeps its blocking task alive
                error!(
                    "Shutdown timed out after {:?}, forcing shutdown...",
                    self.max_shutdown_delay
                );
                std::process::exit(1);
            }
        }
    }

    async fn shutdown_impl(&mut self) -> Result<(), SenseError> {
        info!("Shutting down envsense...");

        if let Some(handle) = self.poller_worker_handle.take() {
            handle.await?;
        }

        info!("Shutdown complete");
        Ok(())
    }
}
