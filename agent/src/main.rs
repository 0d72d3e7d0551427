//! envsense - Entry Point
//!
//! Discovers I2C buses and polls environmental sensors.

use std::collections::HashMap;
use std::env;
use std::path::PathBuf;

use envsense::app::commands::{init_settings, merge_configured, parse_read_target, read_once, scan};
use envsense::app::options::AppOptions;
use envsense::app::run::run;
use envsense::filesys::file::File;
use envsense::logs::{init_logging, LogLevel, LogOptions};
use envsense::storage::layout::StorageLayout;
use envsense::storage::settings::Settings;
use envsense::utils::version_info;

use tracing::{error, info, warn};

#[tokio::main]
async fn main() {
    // Parse command line arguments
    let args: Vec<String> = env::args().collect();
    let mut cli_args: HashMap<String, String> = HashMap::new();

    for arg in args.iter().skip(1) {
        if let Some((key, value)) = arg.split_once('=') {
            // Handle --key=value format
            let clean_key = key.trim_start_matches('-');
            cli_args.insert(clean_key.to_string(), value.to_string());
        } else if arg.starts_with("--") {
            // Handle standalone flags like --version
            let clean_key = arg.trim_start_matches('-');
            cli_args.insert(clean_key.to_string(), "true".to_string());
        }
    }

    // Print version and exit
    if cli_args.contains_key("version") {
        match serde_json::to_string_pretty(&version_info()) {
            Ok(version) => println!("{}", version),
            Err(e) => eprintln!("Failed to serialize version info: {e}"),
        }
        return;
    }

    let layout = StorageLayout::default();
    let settings_file = match cli_args.get("config") {
        Some(path) => File::new(PathBuf::from(path)),
        None => layout.settings_file(),
    };

    // Write default settings and exit
    if cli_args.contains_key("init") {
        if let Err(e) = init_settings(&settings_file).await {
            eprintln!("Init failed: {e:#}");
            std::process::exit(1);
        }
        return;
    }

    // Missing settings file means defaults; a broken one is fatal
    let settings = if settings_file.exists().await {
        match settings_file.read_json::<Settings>().await {
            Ok(settings) => settings,
            Err(e) => {
                eprintln!("Unable to read settings file {}: {}", settings_file.path().display(), e);
                std::process::exit(1);
            }
        }
    } else {
        Settings::default()
    };

    // Initialize logging
    let log_level = match cli_args.get("log-level").map(|level| level.parse::<LogLevel>()) {
        Some(Ok(level)) => level,
        Some(Err(e)) => {
            eprintln!("{e}, using {}", settings.log_level);
            settings.log_level
        }
        None => settings.log_level,
    };
    let log_options = LogOptions {
        log_level,
        stdout: settings.log.stdout,
        log_dir: settings.log.dir.clone(),
        json_format: settings.log.json,
    };
    let _log_guard = match init_logging(log_options) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {e}");
            None
        }
    };

    let options = AppOptions::from_settings(&settings);

    // Print discovered buses and exit
    if cli_args.contains_key("scan") {
        if let Err(e) = scan(&options.discovery).await {
            error!("Scan failed: {e:#}");
            std::process::exit(1);
        }
        return;
    }

    // Take one measurement and exit
    if let Some(target) = cli_args.get("read") {
        let target = match parse_read_target(target) {
            Ok(target) => merge_configured(target, &settings),
            Err(e) => {
                eprintln!("Invalid read target '{}': {}", target, e);
                std::process::exit(2);
            }
        };
        match read_once(target).await {
            Ok(report) => {
                match serde_json::to_string_pretty(&report) {
                    Ok(json) => println!("{}", json),
                    Err(e) => error!("Failed to serialize report: {e}"),
                }
                if !report.is_ok() {
                    std::process::exit(1);
                }
            }
            Err(e) => {
                error!("Read failed: {e:#}");
                std::process::exit(1);
            }
        }
        return;
    }

    if !settings_file.exists().await {
        warn!(
            "No settings at {}, running with defaults (envsense --init writes them)",
            settings_file.path().display()
        );
    }

    info!("Running envsense with options: {:?}", options);
    if let Err(e) = run(options, await_shutdown_signal()).await {
        error!("Failed to run envsense: {e}");
        std::process::exit(1);
    }
}

async fn await_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let (mut sigterm, mut sigint) = match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
            (Ok(sigterm), Ok(sigint)) => (sigterm, sigint),
            _ => {
                warn!("Unable to install signal handlers, falling back to Ctrl+C");
                let _ = tokio::signal::ctrl_c().await;
                return;
            }
        };

        tokio::select! {
            _ = sigterm.recv() => {
                info!("SIGTERM received, shutting down...");
            }
            _ = sigint.recv() => {
                info!("SIGINT received, shutting down...");
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {e}");
        }
        info!("Ctrl+C received, shutting down...");
    }
}
