//! One-shot command line operations

use std::sync::Arc;

use anyhow::{bail, Context};
use colored::*;

use crate::app::options::DiscoveryOptions;
use crate::app::state::build_bus_tool;
use crate::discovery::platform::Platform;
use crate::errors::SenseError;
use crate::filesys::file::File;
use crate::sensors::measurement::MeasurementReport;
use crate::sensors::{open_driver, SensorKind, SensorSettings};
use crate::storage::settings::Settings;

/// Parse `<kind>[@<addr>][:<bus_path>]`.
///
/// The address may be hex (`0x5c`) or decimal. Missing parts fall back to the
/// family's default address and the default bus.
pub fn parse_read_target(target: &str) -> Result<SensorSettings, SenseError> {
    let (head, bus) = match target.split_once(':') {
        Some((head, bus)) if !bus.is_empty() => (head, Some(bus)),
        Some(_) => {
            return Err(SenseError::ConfigError(format!("empty bus path in '{}'", target)));
        }
        None => (target, None),
    };
    let (kind, address) = match head.split_once('@') {
        Some((kind, address)) => (kind, Some(parse_address(address)?)),
        None => (head, None),
    };

    let mut settings = SensorSettings::new(kind.parse::<SensorKind>()?);
    settings.address = address;
    if let Some(bus) = bus {
        settings.bus = bus.to_string();
    }
    Ok(settings)
}

fn parse_address(text: &str) -> Result<u8, SenseError> {
    let text = text.trim();
    let parsed = match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => u16::from_str_radix(hex, 16),
        None => text.parse::<u16>(),
    };
    let value = parsed.map_err(|_| SenseError::ConfigError(format!("invalid address '{}'", text)))?;
    crate::hardware::i2c::check_address(value)
}

/// Apply per-sensor options from a matching configured entry
pub fn merge_configured(target: SensorSettings, settings: &Settings) -> SensorSettings {
    settings
        .sensors
        .iter()
        .find(|s| s.kind == target.kind && s.address() == target.address() && s.bus == target.bus)
        .cloned()
        .unwrap_or(target)
}

/// Run discovery and print every bus and device
pub async fn scan(options: &DiscoveryOptions) -> anyhow::Result<()> {
    let tool = build_bus_tool(options)?;
    let (platform, outcome) = tokio::task::spawn_blocking(move || {
        let platform = Platform::new(tool);
        let outcome = platform.update();
        (platform, outcome)
    })
    .await
    .context("discovery task failed")?;

    if let Err(e) = outcome {
        println!("{} {}", "Discovery unavailable:".red().bold(), e);
        return Ok(());
    }

    let buses = platform.buses();
    println!("{} {} bus(es)", "Found".green().bold(), buses.len());

    for bus in &buses {
        println!(
            "  {} {} {} {}",
            bus.dev_name().cyan().bold(),
            bus.path(),
            bus.adapter_name(),
            format!("[{}]", bus.capabilities()).dimmed()
        );
        if let Some(err) = bus.probe_error() {
            println!("      {} {}", "probe failed:".yellow(), err);
            continue;
        }
        if bus.devices().is_empty() {
            println!("      {}", "no devices".dimmed());
        }
        for device in bus.devices() {
            let candidates: Vec<String> = SensorKind::candidates_for(device.address())
                .iter()
                .map(|kind| kind.to_string())
                .collect();
            let label = if candidates.is_empty() {
                "unknown".dimmed().to_string()
            } else {
                candidates.join("/").green().to_string()
            };
            println!("      {:#04x}  {}", device.address(), label);
        }
    }

    Ok(())
}

/// Open one sensor, take one measurement
pub async fn read_once(target: SensorSettings) -> anyhow::Result<MeasurementReport> {
    let target = Arc::new(target);
    let settings = target.clone();

    let report = tokio::task::spawn_blocking(move || {
        let result = open_driver(&settings).and_then(|mut driver| driver.measure());
        MeasurementReport::from_result(settings.kind, settings.address(), &settings.bus, &result)
    })
    .await
    .with_context(|| format!("reading {} failed", target.label()))?;

    Ok(report)
}

/// Write the default settings file. Refuses to overwrite an existing one.
pub async fn init_settings(file: &File) -> anyhow::Result<()> {
    if file.exists().await {
        bail!("{} already exists", file.path().display());
    }

    file.write_json(&Settings::default())
        .await
        .with_context(|| format!("writing {}", file.path().display()))?;
    println!(
        "{} {}",
        "   Created".green().bold(),
        file.path().display().to_string().cyan()
    );
    Ok(())
}
