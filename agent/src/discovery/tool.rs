//! Bus-listing and bus-probe collaborators
//!
//! Discovery never talks to hardware directly. It asks a [`BusTool`] for raw
//! text rows and parses them itself, so every parser can be exercised with
//! fixed fixtures.

use std::collections::HashMap;
use std::fmt::Debug;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::RwLock;

use tracing::debug;

use crate::errors::SenseError;

/// Program run by [`I2cDetect::default`]
pub const DEFAULT_PROGRAM: &str = "i2cdetect";

/// Source of raw discovery output
pub trait BusTool: Debug + Send + Sync {
    /// One row per adapter, tab-separated
    fn list_buses(&self) -> Result<Vec<String>, SenseError>;

    /// Scan dump of one bus: header line followed by one row per 16 addresses
    fn probe_bus(&self, bus_number: u32) -> Result<Vec<String>, SenseError>;
}

fn split_rows(text: &str) -> Vec<String> {
    text.lines()
        .filter(|line| !line.trim().is_empty())
        .map(str::to_string)
        .collect()
}

// ================================= I2CDETECT ==================================== //

/// Runs the `i2cdetect` utility from i2c-tools
#[derive(Debug, Clone)]
pub struct I2cDetect {
    program: PathBuf,
}

impl I2cDetect {
    /// Use the given `i2cdetect` executable
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Get the executable path
    pub fn program(&self) -> &Path {
        &self.program
    }

    fn run(&self, args: &[&str]) -> Result<Vec<String>, SenseError> {
        debug!("Running {} {}", self.program.display(), args.join(" "));

        let output = Command::new(&self.program)
            .args(args)
            .output()
            .map_err(|e| {
                let reason = match e.kind() {
                    ErrorKind::NotFound => "tool not found".to_string(),
                    ErrorKind::PermissionDenied => "permission denied".to_string(),
                    _ => e.to_string(),
                };
                SenseError::DiscoveryUnavailable(format!(
                    "cannot run {} {}: {}",
                    self.program.display(),
                    args.join(" "),
                    reason
                ))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(SenseError::DiscoveryUnavailable(format!(
                "{} {} exited with {}: {}",
                self.program.display(),
                args.join(" "),
                output.status,
                stderr.trim()
            )));
        }

        Ok(split_rows(&String::from_utf8_lossy(&output.stdout)))
    }
}

impl Default for I2cDetect {
    fn default() -> Self {
        Self::new(DEFAULT_PROGRAM)
    }
}

impl BusTool for I2cDetect {
    fn list_buses(&self) -> Result<Vec<String>, SenseError> {
        self.run(&["-l"])
    }

    fn probe_bus(&self, bus_number: u32) -> Result<Vec<String>, SenseError> {
        // -r: read-byte probing, -y: no interactive confirmation
        self.run(&["-r", "-y", &bus_number.to_string()])
    }
}

// =================================== REPLAY ===================================== //

#[derive(Debug, Default)]
struct ReplayData {
    listing: Option<String>,
    probes: HashMap<u32, String>,
}

/// Replays captured tool output instead of touching hardware.
///
/// A missing listing or probe behaves like a tool that cannot be run. The
/// captured text can be swapped at runtime to simulate hardware changes.
#[derive(Debug, Default)]
pub struct ReplayTool {
    data: RwLock<ReplayData>,
}

impl ReplayTool {
    /// Create an empty replay tool (every call fails)
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the bus listing
    pub fn with_listing(self, listing: impl Into<String>) -> Self {
        self.set_listing(Some(listing.into()));
        self
    }

    /// Set the probe output for one bus
    pub fn with_probe(self, bus_number: u32, dump: impl Into<String>) -> Self {
        self.set_probe(bus_number, dump);
        self
    }

    /// Load `buses.txt` and every `bus-<n>.txt` from a capture directory
    pub fn from_dir(dir: impl AsRef<Path>) -> Result<Self, SenseError> {
        let dir = dir.as_ref();
        let tool = Self::new();

        let listing_path = dir.join("buses.txt");
        if listing_path.exists() {
            tool.set_listing(Some(std::fs::read_to_string(&listing_path)?));
        }

        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            let bus_number = path
                .file_name()
                .and_then(|name| name.to_str())
                .and_then(|name| name.strip_prefix("bus-"))
                .and_then(|name| name.strip_suffix(".txt"))
                .and_then(|num| num.parse::<u32>().ok());

            if let Some(bus_number) = bus_number {
                tool.set_probe(bus_number, std::fs::read_to_string(&path)?);
            }
        }

        debug!("Loaded replay captures from {}", dir.display());
        Ok(tool)
    }

    /// Replace the bus listing; `None` makes listing fail
    pub fn set_listing(&self, listing: Option<String>) {
        let mut data = self.data.write().unwrap_or_else(|e| e.into_inner());
        data.listing = listing;
    }

    /// Replace the probe output for one bus
    pub fn set_probe(&self, bus_number: u32, dump: impl Into<String>) {
        let mut data = self.data.write().unwrap_or_else(|e| e.into_inner());
        data.probes.insert(bus_number, dump.into());
    }

    /// Remove the probe output for one bus; probing it then fails
    pub fn clear_probe(&self, bus_number: u32) {
        let mut data = self.data.write().unwrap_or_else(|e| e.into_inner());
        data.probes.remove(&bus_number);
    }
}

impl BusTool for ReplayTool {
    fn list_buses(&self) -> Result<Vec<String>, SenseError> {
        let data = self.data.read().unwrap_or_else(|e| e.into_inner());
        data.listing
            .as_deref()
            .map(split_rows)
            .ok_or_else(|| SenseError::DiscoveryUnavailable("no bus listing captured".to_string()))
    }

    fn probe_bus(&self, bus_number: u32) -> Result<Vec<String>, SenseError> {
        let data = self.data.read().unwrap_or_else(|e| e.into_inner());
        data.probes.get(&bus_number).map(|dump| split_rows(dump)).ok_or_else(|| {
            SenseError::DiscoveryUnavailable(format!("no probe captured for bus {}", bus_number))
        })
    }
}
