//! I2C bus and device records

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};

use crate::discovery::parser::{parse_scan_output, BusDescriptor};
use crate::discovery::tool::BusTool;

/// A device that answered the most recent probe of its bus.
///
/// This is a value snapshot: it names its bus by number and path rather than
/// holding on to the bus, and is rebuilt on every rescan.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct I2cDevice {
    bus_number: u32,
    bus_path: String,
    address: u8,
}

impl I2cDevice {
    pub fn new(bus_number: u32, bus_path: impl Into<String>, address: u8) -> Self {
        Self {
            bus_number,
            bus_path: bus_path.into(),
            address,
        }
    }

    /// Number of the owning bus
    pub fn bus_number(&self) -> u32 {
        self.bus_number
    }

    /// Device file of the owning bus, e.g. `/dev/i2c-1`
    pub fn bus_path(&self) -> &str {
        &self.bus_path
    }

    /// 7-bit address
    pub fn address(&self) -> u8 {
        self.address
    }
}

impl fmt::Display for I2cDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{:#04x}", self.bus_path, self.address)
    }
}

/// One I2C adapter and the devices found on it by the last scan
#[derive(Debug, Clone)]
pub struct I2cBus {
    dev_name: String,
    bus_number: u32,
    capabilities: String,
    adapter_name: String,
    algorithm: String,
    devices: Vec<I2cDevice>,
    probe_error: Option<String>,
    tool: Arc<dyn BusTool>,
}

impl I2cBus {
    /// Create a bus with an empty device list. Call [`I2cBus::rescan`] to probe it.
    pub fn new(descriptor: BusDescriptor, tool: Arc<dyn BusTool>) -> Self {
        Self {
            dev_name: descriptor.dev_name,
            bus_number: descriptor.bus_number,
            capabilities: descriptor.capabilities,
            adapter_name: descriptor.adapter_name,
            algorithm: descriptor.algorithm,
            devices: Vec::new(),
            probe_error: None,
            tool,
        }
    }

    /// Kernel device name, e.g. `i2c-1`
    pub fn dev_name(&self) -> &str {
        &self.dev_name
    }

    /// Device file path, e.g. `/dev/i2c-1`
    pub fn path(&self) -> String {
        format!("/dev/{}", self.dev_name)
    }

    pub fn bus_number(&self) -> u32 {
        self.bus_number
    }

    pub fn capabilities(&self) -> &str {
        &self.capabilities
    }

    pub fn adapter_name(&self) -> &str {
        &self.adapter_name
    }

    pub fn algorithm(&self) -> &str {
        &self.algorithm
    }

    /// Devices found by the most recent scan, in address order
    pub fn devices(&self) -> &[I2cDevice] {
        &self.devices
    }

    /// Why the most recent probe produced no output, if it failed
    pub fn probe_error(&self) -> Option<&str> {
        self.probe_error.as_deref()
    }

    /// Probe the bus and replace the device list.
    ///
    /// Probing is best-effort: if the tool fails the device list is left
    /// empty and the failure is kept in [`I2cBus::probe_error`]. Returns the
    /// number of devices found.
    pub fn rescan(&mut self) -> usize {
        self.devices.clear();
        self.probe_error = None;

        let rows = match self.tool.probe_bus(self.bus_number) {
            Ok(rows) => rows,
            Err(e) => {
                warn!("Unable to probe bus {}: {}", self.bus_number, e);
                self.probe_error = Some(e.to_string());
                return 0;
            }
        };

        let path = self.path();
        self.devices = parse_scan_output(&rows)
            .into_iter()
            .map(|address| I2cDevice::new(self.bus_number, path.clone(), address))
            .collect();

        debug!(
            "Bus {} scan found {} device(s): {:02x?}",
            self.bus_number,
            self.devices.len(),
            self.devices.iter().map(I2cDevice::address).collect::<Vec<_>>()
        );
        self.devices.len()
    }

    /// Find a device by address. Absence is a normal outcome.
    pub fn find_device(&self, address: u8) -> Option<&I2cDevice> {
        self.devices.iter().find(|device| device.address == address)
    }
}
