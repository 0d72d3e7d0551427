//! Host platform: every I2C bus and the devices on it

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use tracing::{debug, info, warn};

use crate::discovery::bus::{I2cBus, I2cDevice};
use crate::discovery::parser::parse_bus_row;
use crate::discovery::tool::BusTool;
use crate::errors::SenseError;

/// Buses keyed by bus number
pub type BusMap = BTreeMap<u32, I2cBus>;

/// Discovery session over the host's I2C buses.
///
/// The bus mapping is published as an immutable snapshot. Every mutating
/// operation builds a complete replacement and swaps it in under the write
/// lock, so readers see either the old or the new mapping.
///
/// Scoped rescans probe outside the lock and only publish if no other write
/// happened in the meantime, so they never undo an [`Platform::update`].
#[derive(Debug)]
pub struct Platform {
    tool: Arc<dyn BusTool>,
    buses: RwLock<Published>,
}

#[derive(Debug, Default)]
struct Published {
    generation: u64,
    buses: Arc<BusMap>,
}

impl Platform {
    /// Create a platform with no buses. Call [`Platform::update`] to enumerate.
    pub fn new(tool: Arc<dyn BusTool>) -> Self {
        Self {
            tool,
            buses: RwLock::new(Published::default()),
        }
    }

    /// Create a platform and enumerate it once.
    ///
    /// Enumeration failures are logged and leave the platform empty.
    pub fn enumerate(tool: Arc<dyn BusTool>) -> Self {
        let platform = Self::new(tool);
        if let Err(e) = platform.update() {
            warn!("I2C bus enumeration failed: {}", e);
        }
        platform
    }

    /// Re-enumerate all buses and probe each of them.
    ///
    /// Rows that cannot be parsed are skipped. If the listing tool itself
    /// cannot be run the mapping becomes empty and the error is returned.
    /// Returns the number of buses found.
    pub fn update(&self) -> Result<usize, SenseError> {
        let rows = match self.tool.list_buses() {
            Ok(rows) => rows,
            Err(e) => {
                self.publish(BusMap::new());
                return Err(e);
            }
        };

        let mut buses = BusMap::new();
        for row in &rows {
            let descriptor = match parse_bus_row(row) {
                Ok(descriptor) => descriptor,
                Err(e) => {
                    warn!("Skipping bus listing row: {}", e);
                    continue;
                }
            };

            if buses.contains_key(&descriptor.bus_number) {
                warn!("Duplicate bus number {} in listing, keeping the first", descriptor.bus_number);
                continue;
            }

            let mut bus = I2cBus::new(descriptor, self.tool.clone());
            bus.rescan();
            buses.insert(bus.bus_number(), bus);
        }

        let count = buses.len();
        info!(
            "Discovered {} I2C bus(es) with {} device(s)",
            count,
            buses.values().map(|bus| bus.devices().len()).sum::<usize>()
        );
        self.publish(buses);
        Ok(count)
    }

    /// Re-probe one bus. Returns its new device count, or `None` if the bus
    /// is unknown.
    ///
    /// The result is dropped if the mapping was replaced while probing.
    pub fn rescan_bus(&self, bus_number: u32) -> Option<usize> {
        let (generation, current) = self.current();
        let mut bus = current.get(&bus_number)?.clone();
        let count = bus.rescan();

        let mut next = BusMap::clone(&current);
        next.insert(bus_number, bus);
        if !self.publish_if(generation, next) {
            debug!("Mapping changed while rescanning bus {}, result dropped", bus_number);
        }
        Some(count)
    }

    /// Re-probe every known bus without re-enumerating.
    ///
    /// The result is dropped if the mapping was replaced while probing.
    pub fn rescan_all(&self) -> usize {
        let (generation, current) = self.current();
        let mut next = BusMap::clone(&current);
        let count = next.values_mut().map(I2cBus::rescan).sum();
        if !self.publish_if(generation, next) {
            debug!("Mapping changed while rescanning all buses, result dropped");
        }
        count
    }

    /// Current bus mapping
    pub fn snapshot(&self) -> Arc<BusMap> {
        self.current().1
    }

    /// All buses in bus-number order
    pub fn buses(&self) -> Vec<I2cBus> {
        self.snapshot().values().cloned().collect()
    }

    /// Get one bus by number
    pub fn bus(&self, bus_number: u32) -> Option<I2cBus> {
        self.snapshot().get(&bus_number).cloned()
    }

    /// Every device on every bus
    pub fn devices(&self) -> Vec<I2cDevice> {
        self.snapshot()
            .values()
            .flat_map(|bus| bus.devices().iter().cloned())
            .collect()
    }

    /// Find `address` on one bus, or on all buses when `bus_number` is `None`.
    ///
    /// An address may be present on several buses. Results are in
    /// bus-number order.
    pub fn find_i2c_device(&self, address: u8, bus_number: Option<u32>) -> Vec<I2cDevice> {
        self.find_i2c_device_with(address, bus_number, |_| {})
    }

    /// Same as [`Platform::find_i2c_device`], calling `visitor` for each match
    pub fn find_i2c_device_with<F>(
        &self,
        address: u8,
        bus_number: Option<u32>,
        mut visitor: F,
    ) -> Vec<I2cDevice>
    where
        F: FnMut(&I2cDevice),
    {
        let snapshot = self.snapshot();
        let buses: Vec<&I2cBus> = match bus_number {
            Some(number) => snapshot.get(&number).into_iter().collect(),
            None => snapshot.values().collect(),
        };

        let found: Vec<I2cDevice> = buses
            .into_iter()
            .filter_map(|bus| bus.find_device(address).cloned())
            .collect();

        found.iter().for_each(&mut visitor);
        found
    }

    fn current(&self) -> (u64, Arc<BusMap>) {
        let guard = self.buses.read().unwrap_or_else(|e| e.into_inner());
        (guard.generation, guard.buses.clone())
    }

    fn publish(&self, buses: BusMap) {
        let mut guard = self.buses.write().unwrap_or_else(|e| e.into_inner());
        guard.generation += 1;
        guard.buses = Arc::new(buses);
    }

    /// Publish `buses` only if nothing was published since `generation`
    fn publish_if(&self, generation: u64, buses: BusMap) -> bool {
        let mut guard = self.buses.write().unwrap_or_else(|e| e.into_inner());
        if guard.generation != generation {
            return false;
        }
        guard.generation += 1;
        guard.buses = Arc::new(buses);
        true
    }
}
