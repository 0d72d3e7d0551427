//! Per-bus transaction locks

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// One lock per bus device path.
///
/// Drivers on the same bus share a lock; drivers on different buses never
/// contend.
#[derive(Debug, Default)]
pub struct BusLocks {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl BusLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get (or create) the lock for `bus_path`
    pub fn lock_for(&self, bus_path: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        locks
            .entry(bus_path.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Number of buses with a lock
    pub fn len(&self) -> usize {
        self.locks.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
