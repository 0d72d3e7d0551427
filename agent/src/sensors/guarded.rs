//! Driver wrapper serialising transactions on a shared bus

use std::sync::{Arc, Mutex};

use tracing::trace;

use crate::hardware::lock::BusLocks;
use crate::sensors::measurement::MeasurementResult;
use crate::sensors::{BoxedDriver, SensorDriver, SensorKind};

/// Holds the bus lock for exactly one `measure()` call
pub struct GuardedDriver {
    inner: BoxedDriver,
    lock: Arc<Mutex<()>>,
}

impl GuardedDriver {
    pub fn new(inner: BoxedDriver, locks: &BusLocks) -> Self {
        let lock = locks.lock_for(inner.bus_path());
        Self { inner, lock }
    }

    pub fn into_inner(self) -> BoxedDriver {
        self.inner
    }
}

impl SensorDriver for GuardedDriver {
    fn kind(&self) -> SensorKind {
        self.inner.kind()
    }

    fn address(&self) -> u8 {
        self.inner.address()
    }

    fn bus_path(&self) -> &str {
        self.inner.bus_path()
    }

    fn measure(&mut self) -> MeasurementResult {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        trace!("bus {} locked for {:#04x}", self.inner.bus_path(), self.inner.address());
        self.inner.measure()
    }
}
