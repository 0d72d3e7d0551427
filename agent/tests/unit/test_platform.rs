//! Platform discovery tests against replayed tool output

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Barrier, Mutex};
use std::thread;

use envsense::discovery::platform::Platform;
use envsense::discovery::tool::{BusTool, ReplayTool};
use envsense::errors::SenseError;

const HEADER: &str = "     0  1  2  3  4  5  6  7  8  9  a  b  c  d  e  f";

fn dump(rows: &[&str]) -> String {
    let mut text = String::from(HEADER);
    for row in rows {
        text.push('\n');
        text.push_str(row);
    }
    text.push('\n');
    text
}

fn platform_with(tool: ReplayTool) -> (Platform, Arc<ReplayTool>) {
    let tool = Arc::new(tool);
    let platform = Platform::new(tool.clone() as Arc<dyn BusTool>);
    (platform, tool)
}

#[test]
fn test_single_bus_single_device() {
    let tool = ReplayTool::new()
        .with_listing("i2c-1\tI2C\tbcm2835\tI2C adapter\n")
        .with_probe(1, dump(&["50: -- -- -- -- -- -- -- -- -- -- -- -- 5c -- -- --"]));
    let (platform, _) = platform_with(tool);

    assert_eq!(platform.update().unwrap(), 1);

    let buses = platform.buses();
    assert_eq!(buses.len(), 1);
    assert_eq!(buses[0].bus_number(), 1);
    assert_eq!(buses[0].path(), "/dev/i2c-1");
    assert_eq!(buses[0].adapter_name(), "bcm2835");

    let devices = buses[0].devices();
    assert_eq!(devices.len(), 1);
    assert_eq!(devices[0].address(), 0x5c);
    assert_eq!(devices[0].bus_path(), "/dev/i2c-1");
}

#[test]
fn test_find_device_across_buses() {
    let tool = ReplayTool::new()
        .with_listing("i2c-0\ti2c\tadapter-a\tI2C adapter\ni2c-1\ti2c\tadapter-b\tI2C adapter\n")
        .with_probe(0, dump(&["30: -- -- -- -- -- -- -- -- -- 39 -- -- -- -- -- --"]))
        .with_probe(1, dump(&["40: -- -- -- -- -- -- -- -- 48 -- -- -- -- -- -- --"]));
    let (platform, _) = platform_with(tool);
    platform.update().unwrap();

    let found = platform.find_i2c_device(0x39, None);
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].bus_number(), 0);

    assert!(platform.find_i2c_device(0x39, Some(1)).is_empty());
    assert!(platform.find_i2c_device(0x10, None).is_empty());

    let mut visited = Vec::new();
    platform.find_i2c_device_with(0x48, None, |device| visited.push(device.to_string()));
    assert_eq!(visited, vec!["/dev/i2c-1@0x48".to_string()]);
}

#[test]
fn test_same_address_on_two_buses() {
    let row = "30: -- -- -- -- -- -- -- -- -- 39 -- -- -- -- -- --";
    let tool = ReplayTool::new()
        .with_listing("i2c-1\ti2c\ta\tI2C adapter\ni2c-3\ti2c\tb\tI2C adapter\n")
        .with_probe(1, dump(&[row]))
        .with_probe(3, dump(&[row]));
    let (platform, _) = platform_with(tool);
    platform.update().unwrap();

    let buses: Vec<u32> = platform
        .find_i2c_device(0x39, None)
        .iter()
        .map(|device| device.bus_number())
        .collect();
    assert_eq!(buses, vec![1, 3]);
}

#[test]
fn test_unavailable_tool_clears_stale_buses() {
    let tool = ReplayTool::new()
        .with_listing("i2c-1\tI2C\tbcm2835\tI2C adapter\n")
        .with_probe(1, dump(&["50: -- -- -- -- -- -- -- -- -- -- -- -- 5c -- -- --"]));
    let (platform, tool) = platform_with(tool);
    platform.update().unwrap();
    assert_eq!(platform.buses().len(), 1);

    tool.set_listing(None);
    let err = platform.update().unwrap_err();
    assert!(matches!(err, SenseError::DiscoveryUnavailable(_)));
    assert!(platform.buses().is_empty());
    assert!(platform.devices().is_empty());
}

#[test]
fn test_enumerate_without_tool_is_empty() {
    let platform = Platform::enumerate(Arc::new(ReplayTool::new()));
    assert!(platform.buses().is_empty());
}

#[test]
fn test_malformed_rows_are_skipped() {
    let tool = ReplayTool::new()
        .with_listing(
            "garbage line\n\
             i2c-x\ti2c\tbroken\tI2C adapter\n\
             i2c-2\ti2c\tgood\tI2C adapter\n\
             i2c-2\ti2c\tduplicate\tI2C adapter\n",
        )
        .with_probe(2, dump(&["10: -- -- -- -- -- -- -- -- 18 -- -- -- -- -- -- --"]));
    let (platform, _) = platform_with(tool);

    assert_eq!(platform.update().unwrap(), 1);
    let bus = platform.bus(2).unwrap();
    assert_eq!(bus.adapter_name(), "good");
    assert_eq!(bus.devices().len(), 1);
}

#[test]
fn test_probe_failure_keeps_bus() {
    let tool = ReplayTool::new()
        .with_listing("i2c-0\ti2c\ta\tI2C adapter\ni2c-1\ti2c\tb\tI2C adapter\n")
        .with_probe(1, dump(&["70: -- -- -- -- -- -- -- 77"]));
    let (platform, _) = platform_with(tool);

    assert_eq!(platform.update().unwrap(), 2);
    let bus0 = platform.bus(0).unwrap();
    assert!(bus0.devices().is_empty());
    assert!(bus0.probe_error().is_some());
    assert_eq!(platform.bus(1).unwrap().devices()[0].address(), 0x77);
}

#[test]
fn test_rescan_is_idempotent() {
    let tool = ReplayTool::new()
        .with_listing("i2c-1\ti2c\ta\tI2C adapter\n")
        .with_probe(1, dump(&["30: -- -- -- -- -- -- -- -- -- 39 -- -- -- -- -- --"]));
    let (platform, _) = platform_with(tool);
    platform.update().unwrap();

    let mut bus = platform.bus(1).unwrap();
    let first = bus.devices().to_vec();
    bus.rescan();
    assert_eq!(bus.devices(), first.as_slice());
}

#[test]
fn test_rescan_bus_sees_hardware_change() {
    let tool = ReplayTool::new()
        .with_listing("i2c-1\ti2c\ta\tI2C adapter\n")
        .with_probe(1, dump(&["30: -- -- -- -- -- -- -- -- -- 39 -- -- -- -- -- --"]));
    let (platform, tool) = platform_with(tool);
    platform.update().unwrap();

    tool.set_probe(
        1,
        dump(&[
            "30: -- -- -- -- -- -- -- -- -- 39 -- -- -- -- -- --",
            "70: -- -- -- -- -- -- -- 77",
        ]),
    );
    // Snapshots taken before the rescan do not change
    let before = platform.snapshot();

    assert_eq!(platform.rescan_bus(1), Some(2));
    assert_eq!(platform.rescan_bus(9), None);
    assert_eq!(before.get(&1).unwrap().devices().len(), 1);
    assert_eq!(platform.find_i2c_device(0x77, Some(1)).len(), 1);

    tool.clear_probe(1);
    assert_eq!(platform.rescan_all(), 0);
    assert!(platform.devices().is_empty());
}

#[test]
fn test_readers_never_see_partial_update() {
    let two_buses = "i2c-0\ti2c\ta\tI2C adapter\ni2c-1\ti2c\tb\tI2C adapter\n";
    let one_bus = "i2c-5\ti2c\tc\tI2C adapter\n";
    let tool = ReplayTool::new()
        .with_listing(two_buses)
        .with_probe(0, dump(&[]))
        .with_probe(1, dump(&[]))
        .with_probe(5, dump(&[]));
    let (platform, tool) = platform_with(tool);
    platform.update().unwrap();
    let platform = Arc::new(platform);

    let writer = {
        let platform = platform.clone();
        thread::spawn(move || {
            for i in 0..200 {
                tool.set_listing(Some(if i % 2 == 0 { one_bus } else { two_buses }.to_string()));
                platform.update().unwrap();
            }
        })
    };

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let platform = platform.clone();
            thread::spawn(move || {
                for _ in 0..500 {
                    let keys: Vec<u32> = platform.snapshot().keys().copied().collect();
                    assert!(keys == vec![0, 1] || keys == vec![5], "partial mapping: {:?}", keys);
                }
            })
        })
        .collect();

    writer.join().unwrap();
    for reader in readers {
        reader.join().unwrap();
    }
}

#[test]
fn test_replay_from_dir() {
    let dir = std::env::temp_dir().join(format!("envsense-replay-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("buses.txt"), "i2c-1\ti2c\tbcm2835\tI2C adapter\n").unwrap();
    std::fs::write(
        dir.join("bus-1.txt"),
        dump(&["60: 60 -- -- -- -- -- -- -- -- -- -- -- -- -- -- --"]),
    )
    .unwrap();

    let platform = Platform::enumerate(Arc::new(ReplayTool::from_dir(&dir).unwrap()));
    assert_eq!(platform.find_i2c_device(0x60, Some(1)).len(), 1);

    std::fs::remove_dir_all(&dir).unwrap();
}

/// Bus tool whose next probe blocks until the test releases it.
///
/// The probe output is captured before blocking, so a held probe returns
/// what the bus looked like when it started.
#[derive(Debug)]
struct GatedTool {
    listing: Mutex<Option<String>>,
    probes: Mutex<HashMap<u32, String>>,
    armed: AtomicBool,
    entered: Barrier,
    release: Barrier,
}

impl GatedTool {
    fn new(listing: &str) -> Self {
        Self {
            listing: Mutex::new(Some(listing.to_string())),
            probes: Mutex::new(HashMap::new()),
            armed: AtomicBool::new(false),
            entered: Barrier::new(2),
            release: Barrier::new(2),
        }
    }

    fn set_listing(&self, listing: Option<&str>) {
        *self.listing.lock().unwrap() = listing.map(str::to_string);
    }

    fn set_probe(&self, bus_number: u32, dump: String) {
        self.probes.lock().unwrap().insert(bus_number, dump);
    }

    fn hold_next_probe(&self) {
        self.armed.store(true, Ordering::SeqCst);
    }
}

impl BusTool for GatedTool {
    fn list_buses(&self) -> Result<Vec<String>, SenseError> {
        match self.listing.lock().unwrap().as_deref() {
            Some(listing) => Ok(listing.lines().map(str::to_string).collect()),
            None => Err(SenseError::DiscoveryUnavailable("i2cdetect not found".to_string())),
        }
    }

    fn probe_bus(&self, bus_number: u32) -> Result<Vec<String>, SenseError> {
        let dump = self.probes.lock().unwrap().get(&bus_number).cloned().unwrap_or_default();
        if self.armed.swap(false, Ordering::SeqCst) {
            self.entered.wait();
            self.release.wait();
        }
        Ok(dump.lines().map(str::to_string).collect())
    }
}

#[test]
fn test_rescan_all_does_not_restore_buses_after_failed_update() {
    let tool = Arc::new(GatedTool::new("i2c-0\tI2C\tbcm2835\tI2C adapter\n"));
    tool.set_probe(0, dump(&["30: -- -- -- -- -- -- -- -- -- 39 -- -- -- -- -- --"]));
    let platform = Arc::new(Platform::new(tool.clone() as Arc<dyn BusTool>));
    assert_eq!(platform.update().unwrap(), 1);

    tool.hold_next_probe();
    let rescan = {
        let platform = platform.clone();
        thread::spawn(move || platform.rescan_all())
    };
    tool.entered.wait();

    tool.set_listing(None);
    assert!(platform.update().is_err());
    assert!(platform.snapshot().is_empty());

    tool.release.wait();
    rescan.join().unwrap();

    assert!(platform.buses().is_empty());
    assert!(platform.find_i2c_device(0x39, None).is_empty());
}

#[test]
fn test_rescan_bus_does_not_overwrite_concurrent_update() {
    let tool = Arc::new(GatedTool::new("i2c-0\tI2C\tbcm2835\tI2C adapter\n"));
    tool.set_probe(0, dump(&["30: -- -- -- -- -- -- -- -- -- 39 -- -- -- -- -- --"]));
    let platform = Arc::new(Platform::new(tool.clone() as Arc<dyn BusTool>));
    platform.update().unwrap();

    tool.hold_next_probe();
    let rescan = {
        let platform = platform.clone();
        thread::spawn(move || platform.rescan_bus(0))
    };
    tool.entered.wait();

    tool.set_probe(0, dump(&["40: -- -- -- -- -- -- -- -- 48 -- -- -- -- -- -- --"]));
    assert_eq!(platform.update().unwrap(), 1);

    tool.release.wait();
    assert_eq!(rescan.join().unwrap(), Some(1));

    assert_eq!(platform.find_i2c_device(0x48, Some(0)).len(), 1);
    assert!(platform.find_i2c_device(0x39, None).is_empty());
}

#[test]
fn test_sequential_rescans_still_publish() {
    let tool = Arc::new(GatedTool::new("i2c-0\tI2C\tbcm2835\tI2C adapter\n"));
    tool.set_probe(0, dump(&["30: -- -- -- -- -- -- -- -- -- 39 -- -- -- -- -- --"]));
    let platform = Platform::new(tool.clone() as Arc<dyn BusTool>);
    platform.update().unwrap();

    tool.set_probe(0, dump(&["40: -- -- -- -- -- -- -- -- 48 -- -- -- -- -- -- --"]));
    assert_eq!(platform.rescan_bus(0), Some(1));
    assert_eq!(platform.find_i2c_device(0x48, Some(0)).len(), 1);

    tool.set_probe(0, dump(&["50: -- -- -- -- -- -- -- -- -- -- -- -- 5c -- -- --"]));
    assert_eq!(platform.rescan_all(), 1);
    assert_eq!(platform.find_i2c_device(0x5c, Some(0)).len(), 1);
}
