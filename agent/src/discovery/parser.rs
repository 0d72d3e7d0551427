//! Parsers for `i2cdetect` style diagnostic output
//!
//! Both parsers are pure. Bus-scan rows never fail: tokens that are not a
//! usable address are skipped. Bus-listing rows fail individually so the
//! caller can drop one bad line and keep the rest.

use std::collections::BTreeSet;

use crate::errors::SenseError;

/// Prefix of the kernel device name of an I2C adapter (`i2c-1`)
pub const BUS_NAME_PREFIX: &str = "i2c-";

/// Highest valid 7-bit address
pub const MAX_ADDRESS: u8 = 0x7f;

/// Scan-dump marker for an address that did not answer
const NO_DEVICE: &str = "--";

/// Scan-dump marker for an address claimed by a kernel driver
const RESERVED: &str = "UU";

/// Parse one row of a bus-scan dump into the addresses present on it.
///
/// The row prefix (`"40:"`) is discarded. `--`, `UU`, blank cells and any
/// token that is not exactly two hex digits are ignored.
pub fn parse_scan_row(row: &str) -> BTreeSet<u8> {
    let Some((_prefix, cells)) = row.split_once(':') else {
        return BTreeSet::new();
    };

    cells
        .split_whitespace()
        .filter(|token| *token != NO_DEVICE && *token != RESERVED)
        .filter(|token| token.len() == 2)
        .filter_map(|token| u8::from_str_radix(token, 16).ok())
        .filter(|addr| *addr <= MAX_ADDRESS)
        .collect()
}

/// Parse a complete bus-scan dump (header line followed by rows).
///
/// Returns the present addresses in ascending order.
pub fn parse_scan_output<S: AsRef<str>>(lines: &[S]) -> Vec<u8> {
    lines
        .iter()
        .skip(1)
        .flat_map(|line| parse_scan_row(line.as_ref()))
        .collect::<BTreeSet<u8>>()
        .into_iter()
        .collect()
}

/// One row of the bus listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusDescriptor {
    /// Kernel device name, e.g. `i2c-1`
    pub dev_name: String,

    /// Numeric id derived from `dev_name`
    pub bus_number: u32,

    /// Capability flags column (`i2c`, `smbus`)
    pub capabilities: String,

    /// Adapter name, e.g. `bcm2835 (i2c@7e804000)`
    pub adapter_name: String,

    /// Algorithm name, e.g. `I2C adapter`
    pub algorithm: String,
}

/// Parse one tab-separated bus-listing row:
/// `device_name \t capability_flags \t adapter_name \t algorithm_name`
pub fn parse_bus_row(row: &str) -> Result<BusDescriptor, SenseError> {
    let fields: Vec<&str> = row.split('\t').map(str::trim).collect();
    if fields.len() != 4 {
        return Err(SenseError::MalformedScanOutput(format!(
            "expected 4 tab-separated fields, found {}: {:?}",
            fields.len(),
            row
        )));
    }

    let dev_name = fields[0];
    let bus_number = bus_number_from_name(dev_name)?;

    Ok(BusDescriptor {
        dev_name: dev_name.to_string(),
        bus_number,
        capabilities: fields[1].to_string(),
        adapter_name: fields[2].to_string(),
        algorithm: fields[3].to_string(),
    })
}

/// Derive the bus number from a device name such as `i2c-1`
pub fn bus_number_from_name(dev_name: &str) -> Result<u32, SenseError> {
    dev_name
        .strip_prefix(BUS_NAME_PREFIX)
        .and_then(|suffix| suffix.parse::<u32>().ok())
        .ok_or_else(|| {
            SenseError::MalformedScanOutput(format!("not an I2C device name: {:?}", dev_name))
        })
}

/// Derive the bus number from a device path such as `/dev/i2c-1`
pub fn bus_number_from_path(path: &str) -> Option<u32> {
    let name = path.rsplit('/').next()?;
    bus_number_from_name(name).ok()
}
