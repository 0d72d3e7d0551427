//! Scan and listing parser tests

use envsense::discovery::parser::{
    bus_number_from_name, bus_number_from_path, parse_bus_row, parse_scan_output, parse_scan_row,
};
use envsense::errors::SenseError;

const FULL_DUMP: [&str; 9] = [
    "     0  1  2  3  4  5  6  7  8  9  a  b  c  d  e  f",
    "00:          -- -- -- -- -- -- -- -- -- -- -- -- --",
    "10: -- -- -- -- -- -- -- -- 18 -- -- -- -- -- -- --",
    "20: -- -- -- -- -- -- -- -- -- -- -- -- -- -- -- --",
    "30: -- -- -- -- -- -- -- -- -- 39 -- -- -- -- -- --",
    "40: -- -- -- -- -- -- -- -- 48 -- -- -- -- -- -- --",
    "50: -- -- -- -- -- -- -- -- -- -- -- -- 5c -- -- --",
    "60: 60 -- -- -- -- -- -- -- UU -- -- -- -- -- -- --",
    "70: -- -- -- -- -- -- -- 77                         ",
];

#[test]
fn test_scan_row_never_reports_sentinels() {
    let row = "40: 40 -- UU 5c";
    let found: Vec<u8> = parse_scan_row(row).into_iter().collect();
    // Tokens map to their own value, not their column
    assert_eq!(found, vec![0x40, 0x5c]);
}

#[test]
fn test_scan_row_without_prefix_is_empty() {
    assert!(parse_scan_row("no devices here").is_empty());
    assert!(parse_scan_row("").is_empty());
}

#[test]
fn test_scan_row_ignores_odd_tokens() {
    let row = "70: 7 777 zz 80 ff 7f";
    let found: Vec<u8> = parse_scan_row(row).into_iter().collect();
    assert_eq!(found, vec![0x7f]);
}

#[test]
fn test_full_dump() {
    assert_eq!(
        parse_scan_output(&FULL_DUMP),
        vec![0x18, 0x39, 0x48, 0x5c, 0x60, 0x77]
    );
}

#[test]
fn test_header_line_is_skipped() {
    // A header that happens to contain a colon must not contribute addresses
    let lines = ["hdr: 10 20", "10: -- 11"];
    assert_eq!(parse_scan_output(&lines), vec![0x11]);
}

#[test]
fn test_bus_row() {
    let row = "i2c-1\ti2c       \tbcm2835 (i2c@7e804000)         \tI2C adapter";
    let descriptor = parse_bus_row(row).unwrap();
    assert_eq!(descriptor.dev_name, "i2c-1");
    assert_eq!(descriptor.bus_number, 1);
    assert_eq!(descriptor.capabilities, "i2c");
    assert_eq!(descriptor.adapter_name, "bcm2835 (i2c@7e804000)");
    assert_eq!(descriptor.algorithm, "I2C adapter");
}

#[test]
fn test_bus_row_malformed() {
    assert!(matches!(
        parse_bus_row("i2c-1 i2c bcm2835"),
        Err(SenseError::MalformedScanOutput(_))
    ));
    assert!(matches!(
        parse_bus_row("i2c-x\ti2c\tadapter\tI2C adapter"),
        Err(SenseError::MalformedScanOutput(_))
    ));
}

#[test]
fn test_bus_numbers() {
    assert_eq!(bus_number_from_name("i2c-22").unwrap(), 22);
    assert!(bus_number_from_name("spi-0").is_err());
    assert_eq!(bus_number_from_path("/dev/i2c-0"), Some(0));
    assert_eq!(bus_number_from_path("/dev/ttyS0"), None);
}
