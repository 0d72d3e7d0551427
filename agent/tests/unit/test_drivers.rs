//! Sensor driver tests over the scripted transport

use envsense::errors::SenseError;
use envsense::hardware::mock::{MockTransaction, MockTransport};
use envsense::sensors::am2315::{crc16, Am2315, ChecksumPolicy};
use envsense::sensors::bmp180::{Bmp180, Oversampling};
use envsense::sensors::lm75::Lm75;
use envsense::sensors::mcp9808::Mcp9808;
use envsense::sensors::measurement::{MeasurementReport, QuantityKind};
use envsense::sensors::mpl115a2::Mpl115a2;
use envsense::sensors::tsl2561::{Gain, IntegrationTime, Package, Tsl2561};
use envsense::sensors::{open_driver_with, SensorDriver, SensorKind, SensorSettings};

const BUS: &str = "/dev/i2c-1";

// 50.0 %RH, 25.0 C
const AM2315_FRAME: [u8; 8] = [0x03, 0x04, 0x01, 0xF4, 0x00, 0xFA, 0x31, 0xA5];

// Bosch datasheet example coefficients
const BMP180_CALIBRATION: [u8; 22] = [
    0x01, 0x98, 0xFF, 0xB8, 0xC7, 0xD1, 0x7F, 0xE5, 0x7F, 0xF5, 0x5A, 0x71, 0x18, 0x2E, 0x00,
    0x04, 0x80, 0x00, 0xDD, 0xF9, 0x0B, 0x34,
];

// Freescale AN3785 example
const MPL115A2_COEFFICIENTS: [u8; 8] = [0x3E, 0xCE, 0xB3, 0xF9, 0xC5, 0x17, 0x33, 0xC8];

// ================================== AM2315 ====================================== //

#[test]
fn test_am2315_valid_frame() {
    let mock = MockTransport::new(0x5c);
    mock.push_response(&AM2315_FRAME);

    let mut sensor = Am2315::new(BUS, mock.clone()).unwrap();
    let reading = sensor.read().unwrap();
    assert!(reading.crc_valid);
    assert_eq!(reading.humidity, 50.0);
    assert_eq!(reading.temperature, 25.0);

    assert_eq!(
        mock.transactions(),
        vec![
            MockTransaction::Write(vec![0x00]),
            MockTransaction::Write(vec![0x03, 0x00, 0x04]),
            MockTransaction::Read(8),
        ]
    );
}

#[test]
fn test_am2315_flipped_bit_is_advisory() {
    let mut frame = AM2315_FRAME;
    frame[3] ^= 0x01;
    let mock = MockTransport::new(0x5c);
    mock.push_response(&frame);

    let mut sensor = Am2315::new(BUS, mock).unwrap();
    let reading = sensor.read().unwrap();
    assert!(!reading.crc_valid);
    assert!((reading.humidity - 50.1).abs() < 1e-4);
    assert_eq!(reading.temperature, 25.0);
}

#[test]
fn test_am2315_reject_policy() {
    let mut frame = AM2315_FRAME;
    frame[5] ^= 0x80;
    let mock = MockTransport::new(0x5c);
    mock.push_response(&frame);

    let mut sensor = Am2315::new(BUS, mock)
        .unwrap()
        .with_checksum_policy(ChecksumPolicy::Reject);
    match sensor.read() {
        Err(SenseError::ChecksumMismatch { expected, computed }) => {
            assert_eq!(expected, 0xA531);
            assert_eq!(computed, crc16(&frame[..6]));
        }
        other => panic!("expected checksum mismatch, got {:?}", other),
    }
}

#[test]
fn test_am2315_retry_policy() {
    let mut bad = AM2315_FRAME;
    bad[2] ^= 0x01;
    let mock = MockTransport::new(0x5c);
    mock.push_response(&bad).push_response(&AM2315_FRAME);

    let mut sensor = Am2315::new(BUS, mock.clone())
        .unwrap()
        .with_checksum_policy(ChecksumPolicy::Retry { attempts: 2 });
    assert!(sensor.read().unwrap().crc_valid);
    assert_eq!(mock.pending_responses(), 0);
}

#[test]
fn test_am2315_no_ack_is_transaction_failure() {
    let mut sensor = Am2315::new(BUS, MockTransport::new(0x5c)).unwrap();
    assert!(matches!(sensor.read(), Err(SenseError::TransactionFailure(_))));

    // The driver stays usable
    let mock = MockTransport::new(0x5c);
    let mut sensor = Am2315::new(BUS, mock.clone()).unwrap();
    assert!(sensor.read().is_err());
    mock.push_response(&AM2315_FRAME);
    assert!(sensor.read().is_ok());
}

#[test]
fn test_am2315_measurement_carries_checksum_flag() {
    let mock = MockTransport::new(0x5c);
    mock.push_response(&AM2315_FRAME);

    let mut sensor = Am2315::new(BUS, mock).unwrap();
    let measurement = sensor.measure().unwrap();
    assert_eq!(measurement.checksum_valid, Some(true));
    assert_eq!(measurement.get(QuantityKind::RelativeHumidity), Some(50.0));
}

// ================================== BMP180 ====================================== //

fn bmp180_mock() -> MockTransport {
    let mock = MockTransport::new(0x77);
    mock.push_response(&BMP180_CALIBRATION);
    mock
}

#[test]
fn test_bmp180_datasheet_example() {
    let mock = bmp180_mock();
    mock.push_response(&[0x6C, 0xFA])
        .push_response(&[0x5D, 0x23, 0x00]);

    let mut sensor = Bmp180::new(BUS, mock.clone())
        .unwrap()
        .with_oversampling(Oversampling::UltraLowPower);
    assert_eq!(sensor.calibration().ac6, 23153);

    let reading = sensor.read().unwrap();
    assert!((reading.temperature - 15.0).abs() < 1e-3);
    assert_eq!(reading.pressure, 69964);
    assert!((reading.altitude - 3016.5).abs() < 1.0);

    let writes = mock.writes();
    assert_eq!(writes, vec![vec![0xF4, 0x2E], vec![0xF4, 0x34]]);
}

#[test]
fn test_bmp180_calibration_read_once() {
    let mock = bmp180_mock();
    for _ in 0..2 {
        mock.push_response(&[0x6C, 0xFA]);
    }

    let mut sensor = Bmp180::new(BUS, mock.clone()).unwrap();
    sensor.temperature().unwrap();
    sensor.temperature().unwrap();

    let calibration_reads = mock
        .transactions()
        .into_iter()
        .filter(|t| matches!(t, MockTransaction::WriteRead { write, .. } if write == &vec![0xAA]))
        .count();
    assert_eq!(calibration_reads, 1);
}

#[test]
fn test_bmp180_calibration_failure() {
    let result = Bmp180::new(BUS, MockTransport::new(0x77));
    assert!(matches!(result, Err(SenseError::CalibrationReadFailure(_))));

    let blank = MockTransport::new(0x77);
    blank.push_response(&[0xFF; 22]);
    assert!(matches!(
        Bmp180::new(BUS, blank),
        Err(SenseError::CalibrationReadFailure(_))
    ));
}

// ================================= MPL115A2 ===================================== //

#[test]
fn test_mpl115a2_application_note_example() {
    let mock = MockTransport::new(0x60);
    mock.push_response(&MPL115A2_COEFFICIENTS)
        .push_response(&[0x66, 0x80, 0x7E, 0xC0]);

    let mut sensor = Mpl115a2::new(BUS, mock.clone()).unwrap();
    assert!((sensor.coefficients().a0 - 2009.75).abs() < 1e-9);

    let reading = sensor.read().unwrap();
    assert!((reading.pressure - 96.5873).abs() < 1e-3);
    assert!((reading.temperature - 23.3178).abs() < 1e-3);
    assert!(mock.writes().contains(&vec![0x12, 0x00]));
}

#[test]
fn test_mpl115a2_calibration_failure() {
    let mock = MockTransport::new(0x60);
    mock.push_read_failure("nack");
    assert!(matches!(
        Mpl115a2::new(BUS, mock),
        Err(SenseError::CalibrationReadFailure(_))
    ));
}

// ================================= TSL2561 ====================================== //

#[test]
fn test_tsl2561_lux_at_high_gain() {
    let mock = MockTransport::new(0x39);
    mock.push_response(&1000u16.to_le_bytes())
        .push_response(&200u16.to_le_bytes());

    let mut sensor = Tsl2561::new(BUS, mock.clone()).unwrap();
    sensor.set_gain(Gain::X16).unwrap();
    assert_eq!(sensor.lux().unwrap(), 24);

    assert_eq!(mock.writes()[0], vec![0x81, 0x12]);
    let reads: Vec<MockTransaction> = mock
        .transactions()
        .into_iter()
        .filter(|t| matches!(t, MockTransaction::WriteRead { .. }))
        .collect();
    assert_eq!(
        reads,
        vec![
            MockTransaction::WriteRead { write: vec![0xAC], read_len: 2 },
            MockTransaction::WriteRead { write: vec![0xAE], read_len: 2 },
        ]
    );
}

#[test]
fn test_tsl2561_package_and_integration_time() {
    let mock = MockTransport::new(0x29);
    mock.push_response(&100u16.to_le_bytes())
        .push_response(&0u16.to_le_bytes());

    let mut sensor = Tsl2561::new(BUS, mock.clone()).unwrap();
    sensor.set_package(Package::Cs);
    sensor.set_integration_time(IntegrationTime::Ms13).unwrap();
    sensor.disable_autogain();

    // 13 ms at 1x: ch0 = (100 * (0x7517 << 4)) >> 10 = 46835, ratio 0
    // CS first segment: (46835 * 0x204 + 8192) >> 14 = 1475
    assert_eq!(sensor.lux().unwrap(), 1475);
    assert_eq!(mock.writes()[0], vec![0x81, 0x00]);
}

#[test]
fn test_tsl2561_measurement() {
    let mock = MockTransport::new(0x39);
    mock.push_response(&1000u16.to_le_bytes())
        .push_response(&200u16.to_le_bytes());

    let mut sensor = Tsl2561::new(BUS, mock).unwrap();
    let measurement = sensor.measure().unwrap();
    assert_eq!(measurement.get(QuantityKind::Illuminance), Some(379.0));
    assert_eq!(measurement.get(QuantityKind::Broadband), Some(1000.0));
    assert_eq!(measurement.get(QuantityKind::Infrared), Some(200.0));
    assert_eq!(measurement.checksum_valid, None);
}

// ============================= SIMPLE REGISTER ================================== //

#[test]
fn test_mcp9808_temperature() {
    let mock = MockTransport::new(0x18);
    mock.push_response(&[0x01, 0x94]).push_response(&[0x1F, 0xF0]);

    let mut sensor = Mcp9808::new(BUS, mock).unwrap();
    assert_eq!(sensor.temperature().unwrap(), 25.25);
    assert_eq!(sensor.temperature().unwrap(), -1.0);
}

#[test]
fn test_lm75_temperature() {
    let mock = MockTransport::new(0x48);
    mock.push_response(&[0x19, 0x80]).push_response(&[0xFF, 0x80]);

    let mut sensor = Lm75::new(BUS, mock.clone()).unwrap();
    assert_eq!(sensor.temperature().unwrap(), 25.5);
    assert_eq!(sensor.temperature().unwrap(), -0.5);
    assert_eq!(
        mock.transactions()[0],
        MockTransaction::WriteRead { write: vec![0x00], read_len: 2 }
    );
}

// ================================== FACTORY ===================================== //

#[test]
fn test_open_driver_with_selects_family() {
    let mock = MockTransport::new(0x48);
    mock.push_response(&[0x19, 0x80]);

    let settings = SensorSettings::for_device(SensorKind::Lm75, BUS, 0x48);
    let mut driver = open_driver_with(&settings, Box::new(mock)).unwrap();
    assert_eq!(driver.kind(), SensorKind::Lm75);
    assert_eq!(driver.address(), 0x48);
    assert_eq!(driver.bus_path(), BUS);
    assert_eq!(driver.measure().unwrap().get(QuantityKind::Temperature), Some(25.5));
}

#[test]
fn test_open_driver_with_applies_settings() {
    let mock = MockTransport::new(0x5c);
    let mut bad = AM2315_FRAME;
    bad[4] ^= 0x01;
    mock.push_response(&bad);

    let mut settings = SensorSettings::new(SensorKind::Am2315);
    settings.checksum = ChecksumPolicy::Reject;
    let mut driver = open_driver_with(&settings, Box::new(mock)).unwrap();
    assert!(matches!(driver.measure(), Err(SenseError::ChecksumMismatch { .. })));
}

#[test]
fn test_open_driver_with_calibration_failure() {
    let settings = SensorSettings::new(SensorKind::Bmp180);
    let result = open_driver_with(&settings, Box::new(MockTransport::new(0x77)));
    assert!(matches!(result, Err(SenseError::CalibrationReadFailure(_))));
}

#[test]
fn test_open_driver_with_address_mismatch() {
    let mock = MockTransport::new(0x49);
    let settings = SensorSettings::for_device(SensorKind::Tsl2561, BUS, 0x39);
    let result = open_driver_with(&settings, Box::new(mock.clone()));

    assert!(matches!(result, Err(SenseError::ConfigError(_))));
    assert!(mock.transactions().is_empty());
}

#[test]
fn test_failed_measurement_report() {
    let mut driver = Lm75::new(BUS, MockTransport::new(0x48)).unwrap();
    let result = driver.measure();
    let report = MeasurementReport::from_result(SensorKind::Lm75, 0x48, BUS, &result);

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["status"], "error");
    assert_eq!(json["kind"], "transaction_failure");
    assert_eq!(json["sensor"], "lm75");
}
