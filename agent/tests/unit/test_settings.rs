//! Settings file tests

use envsense::app::options::AppOptions;
use envsense::filesys::file::File;
use envsense::sensors::bmp180::Oversampling;
use envsense::sensors::tsl2561::{Gain, IntegrationTime};
use envsense::sensors::{SensorKind, SensorSettings};
use envsense::storage::settings::Settings;

#[test]
fn test_settings_round_trip_through_file() {
    let dir = std::env::temp_dir().join(format!("envsense-settings-{}", std::process::id()));
    let file = File::new(dir.join("settings.json"));

    let mut bmp = SensorSettings::new(SensorKind::Bmp180);
    bmp.oversampling = Oversampling::UltraHighResolution;
    bmp.sea_level_pa = 102_000.0;
    let mut tsl = SensorSettings::for_device(SensorKind::Tsl2561, "/dev/i2c-0", 0x29);
    tsl.light.gain = Gain::X16;
    tsl.light.integration_time = IntegrationTime::Ms13;

    let settings = Settings {
        sensors: vec![bmp, tsl],
        ..Default::default()
    };

    tokio_test::block_on(async {
        file.write_json(&settings).await.unwrap();
        let loaded: Settings = file.read_json().await.unwrap();

        assert_eq!(loaded.sensors, settings.sensors);
        assert_eq!(loaded.sensors[1].address(), 0x29);
        assert_eq!(loaded.sensors[1].light.integration_time, IntegrationTime::Ms13);
    });

    std::fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn test_app_options_from_settings() {
    let settings: Settings = serde_json::from_str(
        r#"{
            "discovery": {"tool": "/usr/sbin/i2cdetect", "replay_dir": "/tmp/captures"},
            "poller": {"interval_secs": 0, "initial_delay_secs": 2, "emit_json": false},
            "sensors": [{"kind": "mcp9808"}]
        }"#,
    )
    .unwrap();

    let options = AppOptions::from_settings(&settings);
    assert_eq!(options.discovery.tool.to_str(), Some("/usr/sbin/i2cdetect"));
    assert!(options.discovery.replay_dir.is_some());
    // Interval is clamped to one second
    assert_eq!(options.poller.interval.as_secs(), 1);
    assert_eq!(options.poller.initial_delay.as_secs(), 2);
    assert!(!options.poller.emit_json);
    assert_eq!(options.sensors[0].address(), 0x18);
}

#[test]
fn test_unknown_sensor_kind_is_rejected() {
    let result = serde_json::from_str::<Settings>(r#"{"sensors": [{"kind": "dht22"}]}"#);
    assert!(result.is_err());
}
