use chrono::NaiveTime;
use solar_savings::config::Config;

#[test]
fn save_and_load_yaml_roundtrip() {
    let tmp_dir = tempfile::tempdir().unwrap();
    let path = tmp_dir.path().join("solar_savings.yaml");

    let mut cfg = Config::default();
    cfg.host.time_zone = "Europe/Amsterdam".to_string();
    cfg.host.currency = "EUR".to_string();
    cfg.scheduler.hour = 3;
    cfg.logging.file = path.with_extension("log").to_string_lossy().to_string();

    cfg.save_to_file(&path).unwrap();
    let loaded = Config::from_file(&path).unwrap();

    assert_eq!(loaded.host.tz().unwrap(), chrono_tz::Europe::Amsterdam);
    assert_eq!(loaded.host.currency, "EUR");
    assert_eq!(
        loaded.scheduler.check_time().unwrap(),
        NaiveTime::from_hms_opt(3, 0, 1).unwrap()
    );
    assert_eq!(loaded.logging.file, cfg.logging.file);
    assert!(loaded.validate().is_ok());
}

#[test]
fn config_validation_errors() {
    let mut cfg = Config::default();
    assert!(cfg.validate().is_ok());

    cfg.host.time_zone = "Nowhere/Special".to_string();
    assert!(cfg.validate().is_err());

    cfg = Config::default();
    cfg.host.currency = "U$D".to_string();
    assert!(cfg.validate().is_err());

    cfg = Config::default();
    cfg.scheduler.minute = 60;
    assert!(cfg.validate().is_err());

    cfg = Config::default();
    cfg.storage.entries_file = " ".to_string();
    assert!(cfg.validate().is_err());

    cfg = Config::default();
    cfg.logging.level = "LOUD".to_string();
    assert!(cfg.validate().is_err());

    cfg = Config::default();
    cfg.host
        .schedules
        .insert("sensor.tou".to_string(), "on".to_string());
    assert!(cfg.validate().is_err());

    cfg = Config::default();
    cfg.host
        .schedules
        .insert("schedule.".to_string(), "on".to_string());
    assert!(cfg.validate().is_err());
}

#[test]
fn schedules_load_from_yaml() {
    let tmp = tempfile::NamedTempFile::new().unwrap();
    std::fs::write(
        tmp.path(),
        "host:\n  time_zone: America/New_York\n  schedules:\n    schedule.tou: \"on\"\n    schedule.winter: \"off\"\n",
    )
    .unwrap();
    let cfg = Config::from_file(tmp.path()).unwrap();
    assert_eq!(cfg.host.currency, "USD");
    assert_eq!(cfg.host.schedules.len(), 2);
    assert_eq!(cfg.host.schedules["schedule.tou"], "on");
    assert!(cfg.validate().is_ok());
}

#[test]
fn malformed_yaml_is_an_error() {
    let tmp = tempfile::NamedTempFile::new().unwrap();
    std::fs::write(tmp.path(), "host: [unclosed").unwrap();
    assert!(Config::from_file(tmp.path()).is_err());
}
