use chrono::{DateTime, NaiveTime, TimeZone, Utc};
use serde_json::{Value, json};
use solar_savings::host::{FixedClock, Host, LocalHost};
use solar_savings::integration::{EntryRuntime, setup_entry};
use solar_savings::keys;
use solar_savings::persistence::EntryStore;
use solar_savings::store::OptionsMap;
use std::sync::Arc;
use std::time::Duration;

const DAY: Duration = Duration::from_secs(24 * 60 * 60);

fn map(v: Value) -> OptionsMap {
    v.as_object().cloned().unwrap_or_default()
}

fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
}

fn check_time() -> NaiveTime {
    NaiveTime::from_hms_opt(0, 0, 1).unwrap()
}

async fn setup(host: &Arc<LocalHost>, options: Value) -> EntryRuntime {
    let entry = host
        .create_entry(
            keys::DOMAIN,
            keys::ENTRY_TITLE,
            map(json!({
                "peak_schedule": "schedule.tou",
                "on_peak_rate": 32.5,
                "off_peak_rate": 18.0
            })),
        )
        .await
        .unwrap();
    host.update_entry_options(&entry.entry_id, map(options))
        .await
        .unwrap();
    let entry = host.config_entry(&entry.entry_id).unwrap();
    setup_entry(host.clone(), entry, check_time()).await.unwrap()
}

fn rate(host: &LocalHost, entry_id: &str, key: &str) -> f64 {
    host.config_entry(entry_id).unwrap().get_f64(key, 0.0)
}

#[tokio::test(start_paused = true)]
async fn promotes_at_local_check_time_and_stops_after_unload() {
    // 23:59 in New York on July 1st
    let clock = Arc::new(FixedClock::new(utc(2025, 7, 2, 3, 59, 0)));
    let host = Arc::new(
        LocalHost::new(chrono_tz::America::New_York, "USD", EntryStore::in_memory())
            .with_clock(clock.clone()),
    );
    let runtime = setup(
        &host,
        json!({"future_on_peak_rate": 45.0, "scheduled_date": "2025-07-02"}),
    )
    .await;
    let entry_id = runtime.store().entry_id();
    assert!(runtime.listener_names().iter().any(|n| n.starts_with("daily@")));

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(rate(&host, &entry_id, keys::ON_PEAK_RATE), 32.5);

    // The check is due 61 seconds after setup
    clock.set(utc(2025, 7, 2, 4, 0, 30));
    tokio::time::sleep(Duration::from_secs(60)).await;
    let options = host.config_entry(&entry_id).unwrap().options;
    assert_eq!(options[keys::ON_PEAK_RATE], json!(45.0));
    assert_eq!(options[keys::FUTURE_ON_PEAK_RATE], json!(0.0));
    assert_eq!(options[keys::SCHEDULED_DATE], Value::Null);

    runtime.unload();
    host.update_entry_options(
        &entry_id,
        map(json!({"future_off_peak_rate": 22.0, "scheduled_date": "2025-07-02"})),
    )
    .await
    .unwrap();
    clock.set(utc(2025, 7, 3, 4, 0, 30));
    tokio::time::sleep(DAY * 2).await;
    assert_eq!(rate(&host, &entry_id, keys::OFF_PEAK_RATE), 18.0);
}

#[tokio::test(start_paused = true)]
async fn failed_check_is_retried_the_next_day() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("entries.json");
    let clock = Arc::new(FixedClock::new(utc(2025, 7, 1, 23, 59, 0)));
    let host = Arc::new(
        LocalHost::new(chrono_tz::UTC, "USD", EntryStore::new(&path)).with_clock(clock.clone()),
    );
    let runtime = setup(
        &host,
        json!({"future_on_peak_rate": 45.0, "scheduled_date": "2025-07-02"}),
    )
    .await;
    let entry_id = runtime.store().entry_id();

    tokio::time::sleep(Duration::from_secs(30)).await;

    // Writes fail while the entries file is a directory
    std::fs::remove_file(&path).unwrap();
    std::fs::create_dir(&path).unwrap();
    clock.set(utc(2025, 7, 2, 0, 0, 30));
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(rate(&host, &entry_id, keys::ON_PEAK_RATE), 32.5);
    assert_eq!(
        rate(&host, &entry_id, keys::FUTURE_ON_PEAK_RATE),
        45.0
    );

    std::fs::remove_dir(&path).unwrap();
    clock.set(utc(2025, 7, 3, 0, 0, 30));
    tokio::time::sleep(DAY).await;
    assert_eq!(rate(&host, &entry_id, keys::ON_PEAK_RATE), 45.0);

    runtime.unload();
}
