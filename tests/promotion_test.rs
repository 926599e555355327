use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde_json::{Value, json};
use solar_savings::host::{FixedClock, Host, LocalHost};
use solar_savings::keys;
use solar_savings::persistence::EntryStore;
use solar_savings::scheduler::apply_scheduled_rates;
use solar_savings::store::{OptionsMap, RateStore};
use std::sync::Arc;

fn map(v: Value) -> OptionsMap {
    v.as_object().cloned().unwrap_or_default()
}

fn noon(y: i32, m: u32, d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap()
}

fn host_at(tz: chrono_tz::Tz, now: DateTime<Utc>) -> Arc<LocalHost> {
    Arc::new(
        LocalHost::new(tz, "USD", EntryStore::in_memory())
            .with_clock(Arc::new(FixedClock::new(now))),
    )
}

async fn store_with(host: &Arc<LocalHost>, options: Value) -> RateStore {
    let entry = host
        .create_entry(
            keys::DOMAIN,
            keys::ENTRY_TITLE,
            map(json!({
                "peak_schedule": "schedule.tou",
                "on_peak_rate": 40.0,
                "off_peak_rate": 20.0,
                "export_rate": 5.0
            })),
        )
        .await
        .unwrap();
    host.update_entry_options(&entry.entry_id, map(options))
        .await
        .unwrap();
    let entry = host.config_entry(&entry.entry_id).unwrap();
    let host: Arc<dyn Host> = host.clone();
    RateStore::new(host, entry)
}

#[tokio::test]
async fn yesterday_promotes_on_peak_and_clears_date() {
    let host = host_at(chrono_tz::UTC, noon(2025, 7, 2));
    let store = store_with(
        &host,
        json!({"future_on_peak_rate": 45.0, "scheduled_date": "2025-07-01"}),
    )
    .await;

    assert!(apply_scheduled_rates(&store).await.unwrap());

    let persisted = host.config_entry(&store.entry_id()).unwrap();
    assert_eq!(persisted.get_f64(keys::ON_PEAK_RATE, 0.0), 45.0);
    assert_eq!(persisted.options[keys::FUTURE_ON_PEAK_RATE], json!(0.0));
    assert_eq!(persisted.options[keys::SCHEDULED_DATE], Value::Null);
    assert_eq!(persisted.get_f64(keys::OFF_PEAK_RATE, 0.0), 20.0);
    assert_eq!(persisted.data[keys::ON_PEAK_RATE], json!(40.0));
    assert_eq!(store.tariff().on_peak_rate, 45.0);
    assert_eq!(store.tariff().scheduled_date, None);
}

#[tokio::test]
async fn second_run_after_promotion_changes_nothing() {
    let host = host_at(chrono_tz::UTC, noon(2025, 7, 1));
    let store = store_with(
        &host,
        json!({
            "future_on_peak_rate": 45.0,
            "future_off_peak_rate": 22.0,
            "future_export_rate": 7.5,
            "future_peak_schedule": "schedule.summer",
            "scheduled_date": "2025-07-01"
        }),
    )
    .await;

    assert!(apply_scheduled_rates(&store).await.unwrap());
    let after_first = host.config_entry(&store.entry_id()).unwrap();
    assert_eq!(after_first.get_str(keys::PEAK_SCHEDULE), Some("schedule.summer"));
    assert_eq!(after_first.options[keys::FUTURE_PEAK_SCHEDULE], Value::Null);
    assert_eq!(after_first.get_f64(keys::EXPORT_RATE, 0.0), 7.5);

    assert!(!apply_scheduled_rates(&store).await.unwrap());
    assert_eq!(host.config_entry(&store.entry_id()).unwrap(), after_first);
}

#[tokio::test]
async fn unset_date_never_mutates() {
    let host = host_at(chrono_tz::UTC, noon(2030, 1, 1));
    let store = store_with(&host, json!({"future_on_peak_rate": 45.0})).await;
    let before = host.config_entry(&store.entry_id()).unwrap();

    assert!(!apply_scheduled_rates(&store).await.unwrap());
    assert_eq!(host.config_entry(&store.entry_id()).unwrap(), before);
}

#[tokio::test]
async fn future_date_is_not_due() {
    let host = host_at(chrono_tz::UTC, noon(2025, 6, 30));
    let store = store_with(
        &host,
        json!({"future_on_peak_rate": 45.0, "scheduled_date": "2025-07-01"}),
    )
    .await;

    assert!(!apply_scheduled_rates(&store).await.unwrap());
    assert_eq!(store.get_f64(keys::ON_PEAK_RATE, 0.0), 40.0);
    assert_eq!(
        store.scheduled_date(),
        NaiveDate::from_ymd_opt(2025, 7, 1)
    );
}

#[tokio::test]
async fn due_date_with_nothing_pending_keeps_the_date() {
    let host = host_at(chrono_tz::UTC, noon(2025, 7, 5));
    let store = store_with(
        &host,
        json!({
            "future_on_peak_rate": 0.0,
            "future_peak_schedule": null,
            "scheduled_date": "2025-07-01"
        }),
    )
    .await;

    assert!(!apply_scheduled_rates(&store).await.unwrap());
    assert_eq!(store.options()[keys::SCHEDULED_DATE], json!("2025-07-01"));
}

#[tokio::test]
async fn today_is_taken_in_the_host_time_zone() {
    // 02:00 UTC on July 1st is still June 30th in New York
    let now = Utc.with_ymd_and_hms(2025, 7, 1, 2, 0, 0).unwrap();
    let host = host_at(chrono_tz::America::New_York, now);
    let store = store_with(
        &host,
        json!({"future_on_peak_rate": 45.0, "scheduled_date": "2025-07-01"}),
    )
    .await;

    assert!(!apply_scheduled_rates(&store).await.unwrap());

    let host_utc = host_at(chrono_tz::UTC, now);
    let store_utc = store_with(
        &host_utc,
        json!({"future_on_peak_rate": 45.0, "scheduled_date": "2025-07-01"}),
    )
    .await;
    assert!(apply_scheduled_rates(&store_utc).await.unwrap());
}

#[tokio::test]
async fn malformed_date_is_treated_as_unset() {
    let host = host_at(chrono_tz::UTC, noon(2025, 7, 5));
    let store = store_with(
        &host,
        json!({"future_on_peak_rate": 45.0, "scheduled_date": "next tuesday"}),
    )
    .await;

    assert!(!apply_scheduled_rates(&store).await.unwrap());
    assert_eq!(store.scheduled_date(), None);
    assert_eq!(store.get_f64(keys::ON_PEAK_RATE, 0.0), 40.0);
}

#[tokio::test]
async fn store_follows_host_writes_and_keeps_last_values_after_removal() {
    let host = host_at(chrono_tz::UTC, noon(2025, 7, 1));
    let store = store_with(&host, json!({})).await;
    let entry_id = store.entry_id();

    host.update_entry_options(
        &entry_id,
        map(json!({"on_peak_rate": 50.0, "scheduled_date": "2025-07-01"})),
    )
    .await
    .unwrap();
    assert_eq!(store.get_f64(keys::ON_PEAK_RATE, 0.0), 50.0);
    assert_eq!(store.scheduled_date(), NaiveDate::from_ymd_opt(2025, 7, 1));

    host.remove_entry(&entry_id).await.unwrap();
    assert_eq!(store.get_f64(keys::ON_PEAK_RATE, 0.0), 50.0);
    assert!(
        store
            .set_option(keys::EXPORT_RATE, json!(1.0))
            .await
            .is_err()
    );
}
