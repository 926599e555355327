use chrono::{NaiveTime, TimeZone, Utc};
use serde_json::{Value, json};
use solar_savings::entities::AdapterInput;
use solar_savings::flow::{ConfigFlow, FlowResult, OptionsFlow};
use solar_savings::host::{Attributes, FixedClock, Host, LocalHost};
use solar_savings::integration::Integration;
use solar_savings::keys;
use solar_savings::persistence::EntryStore;
use solar_savings::store::OptionsMap;
use std::sync::Arc;

fn map(v: Value) -> OptionsMap {
    v.as_object().cloned().unwrap_or_default()
}

fn local_host() -> Arc<LocalHost> {
    let now = Utc.with_ymd_and_hms(2025, 7, 2, 8, 30, 0).unwrap();
    let host = Arc::new(
        LocalHost::new(chrono_tz::UTC, "USD", EntryStore::in_memory())
            .with_clock(Arc::new(FixedClock::new(now))),
    );
    host.set_state("schedule.tou", "on", Attributes::new());
    host
}

fn integration(host: &Arc<LocalHost>) -> Integration {
    Integration::new(host.clone(), NaiveTime::from_hms_opt(0, 0, 1).unwrap())
}

fn state_of(host: &LocalHost, entity_id: &str) -> Option<String> {
    host.state(entity_id).map(|s| s.state)
}

#[tokio::test]
async fn setup_promotes_due_rates_and_reload_shows_them() {
    let host = local_host();
    let entry = host
        .create_entry(
            keys::DOMAIN,
            keys::ENTRY_TITLE,
            map(json!({"peak_schedule": "schedule.tou", "on_peak_rate": 40.0, "off_peak_rate": 20.0})),
        )
        .await
        .unwrap();
    host.update_entry_options(
        &entry.entry_id,
        map(json!({"future_on_peak_rate": 45.0, "scheduled_date": "2025-07-01"})),
    )
    .await
    .unwrap();

    let mut integration = integration(&host);
    assert_eq!(integration.setup_all().await, 1);

    // The immediate check wrote new options; the update event reloads the entry
    assert_eq!(integration.process_pending_events().await, 1);

    assert_eq!(
        state_of(&host, "sensor.solar_savings_on_peak_rate").as_deref(),
        Some("45.0")
    );
    assert_eq!(
        state_of(&host, "sensor.solar_savings_current_import_rate_cents").as_deref(),
        Some("45.0")
    );
    assert_eq!(
        state_of(&host, "number.solar_savings_future_on_peak").as_deref(),
        Some("0.0")
    );
    assert_eq!(
        state_of(&host, "date.solar_savings_effective_date").as_deref(),
        Some("unknown")
    );

    // Nothing left to promote, so the reload produced no further update
    assert_eq!(integration.process_pending_events().await, 0);
}

#[tokio::test]
async fn added_entry_is_set_up_from_event() {
    let host = local_host();
    let mut integration = integration(&host);

    let flow = ConfigFlow::new(host.clone());
    let result = flow
        .step_user(Some(map(json!({"peak_schedule": "schedule.tou", "on_peak_rate": 30}))))
        .await
        .unwrap();
    let FlowResult::CreateEntry(entry) = result else {
        panic!("expected entry");
    };

    assert!(integration.loaded_entries().is_empty());
    assert!(integration.process_next_event().await);
    assert_eq!(integration.loaded_entries(), vec![entry.entry_id.clone()]);
    assert_eq!(
        state_of(&host, "sensor.solar_savings_current_import_rate_cents").as_deref(),
        Some("30.0")
    );
}

#[tokio::test]
async fn options_change_rebuilds_sensors() {
    let host = local_host();
    let entry = host
        .create_entry(
            keys::DOMAIN,
            keys::ENTRY_TITLE,
            map(json!({"peak_schedule": "schedule.tou", "export_rate": 5.0})),
        )
        .await
        .unwrap();
    let mut integration = integration(&host);
    integration.setup_all().await;
    let before = integration.runtime(&entry.entry_id).unwrap().entity_ids();
    assert_eq!(
        state_of(&host, "sensor.solar_savings_export_rate_cents").as_deref(),
        Some("5.0")
    );

    OptionsFlow::new(host.clone(), &entry.entry_id)
        .step_init(Some(map(json!({"export_rate": 8.0}))))
        .await
        .unwrap();
    assert!(integration.process_next_event().await);

    let runtime = integration.runtime(&entry.entry_id).unwrap();
    assert_eq!(runtime.entity_ids(), before);
    assert_eq!(runtime.store().get_f64(keys::EXPORT_RATE, 0.0), 8.0);
    assert_eq!(
        state_of(&host, "sensor.solar_savings_export_rate_cents").as_deref(),
        Some("8.0")
    );
    assert_eq!(
        state_of(&host, "sensor.solar_savings_export_rate_dollars").as_deref(),
        Some("0.08")
    );
}

#[tokio::test]
async fn editor_write_triggers_reload() {
    let host = local_host();
    let entry = host
        .create_entry(
            keys::DOMAIN,
            keys::ENTRY_TITLE,
            map(json!({"peak_schedule": "schedule.tou"})),
        )
        .await
        .unwrap();
    let mut integration = integration(&host);
    integration.setup_all().await;

    let adapter = integration
        .runtime(&entry.entry_id)
        .and_then(|r| r.adapter(keys::FUTURE_EXPORT_RATE))
        .map(|e| Arc::clone(&e.adapter))
        .unwrap();
    adapter.accept(AdapterInput::Number(12.25)).await.unwrap();

    assert!(integration.process_next_event().await);
    assert_eq!(
        state_of(&host, "number.solar_savings_future_export_rate").as_deref(),
        Some("12.25")
    );
}

#[tokio::test]
async fn removed_entry_is_unloaded() {
    let host = local_host();
    let entry = host
        .create_entry(
            keys::DOMAIN,
            keys::ENTRY_TITLE,
            map(json!({"peak_schedule": "schedule.tou"})),
        )
        .await
        .unwrap();
    let mut integration = integration(&host);
    integration.setup_all().await;
    assert!(state_of(&host, "sensor.solar_savings_active_schedule").is_some());

    host.remove_entry(&entry.entry_id).await.unwrap();
    assert!(integration.process_next_event().await);

    assert!(integration.loaded_entries().is_empty());
    assert!(state_of(&host, "sensor.solar_savings_active_schedule").is_none());
    assert!(host.registered_entities(&entry.entry_id).is_empty());
}

#[tokio::test]
async fn run_stops_on_shutdown_request() {
    let host = local_host();
    host.create_entry(
        keys::DOMAIN,
        keys::ENTRY_TITLE,
        map(json!({"peak_schedule": "schedule.tou"})),
    )
    .await
    .unwrap();
    let mut integration = integration(&host);
    integration.shutdown_handle().send(()).unwrap();

    integration.run().await.unwrap();
    assert!(integration.loaded_entries().is_empty());
    assert!(state_of(&host, "sensor.solar_savings_active_schedule").is_none());
}
