//! In-process host: entries on disk, states and registry in memory

use super::{
    Attributes, Clock, DeviceInfo, EntryEvent, Host, Platform, RegistryEntry, State,
    StateChangedEvent, StateSubscription, SystemClock, split_entity_id,
};
use crate::config::Config;
use crate::error::{Result, SavingsError};
use crate::logging::{StructuredLogger, get_logger};
use crate::persistence::EntryStore;
use crate::store::{ConfigEntry, OptionsMap};
use async_trait::async_trait;
use chrono::DateTime;
use chrono_tz::Tz;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::broadcast;

const EVENT_BUFFER: usize = 256;

/// Entity as recorded by the registry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisteredEntity {
    pub entity_id: String,
    pub unique_id: String,
    pub platform: Platform,
    pub config_entry_id: String,
    pub device_identifiers: (String, String),
}

#[derive(Default)]
struct Registry {
    /// Keyed by unique id so reloads keep their entity ids
    entities: HashMap<String, RegisteredEntity>,
    devices: HashMap<(String, String), DeviceInfo>,
}

impl Registry {
    fn entity_id_taken(&self, entity_id: &str) -> bool {
        self.entities.values().any(|e| e.entity_id == entity_id)
    }
}

pub struct LocalHost {
    time_zone: Tz,
    currency: String,
    clock: Arc<dyn Clock>,
    entries: Mutex<EntryStore>,
    states: Mutex<HashMap<String, State>>,
    registry: Mutex<Registry>,
    state_tx: broadcast::Sender<StateChangedEvent>,
    entry_tx: broadcast::Sender<EntryEvent>,
    logger: StructuredLogger,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl LocalHost {
    pub fn new(time_zone: Tz, currency: &str, entries: EntryStore) -> Self {
        let (state_tx, _) = broadcast::channel(EVENT_BUFFER);
        let (entry_tx, _) = broadcast::channel(EVENT_BUFFER);
        Self {
            time_zone,
            currency: currency.to_string(),
            clock: Arc::new(SystemClock),
            entries: Mutex::new(entries),
            states: Mutex::new(HashMap::new()),
            registry: Mutex::new(Registry::default()),
            state_tx,
            entry_tx,
            logger: get_logger("host"),
        }
    }

    /// Build from the runtime configuration, loading persisted entries
    pub fn from_config(config: &Config) -> Result<Self> {
        let mut store = EntryStore::new(&config.storage.entries_file);
        store.load()?;
        let host = Self::new(config.host.tz()?, &config.host.currency, store);
        for (entity_id, state) in &config.host.schedules {
            host.set_state(entity_id, state, Attributes::new());
        }
        Ok(host)
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Entities registered for one config entry, sorted by entity id
    pub fn registered_entities(&self, config_entry_id: &str) -> Vec<RegisteredEntity> {
        let mut out: Vec<_> = lock(&self.registry)
            .entities
            .values()
            .filter(|e| e.config_entry_id == config_entry_id)
            .cloned()
            .collect();
        out.sort_by(|a, b| a.entity_id.cmp(&b.entity_id));
        out
    }

    pub fn device(&self, identifiers: &(String, String)) -> Option<DeviceInfo> {
        lock(&self.registry).devices.get(identifiers).cloned()
    }

    fn emit_entry_event(&self, event: EntryEvent) {
        // No receivers is fine: nothing is set up yet
        let _ = self.entry_tx.send(event);
    }
}

#[async_trait]
impl Host for LocalHost {
    fn currency(&self) -> &str {
        &self.currency
    }

    fn time_zone(&self) -> Tz {
        self.time_zone
    }

    fn now(&self) -> DateTime<Tz> {
        self.clock.now_utc().with_timezone(&self.time_zone)
    }

    fn config_entry(&self, entry_id: &str) -> Option<ConfigEntry> {
        lock(&self.entries).get(entry_id).cloned()
    }

    fn config_entries(&self, domain: &str) -> Vec<ConfigEntry> {
        lock(&self.entries)
            .entries()
            .filter(|e| e.domain == domain)
            .cloned()
            .collect()
    }

    async fn create_entry(
        &self,
        domain: &str,
        title: &str,
        data: OptionsMap,
    ) -> Result<ConfigEntry> {
        let entry = ConfigEntry::new(domain, title, data);
        lock(&self.entries).insert(entry.clone())?;
        self.logger
            .info(&format!("Created config entry {} ({})", entry.entry_id, title));
        self.emit_entry_event(EntryEvent::Added(entry.entry_id.clone()));
        Ok(entry)
    }

    async fn update_entry_options(&self, entry_id: &str, options: OptionsMap) -> Result<bool> {
        let changed = lock(&self.entries).replace_options(entry_id, options)?;
        if changed {
            self.logger
                .debug(&format!("Options of entry {entry_id} updated"));
            self.emit_entry_event(EntryEvent::Updated(entry_id.to_string()));
        }
        Ok(changed)
    }

    async fn remove_entry(&self, entry_id: &str) -> Result<()> {
        lock(&self.entries).remove(entry_id)?;
        self.remove_entities(entry_id).await;
        lock(&self.registry)
            .devices
            .retain(|(_, id), _| id != entry_id);
        self.logger.info(&format!("Removed config entry {entry_id}"));
        self.emit_entry_event(EntryEvent::Removed(entry_id.to_string()));
        Ok(())
    }

    fn subscribe_entry_events(&self) -> broadcast::Receiver<EntryEvent> {
        self.entry_tx.subscribe()
    }

    async fn register_entity(&self, entry: RegistryEntry) -> Result<String> {
        if entry.unique_id.is_empty() {
            return Err(SavingsError::validation("unique_id", "Cannot be empty"));
        }
        let mut registry = lock(&self.registry);
        registry
            .devices
            .entry(entry.device.identifiers.clone())
            .or_insert_with(|| entry.device.clone());

        if let Some(existing) = registry.entities.get(&entry.unique_id) {
            return Ok(existing.entity_id.clone());
        }

        let base = format!("{}.{}", entry.platform.as_str(), entry.suggested_object_id);
        let mut entity_id = base.clone();
        let mut suffix = 2;
        while registry.entity_id_taken(&entity_id) {
            entity_id = format!("{base}_{suffix}");
            suffix += 1;
        }

        registry.entities.insert(
            entry.unique_id.clone(),
            RegisteredEntity {
                entity_id: entity_id.clone(),
                unique_id: entry.unique_id,
                platform: entry.platform,
                config_entry_id: entry.config_entry_id,
                device_identifiers: entry.device.identifiers,
            },
        );
        drop(registry);

        self.logger.trace(&format!("Registered {entity_id}"));
        Ok(entity_id)
    }

    async fn remove_entities(&self, config_entry_id: &str) -> Vec<String> {
        let removed: Vec<String> = {
            let mut registry = lock(&self.registry);
            let ids: Vec<String> = registry
                .entities
                .values()
                .filter(|e| e.config_entry_id == config_entry_id)
                .map(|e| e.entity_id.clone())
                .collect();
            registry
                .entities
                .retain(|_, e| e.config_entry_id != config_entry_id);
            ids
        };
        for entity_id in &removed {
            self.remove_state(entity_id);
        }
        removed
    }

    fn entity_ids(&self, domain: &str) -> Vec<String> {
        lock(&self.states)
            .keys()
            .filter(|id| split_entity_id(id).0 == domain)
            .cloned()
            .collect()
    }

    fn state(&self, entity_id: &str) -> Option<State> {
        lock(&self.states).get(entity_id).cloned()
    }

    fn set_state(&self, entity_id: &str, state: &str, attributes: Attributes) {
        let now = self.clock.now_utc();
        let event = {
            let mut states = lock(&self.states);
            let old_state = states.get(entity_id).cloned();
            if let Some(old) = &old_state
                && old.state == state
                && old.attributes == attributes
            {
                return;
            }
            let last_changed = match &old_state {
                Some(old) if old.state == state => old.last_changed,
                _ => now,
            };
            let new_state = State {
                entity_id: entity_id.to_string(),
                state: state.to_string(),
                attributes,
                last_changed,
            };
            states.insert(entity_id.to_string(), new_state.clone());
            StateChangedEvent {
                entity_id: entity_id.to_string(),
                old_state,
                new_state: Some(new_state),
            }
        };
        let _ = self.state_tx.send(event);
    }

    fn remove_state(&self, entity_id: &str) {
        let old_state = lock(&self.states).remove(entity_id);
        if old_state.is_some() {
            let _ = self.state_tx.send(StateChangedEvent {
                entity_id: entity_id.to_string(),
                old_state,
                new_state: None,
            });
        }
    }

    fn track_state(&self, entity_id: &str) -> StateSubscription {
        StateSubscription::new(entity_id.to_string(), self.state_tx.subscribe())
    }
}
