//! Host platform abstraction
//!
//! The plugin never owns persistence, entity registration, time or the state
//! machine. Everything it needs from the surrounding platform goes through the
//! [`Host`] trait defined here; [`local::LocalHost`] is the in-process
//! implementation used by the binary and the tests.

use crate::error::Result;
use crate::store::{ConfigEntry, OptionsMap};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::{Mutex, PoisonError};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

pub mod local;

pub use local::LocalHost;

/// Attribute map attached to a state object
pub type Attributes = serde_json::Map<String, serde_json::Value>;

/// Latest known state of a host object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct State {
    pub entity_id: String,
    pub state: String,
    #[serde(default)]
    pub attributes: Attributes,
    pub last_changed: DateTime<Utc>,
}

impl State {
    /// Domain part of the entity id (`schedule` for `schedule.tou`)
    pub fn domain(&self) -> &str {
        split_entity_id(&self.entity_id).0
    }
}

/// Notification emitted whenever a state is written or removed
#[derive(Debug, Clone)]
pub struct StateChangedEvent {
    pub entity_id: String,
    pub old_state: Option<State>,
    pub new_state: Option<State>,
}

/// Notification emitted when a config entry changes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryEvent {
    /// A new entry was created by the setup flow
    Added(String),
    /// Options of the entry were replaced with a different mapping
    Updated(String),
    /// The entry was removed by its owner
    Removed(String),
}

/// Entity platforms the plugin registers entities on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Sensor,
    Number,
    Date,
    Select,
}

impl Platform {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sensor => "sensor",
            Self::Number => "number",
            Self::Date => "date",
            Self::Select => "select",
        }
    }
}

/// Logical device every entity of one entry is grouped under
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceInfo {
    /// (domain, entry id)
    pub identifiers: (String, String),
    pub name: String,
    pub manufacturer: String,
    pub model: String,
}

/// Request to add one entity to the host registry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryEntry {
    pub unique_id: String,
    pub platform: Platform,
    /// Object id the host should derive the entity id from
    pub suggested_object_id: String,
    pub config_entry_id: String,
    pub device: DeviceInfo,
}

/// Split `domain.object_id` into its two parts
pub fn split_entity_id(entity_id: &str) -> (&str, &str) {
    entity_id.split_once('.').unwrap_or((entity_id, ""))
}

/// Lower-case, underscore separated form of a display name
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_sep = false;
    for c in text.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_sep && !slug.is_empty() {
                slug.push('_');
            }
            pending_sep = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_sep = true;
        }
    }
    if slug.is_empty() {
        "unknown".to_string()
    } else {
        slug
    }
}

/// Source of the current instant
pub trait Clock: Send + Sync {
    fn now_utc(&self) -> DateTime<Utc>;
}

/// Wall clock
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_utc(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Settable clock for tests and replays
#[derive(Debug)]
pub struct FixedClock {
    now: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    pub const fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner) = now;
    }
}

impl Clock for FixedClock {
    fn now_utc(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Change feed for a single entity id
pub struct StateSubscription {
    entity_id: String,
    rx: broadcast::Receiver<StateChangedEvent>,
}

impl StateSubscription {
    pub const fn new(entity_id: String, rx: broadcast::Receiver<StateChangedEvent>) -> Self {
        Self { entity_id, rx }
    }

    pub fn entity_id(&self) -> &str {
        &self.entity_id
    }

    /// Wait for the tracked entity to change.
    ///
    /// Returns `false` once the host has shut the feed down. A lagged receiver
    /// reports a change so the caller re-reads the latest state.
    pub async fn changed(&mut self) -> bool {
        loop {
            match self.rx.recv().await {
                Ok(event) if event.entity_id == self.entity_id => return true,
                Ok(_) => {}
                Err(RecvError::Lagged(_)) => return true,
                Err(RecvError::Closed) => return false,
            }
        }
    }
}

/// Owns a background listener; the task is aborted on cancel or drop
#[derive(Debug)]
pub struct ListenerHandle {
    name: String,
    task: JoinHandle<()>,
}

impl ListenerHandle {
    /// Spawn `fut` on the current tokio runtime
    pub fn spawn<F>(name: impl Into<String>, fut: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        Self {
            name: name.into(),
            task: tokio::spawn(fut),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn cancel(self) {
        self.task.abort();
    }
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Everything the plugin consumes from the host platform
#[async_trait]
pub trait Host: Send + Sync {
    // Settings

    /// Major currency code, e.g. `USD`
    fn currency(&self) -> &str;

    fn time_zone(&self) -> Tz;

    // Time

    /// Current instant in the host time zone
    fn now(&self) -> DateTime<Tz>;

    /// Current calendar date in the host time zone
    fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }

    // Config entries

    fn config_entry(&self, entry_id: &str) -> Option<ConfigEntry>;

    fn config_entries(&self, domain: &str) -> Vec<ConfigEntry>;

    /// Create and persist a new entry with `data` as its immutable base mapping
    async fn create_entry(&self, domain: &str, title: &str, data: OptionsMap)
    -> Result<ConfigEntry>;

    /// Replace the whole options mapping of an entry.
    ///
    /// Returns `true` when the mapping differed and listeners were notified.
    async fn update_entry_options(&self, entry_id: &str, options: OptionsMap) -> Result<bool>;

    async fn remove_entry(&self, entry_id: &str) -> Result<()>;

    fn subscribe_entry_events(&self) -> broadcast::Receiver<EntryEvent>;

    // Entity and device registry

    /// Register an entity and return the entity id assigned to it
    async fn register_entity(&self, entry: RegistryEntry) -> Result<String>;

    /// Drop every entity of a config entry (and their states); returns their ids
    async fn remove_entities(&self, config_entry_id: &str) -> Vec<String>;

    // State machine

    /// All entity ids of `domain`, in no particular order
    fn entity_ids(&self, domain: &str) -> Vec<String>;

    fn state(&self, entity_id: &str) -> Option<State>;

    fn set_state(&self, entity_id: &str, state: &str, attributes: Attributes);

    fn remove_state(&self, entity_id: &str);

    fn track_state(&self, entity_id: &str) -> StateSubscription;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugify_collapses_separators() {
        assert_eq!(
            slugify("Solar Savings Export Rate (Cents)"),
            "solar_savings_export_rate_cents"
        );
        assert_eq!(slugify("  On--Peak  "), "on_peak");
        assert_eq!(slugify("()"), "unknown");
    }

    #[test]
    fn split_entity_id_parts() {
        assert_eq!(split_entity_id("schedule.tou"), ("schedule", "tou"));
        assert_eq!(split_entity_id("bogus"), ("bogus", ""));
    }

    #[test]
    fn fixed_clock_is_settable() {
        let t0 = DateTime::parse_from_rfc3339("2024-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let clock = FixedClock::new(t0);
        assert_eq!(clock.now_utc(), t0);
        let t1 = t0 + chrono::Duration::days(1);
        clock.set(t1);
        assert_eq!(clock.now_utc(), t1);
    }
}
