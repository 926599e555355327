//! Rate store: the tariff options of one config entry
//!
//! Reads use get-with-default semantics (option value, else base data value,
//! else a fixed default). Writes always submit the complete options mapping to
//! the host in a single call; nothing in this crate merges partial updates.

use crate::error::Result;
use crate::host::Host;
use crate::keys;
use crate::logging::{LogContext, StructuredLogger, get_logger_with_context};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::{Arc, PoisonError, RwLock};

/// Key/value mapping stored in a config entry
pub type OptionsMap = serde_json::Map<String, Value>;

/// One configured instance of the integration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigEntry {
    pub entry_id: String,
    pub domain: String,
    pub title: String,
    pub version: u32,
    /// Values submitted by the initial setup; never modified afterwards
    #[serde(default)]
    pub data: OptionsMap,
    /// Values written by the options flow, adapters and the scheduler
    #[serde(default)]
    pub options: OptionsMap,
}

impl ConfigEntry {
    /// Build a fresh entry with a random id and empty options
    pub fn new(domain: &str, title: &str, data: OptionsMap) -> Self {
        Self {
            entry_id: uuid::Uuid::new_v4().simple().to_string(),
            domain: domain.to_string(),
            title: title.to_string(),
            version: keys::ENTRY_VERSION,
            data,
            options: OptionsMap::new(),
        }
    }

    /// Option value if the key is present in options, else the base data value
    pub fn lookup(&self, key: &str) -> Option<&Value> {
        self.options.get(key).or_else(|| self.data.get(key))
    }

    pub fn get_f64(&self, key: &str, default: f64) -> f64 {
        self.lookup(key).and_then(Value::as_f64).unwrap_or(default)
    }

    /// Non-empty string value with the options → data fallback
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.lookup(key)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }

    /// Non-empty string value read from options only
    pub fn option_str(&self, key: &str) -> Option<&str> {
        self.options
            .get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }

    /// Scheduled effective date from options.
    ///
    /// `Ok(None)` when unset; `Err` with the raw value when it is not an ISO date.
    pub fn scheduled_date(&self) -> std::result::Result<Option<NaiveDate>, String> {
        parse_scheduled_date(&self.options)
    }
}

pub(crate) fn parse_scheduled_date(
    options: &OptionsMap,
) -> std::result::Result<Option<NaiveDate>, String> {
    match options.get(keys::SCHEDULED_DATE).and_then(Value::as_str) {
        None | Some("") => Ok(None),
        Some(raw) => raw
            .parse::<NaiveDate>()
            .map(Some)
            .map_err(|_| raw.to_string()),
    }
}

/// Typed view over the tariff fields of an entry
#[derive(Debug, Clone, PartialEq)]
pub struct TariffConfig {
    pub on_peak_rate: f64,
    pub off_peak_rate: f64,
    pub export_rate: f64,
    pub future_on_peak_rate: f64,
    pub future_off_peak_rate: f64,
    pub future_export_rate: f64,
    pub peak_schedule: Option<String>,
    pub future_peak_schedule: Option<String>,
    pub scheduled_date: Option<NaiveDate>,
}

impl From<&ConfigEntry> for TariffConfig {
    fn from(entry: &ConfigEntry) -> Self {
        Self {
            on_peak_rate: entry.get_f64(keys::ON_PEAK_RATE, 0.0),
            off_peak_rate: entry.get_f64(keys::OFF_PEAK_RATE, 0.0),
            export_rate: entry.get_f64(keys::EXPORT_RATE, 0.0),
            future_on_peak_rate: entry.get_f64(keys::FUTURE_ON_PEAK_RATE, 0.0),
            future_off_peak_rate: entry.get_f64(keys::FUTURE_OFF_PEAK_RATE, 0.0),
            future_export_rate: entry.get_f64(keys::FUTURE_EXPORT_RATE, 0.0),
            peak_schedule: entry.get_str(keys::PEAK_SCHEDULE).map(str::to_string),
            future_peak_schedule: entry
                .option_str(keys::FUTURE_PEAK_SCHEDULE)
                .map(str::to_string),
            scheduled_date: entry.scheduled_date().ok().flatten(),
        }
    }
}

/// Handle on one entry's options.
///
/// Every read goes to the host so that writers outside this store (the
/// options flow, another adapter) are never overwritten with a stale copy.
/// The last entry seen is kept only for when the host no longer has it.
pub struct RateStore {
    host: Arc<dyn Host>,
    entry_id: String,
    last_seen: RwLock<ConfigEntry>,
    logger: StructuredLogger,
}

impl RateStore {
    pub fn new(host: Arc<dyn Host>, entry: ConfigEntry) -> Self {
        let logger =
            get_logger_with_context(LogContext::new("store").with_entry_id(&entry.entry_id));
        Self {
            host,
            entry_id: entry.entry_id.clone(),
            last_seen: RwLock::new(entry),
            logger,
        }
    }

    pub fn host(&self) -> &Arc<dyn Host> {
        &self.host
    }

    pub fn entry_id(&self) -> String {
        self.entry_id.clone()
    }

    /// The entry as the host currently holds it
    pub fn snapshot(&self) -> ConfigEntry {
        match self.host.config_entry(&self.entry_id) {
            Some(live) => {
                *self.last_seen.write().unwrap_or_else(PoisonError::into_inner) = live.clone();
                live
            }
            None => self
                .last_seen
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .clone(),
        }
    }

    pub fn options(&self) -> OptionsMap {
        self.read(|e| e.options.clone())
    }

    pub fn get_f64(&self, key: &str, default: f64) -> f64 {
        self.read(|e| e.get_f64(key, default))
    }

    pub fn get_string(&self, key: &str) -> Option<String> {
        self.read(|e| e.get_str(key).map(str::to_string))
    }

    pub fn option_string(&self, key: &str) -> Option<String> {
        self.read(|e| e.option_str(key).map(str::to_string))
    }

    /// Scheduled date; a malformed stored value is reported and treated as unset
    pub fn scheduled_date(&self) -> Option<NaiveDate> {
        match self.read(ConfigEntry::scheduled_date) {
            Ok(date) => date,
            Err(raw) => {
                self.logger
                    .warn(&format!("Ignoring malformed scheduled_date '{raw}'"));
                None
            }
        }
    }

    pub fn tariff(&self) -> TariffConfig {
        self.read(|e| TariffConfig::from(e))
    }

    /// Copy the host's current options, set one key, and submit the whole mapping
    pub async fn set_option(&self, key: &str, value: Value) -> Result<bool> {
        let mut options = self.options();
        options.insert(key.to_string(), value);
        self.replace_options(options).await
    }

    /// Submit a complete replacement for the options mapping
    pub async fn replace_options(&self, options: OptionsMap) -> Result<bool> {
        let changed = self
            .host
            .update_entry_options(&self.entry_id, options.clone())
            .await?;
        self.last_seen
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .options = options;
        if changed {
            self.logger.debug("Options replaced");
        }
        Ok(changed)
    }

    fn read<T>(&self, f: impl FnOnce(&ConfigEntry) -> T) -> T {
        f(&self.snapshot())
    }
}
