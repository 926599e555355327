//! Configuration management for Solar Savings
//!
//! This module handles loading, validation, and management of the runtime
//! configuration (host settings, scheduler timing, storage and logging) from
//! YAML files. Tariff values themselves are not part of this file; they live
//! in the config entries managed by the host.

use crate::error::{Result, SavingsError};
use chrono::NaiveTime;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

mod defaults;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Logging configuration
    pub logging: LoggingConfig,

    /// Host platform settings (time zone, currency)
    pub host: HostConfig,

    /// Daily rate check timing
    pub scheduler: SchedulerConfig,

    /// Where config entries are persisted
    pub storage: StorageConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    pub level: String,

    /// Optional console-specific level; falls back to `level`
    pub console_level: Option<String>,

    /// Optional file-specific level; falls back to `level`
    pub file_level: Option<String>,

    /// Path to log file (its parent directory receives the rotated files)
    pub file: String,

    /// Number of rotated files to keep
    pub backup_count: u32,

    /// Whether to log to console
    pub console_output: bool,

    /// Whether to use JSON format
    pub json_format: bool,
}

/// Host platform settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// IANA time zone used for "today" and for the daily trigger
    pub time_zone: String,

    /// Major currency code used for unit labels (e.g. USD -> "USD/kWh")
    pub currency: String,

    /// Initial `schedule.*` states published by the local host, keyed by entity id
    pub schedules: BTreeMap<String, String>,
}

/// Time of day at which pending rate changes are checked
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub hour: u32,
    pub minute: u32,
    pub second: u32,
}

/// Persistence settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// JSON document holding every config entry
    pub entries_file: String,
}

impl HostConfig {
    /// Parse the configured time zone
    pub fn tz(&self) -> Result<Tz> {
        self.time_zone.parse::<Tz>().map_err(|_| {
            SavingsError::validation(
                "host.time_zone",
                format!("Unknown time zone: {}", self.time_zone),
            )
        })
    }
}

impl SchedulerConfig {
    /// Daily check time as a local wall-clock time
    pub fn check_time(&self) -> Result<NaiveTime> {
        NaiveTime::from_hms_opt(self.hour, self.minute, self.second).ok_or_else(|| {
            SavingsError::validation(
                "scheduler",
                format!(
                    "Invalid check time {:02}:{:02}:{:02}",
                    self.hour, self.minute, self.second
                ),
            )
        })
    }
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from the first default location that exists
    pub fn load() -> Result<Self> {
        let default_paths = [
            "solar_savings.yaml",
            "/data/solar_savings.yaml",
            "/etc/solar_savings/config.yaml",
        ];

        for path in &default_paths {
            if Path::new(path).exists() {
                return Self::from_file(path);
            }
        }

        Ok(Self::default())
    }

    /// Save configuration to a YAML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.host.tz()?;

        let currency = self.host.currency.trim();
        if currency.is_empty() {
            return Err(SavingsError::validation(
                "host.currency",
                "Currency cannot be empty",
            ));
        }
        if !currency.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(SavingsError::validation(
                "host.currency",
                "Currency must be an alphabetic code such as USD",
            ));
        }

        for entity_id in self.host.schedules.keys() {
            let (domain, object_id) = crate::host::split_entity_id(entity_id);
            if domain != crate::keys::SCHEDULE_DOMAIN || object_id.is_empty() {
                return Err(SavingsError::validation(
                    "host.schedules",
                    format!("{entity_id} is not a schedule entity id"),
                ));
            }
        }

        self.scheduler.check_time()?;

        if self.storage.entries_file.trim().is_empty() {
            return Err(SavingsError::validation(
                "storage.entries_file",
                "Path cannot be empty",
            ));
        }

        crate::logging::parse_log_level(&self.logging.level)
            .map_err(|e| SavingsError::validation("logging.level", e.to_string()))?;

        Ok(())
    }
}
