//! # Solar Savings - scheduled tariff plugin
//!
//! Tracks the current on-peak, off-peak and export electricity rates of a
//! household, exposes them as sensors, and promotes pending "future" rates and
//! schedule on a chosen effective date.
//!
//! ## Architecture
//!
//! - `host`: the platform boundary (entries, registry, states, time)
//! - `store`: get-with-default reads and whole-mapping writes of entry options
//! - `scheduler`: date-triggered promotion and the daily trigger
//! - `entities`: number, date, select and sensor adapters
//! - `flow`: setup and options forms
//! - `integration`: per-entry setup, reload and unload
//! - `persistence`: the entries file
//! - `config`, `logging`, `error`: runtime configuration, tracing, errors

pub mod config;
pub mod entities;
pub mod error;
pub mod flow;
pub mod host;
pub mod integration;
pub mod keys;
pub mod logging;
pub mod persistence;
pub mod scheduler;
pub mod store;

// Re-export commonly used types
pub use config::Config;
pub use error::{Result, SavingsError};
pub use host::{Host, LocalHost};
pub use integration::{EntryRuntime, Integration, setup_entry};
pub use store::{ConfigEntry, OptionsMap, RateStore};
