//! Persistence layer for config entries
//!
//! This module saves and loads every config entry (base data plus options)
//! as one JSON document so tariffs and pending changes survive restarts.

use crate::error::{Result, SavingsError};
use crate::logging::get_logger;
use crate::store::{ConfigEntry, OptionsMap};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// On-disk document
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PersistentState {
    /// Entries keyed by entry id
    #[serde(default)]
    pub entries: BTreeMap<String, ConfigEntry>,
}

/// Owner of the entries document
pub struct EntryStore {
    file_path: Option<PathBuf>,
    state: PersistentState,
    logger: crate::logging::StructuredLogger,
}

impl EntryStore {
    /// Create a store backed by `file_path`
    pub fn new<P: AsRef<Path>>(file_path: P) -> Self {
        Self {
            file_path: Some(file_path.as_ref().to_path_buf()),
            state: PersistentState::default(),
            logger: get_logger("persistence"),
        }
    }

    /// Create a store that never touches the disk
    pub fn in_memory() -> Self {
        Self {
            file_path: None,
            state: PersistentState::default(),
            logger: get_logger("persistence"),
        }
    }

    /// Load entries from disk
    pub fn load(&mut self) -> Result<()> {
        let Some(path) = self.file_path.as_deref() else {
            return Ok(());
        };

        if !path.exists() {
            self.logger
                .info("No persisted entries file found, starting empty");
            return Ok(());
        }

        let contents = std::fs::read_to_string(path)?;
        self.state = serde_json::from_str(&contents)?;
        self.logger.info(&format!(
            "Loaded {} config entries from disk",
            self.state.entries.len()
        ));

        Ok(())
    }

    /// Save entries to disk
    pub fn save(&self) -> Result<()> {
        let Some(path) = self.file_path.as_deref() else {
            return Ok(());
        };

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(&self.state)?;
        std::fs::write(path, contents)?;
        self.logger.debug("Saved config entries to disk");

        Ok(())
    }

    pub fn get(&self, entry_id: &str) -> Option<&ConfigEntry> {
        self.state.entries.get(entry_id)
    }

    pub fn entries(&self) -> impl Iterator<Item = &ConfigEntry> {
        self.state.entries.values()
    }

    pub fn len(&self) -> usize {
        self.state.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.entries.is_empty()
    }

    /// Add a new entry and persist
    pub fn insert(&mut self, entry: ConfigEntry) -> Result<()> {
        if self.state.entries.contains_key(&entry.entry_id) {
            return Err(SavingsError::host(format!(
                "Config entry {} already exists",
                entry.entry_id
            )));
        }
        self.state.entries.insert(entry.entry_id.clone(), entry);
        self.save()
    }

    /// Replace the options of an entry and persist when they differ.
    ///
    /// Returns whether the stored mapping changed.
    pub fn replace_options(&mut self, entry_id: &str, options: OptionsMap) -> Result<bool> {
        let entry = self
            .state
            .entries
            .get_mut(entry_id)
            .ok_or_else(|| SavingsError::host(format!("Unknown config entry {entry_id}")))?;
        if entry.options == options {
            return Ok(false);
        }
        let previous = std::mem::replace(&mut entry.options, options);
        if let Err(e) = self.save() {
            // Keep memory in line with what is on disk
            if let Some(entry) = self.state.entries.get_mut(entry_id) {
                entry.options = previous;
            }
            return Err(e);
        }
        Ok(true)
    }

    /// Remove an entry and persist
    pub fn remove(&mut self, entry_id: &str) -> Result<ConfigEntry> {
        let entry = self
            .state
            .entries
            .remove(entry_id)
            .ok_or_else(|| SavingsError::host(format!("Unknown config entry {entry_id}")))?;
        self.save()?;
        Ok(entry)
    }
}
