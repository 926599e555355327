//! Entry lifecycle
//!
//! [`setup_entry`] turns one config entry into registered entities, state
//! listeners and a daily promotion check. [`Integration`] owns every loaded
//! entry and reacts to entry events from the host: a new entry is set up, an
//! options update reloads the entry, a removal unloads it.

use crate::entities::{Adapter, build_adapters};
use crate::error::{Result, SavingsError};
use crate::host::{EntryEvent, Host, ListenerHandle};
use crate::keys;
use crate::logging::{LogContext, StructuredLogger, get_logger, get_logger_with_context};
use crate::scheduler::{apply_scheduled_rates, track_time_change};
use crate::store::{ConfigEntry, RateStore};
use chrono::NaiveTime;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc};

/// One adapter and the entity id the registry assigned to it
pub struct LoadedEntity {
    pub entity_id: String,
    pub adapter: Arc<Adapter>,
}

/// Everything kept alive for one set-up entry
pub struct EntryRuntime {
    store: Arc<RateStore>,
    entities: Vec<LoadedEntity>,
    listeners: Vec<ListenerHandle>,
    logger: StructuredLogger,
}

impl EntryRuntime {
    pub fn store(&self) -> &Arc<RateStore> {
        &self.store
    }

    pub fn entities(&self) -> &[LoadedEntity] {
        &self.entities
    }

    pub fn entity_ids(&self) -> Vec<String> {
        self.entities.iter().map(|e| e.entity_id.clone()).collect()
    }

    /// Adapter whose unique id ends with `_<suffix>`
    pub fn adapter(&self, suffix: &str) -> Option<&LoadedEntity> {
        let unique_id = format!("{}_{suffix}", self.store.entry_id());
        self.entities
            .iter()
            .find(|e| e.adapter.unique_id() == unique_id)
    }

    pub fn listener_names(&self) -> Vec<&str> {
        self.listeners.iter().map(ListenerHandle::name).collect()
    }

    /// Release every listener and withdraw the published states
    pub fn unload(self) {
        let host = Arc::clone(self.store.host());
        for listener in self.listeners {
            listener.cancel();
        }
        for entity in &self.entities {
            host.remove_state(&entity.entity_id);
        }
        self.logger.info("Entry unloaded");
    }
}

/// Register and publish every adapter of `entry`, start its listeners and run
/// the promotion check once
pub async fn setup_entry(
    host: Arc<dyn Host>,
    entry: ConfigEntry,
    check_time: NaiveTime,
) -> Result<EntryRuntime> {
    let entry_id = entry.entry_id.clone();
    let logger =
        get_logger_with_context(LogContext::new("integration").with_entry_id(&entry_id));
    let store = Arc::new(RateStore::new(Arc::clone(&host), entry));

    let mut entities = Vec::new();
    for adapter in build_adapters(&store) {
        let entity_id = host.register_entity(adapter.registry_entry(&entry_id)).await?;
        adapter.write_state(host.as_ref(), &entity_id);
        entities.push(LoadedEntity {
            entity_id,
            adapter: Arc::new(adapter),
        });
    }

    let mut listeners = Vec::new();
    for entity in &entities {
        let Some(schedule) = entity.adapter.tracked_entity() else {
            continue;
        };
        let mut subscription = host.track_state(schedule);
        let adapter = Arc::clone(&entity.adapter);
        let entity_id = entity.entity_id.clone();
        let host = Arc::clone(&host);
        listeners.push(ListenerHandle::spawn(
            format!("track:{schedule}->{entity_id}"),
            async move {
                while subscription.changed().await {
                    adapter.write_state(host.as_ref(), &entity_id);
                }
            },
        ));
    }

    let daily_store = Arc::clone(&store);
    listeners.push(track_time_change(Arc::clone(&host), check_time, move || {
        let store = Arc::clone(&daily_store);
        async move {
            if let Err(e) = apply_scheduled_rates(&store).await {
                get_logger_with_context(
                    LogContext::new("scheduler").with_entry_id(&store.entry_id()),
                )
                .error(&format!("Scheduled rate check failed: {e}"));
            }
        }
    }));

    let runtime = EntryRuntime {
        store,
        entities,
        listeners,
        logger,
    };

    let initial_check = apply_scheduled_rates(&runtime.store).await;
    if let Err(e) = initial_check {
        runtime
            .logger
            .error(&format!("Initial rate check failed: {e}"));
        runtime.unload();
        return Err(e);
    }

    runtime.logger.info(&format!(
        "Entry set up with {} entities",
        runtime.entities.len()
    ));
    Ok(runtime)
}

/// All loaded entries of the plugin
pub struct Integration {
    host: Arc<dyn Host>,
    check_time: NaiveTime,
    runtimes: HashMap<String, EntryRuntime>,
    entry_rx: broadcast::Receiver<EntryEvent>,
    shutdown_tx: mpsc::UnboundedSender<()>,
    shutdown_rx: mpsc::UnboundedReceiver<()>,
    logger: StructuredLogger,
}

impl Integration {
    /// Subscribes to entry events immediately so none are missed during setup
    pub fn new(host: Arc<dyn Host>, check_time: NaiveTime) -> Self {
        let entry_rx = host.subscribe_entry_events();
        let (shutdown_tx, shutdown_rx) = mpsc::unbounded_channel();
        Self {
            host,
            check_time,
            runtimes: HashMap::new(),
            entry_rx,
            shutdown_tx,
            shutdown_rx,
            logger: get_logger("integration"),
        }
    }

    pub fn host(&self) -> &Arc<dyn Host> {
        &self.host
    }

    pub fn runtime(&self, entry_id: &str) -> Option<&EntryRuntime> {
        self.runtimes.get(entry_id)
    }

    pub fn loaded_entries(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.runtimes.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Sender that stops [`Integration::run`]
    pub fn shutdown_handle(&self) -> mpsc::UnboundedSender<()> {
        self.shutdown_tx.clone()
    }

    /// Set up every stored entry of this domain; failures are logged and skipped
    pub async fn setup_all(&mut self) -> usize {
        for entry in self.host.config_entries(keys::DOMAIN) {
            let entry_id = entry.entry_id.clone();
            if let Err(e) = self.setup(&entry_id).await {
                self.logger
                    .error(&format!("Failed to set up entry {entry_id}: {e}"));
            }
        }
        self.runtimes.len()
    }

    pub async fn setup(&mut self, entry_id: &str) -> Result<()> {
        let entry = self
            .host
            .config_entry(entry_id)
            .filter(|e| e.domain == keys::DOMAIN)
            .ok_or_else(|| SavingsError::host(format!("Config entry {entry_id} not found")))?;
        self.unload(entry_id);
        let runtime = setup_entry(Arc::clone(&self.host), entry, self.check_time).await?;
        self.runtimes.insert(entry_id.to_string(), runtime);
        Ok(())
    }

    /// Returns whether the entry was loaded
    pub fn unload(&mut self, entry_id: &str) -> bool {
        match self.runtimes.remove(entry_id) {
            Some(runtime) => {
                runtime.unload();
                true
            }
            None => false,
        }
    }

    pub async fn reload(&mut self, entry_id: &str) -> Result<()> {
        self.logger.debug(&format!("Reloading entry {entry_id}"));
        self.setup(entry_id).await
    }

    pub async fn handle_event(&mut self, event: EntryEvent) -> Result<()> {
        match event {
            EntryEvent::Added(entry_id) => {
                if self.is_ours(&entry_id) {
                    self.setup(&entry_id).await?;
                }
            }
            EntryEvent::Updated(entry_id) => {
                if self.runtimes.contains_key(&entry_id) {
                    self.reload(&entry_id).await?;
                }
            }
            EntryEvent::Removed(entry_id) => {
                self.unload(&entry_id);
            }
        }
        Ok(())
    }

    /// Wait for and handle one entry event.
    ///
    /// Returns `false` once the host's event feed is closed.
    pub async fn process_next_event(&mut self) -> bool {
        let event = self.entry_rx.recv().await;
        self.dispatch(event).await
    }

    /// Handle every event already queued without waiting
    pub async fn process_pending_events(&mut self) -> usize {
        let mut handled = 0;
        loop {
            let event = match self.entry_rx.try_recv() {
                Ok(event) => Ok(event),
                Err(broadcast::error::TryRecvError::Lagged(n)) => Err(RecvError::Lagged(n)),
                Err(_) => return handled,
            };
            self.dispatch(event).await;
            handled += 1;
        }
    }

    /// Set up stored entries, then follow entry events until shutdown
    pub async fn run(&mut self) -> Result<()> {
        let loaded = self.setup_all().await;
        self.logger
            .info(&format!("Solar Savings running with {loaded} entries"));

        loop {
            tokio::select! {
                event = self.entry_rx.recv() => {
                    if !self.dispatch(event).await {
                        self.logger.warn("Entry event feed closed");
                        break;
                    }
                }
                _ = self.shutdown_rx.recv() => {
                    self.logger.info("Shutdown signal received");
                    break;
                }
            }
        }

        self.shutdown();
        Ok(())
    }

    /// Unload every entry
    pub fn shutdown(&mut self) {
        let ids: Vec<String> = self.runtimes.keys().cloned().collect();
        for entry_id in ids {
            self.unload(&entry_id);
        }
    }

    async fn dispatch(&mut self, event: std::result::Result<EntryEvent, RecvError>) -> bool {
        match event {
            Ok(event) => {
                if let Err(e) = self.handle_event(event.clone()).await {
                    self.logger
                        .error(&format!("Failed to handle {event:?}: {e}"));
                }
                true
            }
            Err(RecvError::Lagged(missed)) => {
                self.logger
                    .warn(&format!("Missed {missed} entry events, resynchronising"));
                self.resync().await;
                true
            }
            Err(RecvError::Closed) => false,
        }
    }

    /// Reload every entry after events were lost
    async fn resync(&mut self) {
        let stored: Vec<String> = self
            .host
            .config_entries(keys::DOMAIN)
            .into_iter()
            .map(|e| e.entry_id)
            .collect();
        let gone: Vec<String> = self
            .runtimes
            .keys()
            .filter(|id| !stored.contains(id))
            .cloned()
            .collect();
        for entry_id in gone {
            self.unload(&entry_id);
        }
        for entry_id in stored {
            if let Err(e) = self.setup(&entry_id).await {
                self.logger
                    .error(&format!("Failed to set up entry {entry_id}: {e}"));
            }
        }
    }

    fn is_ours(&self, entry_id: &str) -> bool {
        self.host
            .config_entry(entry_id)
            .is_some_and(|e| e.domain == keys::DOMAIN)
    }
}

impl Drop for Integration {
    fn drop(&mut self) {
        self.shutdown();
    }
}
