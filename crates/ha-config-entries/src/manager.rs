//! Config Entries Manager
//!
//! Tracks config entries and drives their lifecycle through the owning
//! integration's setup and unload hooks.

use std::collections::HashSet;

use dashmap::DashMap;
use ha_core::HomeAssistantError;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::entry::{ConfigEntry, ConfigEntryState};
use crate::hass::Hass;
use crate::state_machine::InvalidTransition;

/// Config entries errors
#[derive(Debug, Error)]
pub enum ConfigEntriesError {
    #[error("Entry not found: {0}")]
    NotFound(String),

    #[error("Entry already exists for domain {domain} with unique_id {unique_id}")]
    AlreadyExists { domain: String, unique_id: String },

    #[error("Cannot unload entry in state {0:?}")]
    CannotUnload(ConfigEntryState),

    #[error("Setup failed: {0}")]
    SetupFailed(#[source] HomeAssistantError),

    #[error("Unload failed: {0}")]
    UnloadFailed(#[source] HomeAssistantError),

    #[error(transparent)]
    InvalidTransition(#[from] InvalidTransition),

    #[error(transparent)]
    Integration(#[from] HomeAssistantError),
}

pub type ConfigEntriesResult<T> = Result<T, ConfigEntriesError>;

/// Config Entries Manager
///
/// Keeps entries in memory with a per-domain index. Setup and unload are
/// serialized through a single lock so an entry is never set up and unloaded
/// concurrently.
pub struct ConfigEntries {
    /// Primary index: entry_id -> ConfigEntry
    entries: DashMap<String, ConfigEntry>,

    /// Index: domain -> set of entry_ids
    by_domain: DashMap<String, HashSet<String>>,

    /// Serializes setup/unload
    setup_lock: Mutex<()>,
}

impl Default for ConfigEntries {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigEntries {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            by_domain: DashMap::new(),
            setup_lock: Mutex::new(()),
        }
    }

    fn index_entry(&self, entry: &ConfigEntry) {
        self.entries.insert(entry.entry_id.clone(), entry.clone());
        self.by_domain
            .entry(entry.domain.clone())
            .or_default()
            .insert(entry.entry_id.clone());
    }

    fn unindex_entry(&self, entry: &ConfigEntry) {
        if let Some(mut ids) = self.by_domain.get_mut(&entry.domain) {
            ids.remove(&entry.entry_id);
        }
        self.entries.remove(&entry.entry_id);
    }

    /// Get an entry by ID
    pub fn get(&self, entry_id: &str) -> Option<ConfigEntry> {
        self.entries.get(entry_id).map(|r| r.value().clone())
    }

    /// Get all entries for a domain
    pub fn get_by_domain(&self, domain: &str) -> Vec<ConfigEntry> {
        self.by_domain
            .get(domain)
            .map(|ids| ids.iter().filter_map(|id| self.get(id)).collect())
            .unwrap_or_default()
    }

    /// Add a new config entry
    pub fn add(&self, entry: ConfigEntry) -> ConfigEntriesResult<ConfigEntry> {
        if let Some(ref unique_id) = entry.unique_id {
            let duplicate = self
                .get_by_domain(&entry.domain)
                .iter()
                .any(|e| e.unique_id.as_deref() == Some(unique_id.as_str()));
            if duplicate {
                return Err(ConfigEntriesError::AlreadyExists {
                    domain: entry.domain.clone(),
                    unique_id: unique_id.clone(),
                });
            }
        }

        self.index_entry(&entry);

        info!(
            "Added config entry: {} ({}) [{}]",
            entry.title, entry.domain, entry.entry_id
        );

        Ok(entry)
    }

    /// Remove an entry, unloading it first if needed
    pub async fn remove(&self, hass: &Hass, entry_id: &str) -> ConfigEntriesResult<ConfigEntry> {
        let entry = self
            .get(entry_id)
            .ok_or_else(|| ConfigEntriesError::NotFound(entry_id.to_string()))?;

        if entry.is_loaded() {
            self.unload(hass, entry_id).await?;
        }

        self.unindex_entry(&entry);
        info!(
            "Removed config entry: {} ({}) [{}]",
            entry.title, entry.domain, entry_id
        );
        Ok(entry)
    }

    fn transition(
        &self,
        entry_id: &str,
        state: ConfigEntryState,
        reason: Option<String>,
    ) -> ConfigEntriesResult<ConfigEntry> {
        let mut entry = self
            .entries
            .get_mut(entry_id)
            .ok_or_else(|| ConfigEntriesError::NotFound(entry_id.to_string()))?;
        entry.try_set_state(state, reason)?;
        debug!("Entry {} state changed to {:?}", entry_id, state);
        Ok(entry.clone())
    }

    /// Set up an entry through its integration
    ///
    /// Returns the resulting state: `Loaded`, or `SetupRetry` when the
    /// integration reported a transient failure. An integration error leaves
    /// the entry in `SetupError` and is returned as
    /// [`ConfigEntriesError::SetupFailed`].
    pub async fn setup(
        &self,
        hass: &Hass,
        entry_id: &str,
    ) -> ConfigEntriesResult<ConfigEntryState> {
        let _lock = self.setup_lock.lock().await;

        let entry = self
            .get(entry_id)
            .ok_or_else(|| ConfigEntriesError::NotFound(entry_id.to_string()))?;
        let integration = hass.integrations.require(&entry.domain)?;

        let entry = self.transition(entry_id, ConfigEntryState::SetupInProgress, None)?;

        match integration.async_setup_entry(hass, &entry).await {
            Ok(true) => {
                self.transition(entry_id, ConfigEntryState::Loaded, None)?;
                info!("Setup completed for entry: {} ({})", entry.title, entry_id);
                Ok(ConfigEntryState::Loaded)
            }
            Ok(false) => {
                self.transition(
                    entry_id,
                    ConfigEntryState::SetupRetry,
                    Some("setup returned false".to_string()),
                )?;
                let tries = self
                    .entries
                    .get_mut(entry_id)
                    .map(|mut e| e.increment_tries())
                    .unwrap_or_default();
                warn!(
                    "Setup of entry {} ({}) not ready, retry #{}",
                    entry.title, entry_id, tries
                );
                Ok(ConfigEntryState::SetupRetry)
            }
            Err(err) => {
                error!("Error setting up entry {} ({}): {}", entry.title, entry_id, err);
                self.transition(
                    entry_id,
                    ConfigEntryState::SetupError,
                    Some(err.to_string()),
                )?;
                Err(ConfigEntriesError::SetupFailed(err))
            }
        }
    }

    /// Unload an entry
    ///
    /// Only a `Loaded` entry calls the integration's unload hook; entries that
    /// failed setup just return to `NotLoaded`. Returns what the integration
    /// reported.
    pub async fn unload(&self, hass: &Hass, entry_id: &str) -> ConfigEntriesResult<bool> {
        let _lock = self.setup_lock.lock().await;

        let entry = self
            .get(entry_id)
            .ok_or_else(|| ConfigEntriesError::NotFound(entry_id.to_string()))?;

        match entry.state {
            ConfigEntryState::NotLoaded => return Ok(true),
            ConfigEntryState::SetupError | ConfigEntryState::SetupRetry => {
                self.transition(entry_id, ConfigEntryState::UnloadInProgress, None)?;
                self.transition(entry_id, ConfigEntryState::NotLoaded, None)?;
                return Ok(true);
            }
            ConfigEntryState::Loaded => {}
            state => return Err(ConfigEntriesError::CannotUnload(state)),
        }

        let integration = hass.integrations.require(&entry.domain)?;
        self.transition(entry_id, ConfigEntryState::UnloadInProgress, None)?;

        match integration.async_unload_entry(hass, &entry).await {
            Ok(true) => {
                self.transition(entry_id, ConfigEntryState::NotLoaded, None)?;
                info!("Unloaded entry: {} ({})", entry.title, entry_id);
                Ok(true)
            }
            Ok(false) => {
                warn!("Integration refused to unload entry {}", entry_id);
                self.transition(
                    entry_id,
                    ConfigEntryState::FailedUnload,
                    Some("unload returned false".to_string()),
                )?;
                Ok(false)
            }
            Err(err) => {
                error!("Error unloading entry {}: {}", entry_id, err);
                self.transition(
                    entry_id,
                    ConfigEntryState::FailedUnload,
                    Some(err.to_string()),
                )?;
                Err(ConfigEntriesError::UnloadFailed(err))
            }
        }
    }

    /// Reload an entry (unload + setup)
    pub async fn reload(
        &self,
        hass: &Hass,
        entry_id: &str,
    ) -> ConfigEntriesResult<ConfigEntryState> {
        if !self.unload(hass, entry_id).await? {
            return Err(ConfigEntriesError::CannotUnload(
                ConfigEntryState::FailedUnload,
            ));
        }
        self.setup(hass, entry_id).await
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
