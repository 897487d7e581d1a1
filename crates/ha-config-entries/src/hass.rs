//! Host context handed to integrations
//!
//! [`Hass`] bundles the pieces of the host an integration talks to during
//! entry setup, unload and config flows. It is cheap to clone; every field is
//! shared.

use std::any::Any;
use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;

use crate::flow::FlowManager;
use crate::integration::Integrations;
use crate::manager::ConfigEntries;
use crate::platforms::{EntityPlatforms, PlatformForwarder};

type DataKey = (String, String);

/// Keyed runtime storage scoped by `(domain, entry_id)`
///
/// Integrations keep per-entry runtime objects here (e.g. a connected device
/// handle) so that their platforms can find them. Values are stored type
/// erased and retrieved by type; a lookup with the wrong type behaves like a
/// missing key.
#[derive(Clone, Default)]
pub struct HassData {
    entries: Arc<DashMap<DataKey, Arc<dyn Any + Send + Sync>>>,
}

impl HassData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a value for an entry, replacing any previous value
    pub fn insert<T>(&self, domain: &str, entry_id: &str, value: Arc<T>)
    where
        T: Any + Send + Sync,
    {
        debug!("Storing runtime data for {} entry {}", domain, entry_id);
        self.entries
            .insert((domain.to_string(), entry_id.to_string()), value);
    }

    /// Get the value stored for an entry
    pub fn get<T>(&self, domain: &str, entry_id: &str) -> Option<Arc<T>>
    where
        T: Any + Send + Sync,
    {
        let value = self
            .entries
            .get(&(domain.to_string(), entry_id.to_string()))
            .map(|r| r.value().clone())?;
        value.downcast::<T>().ok()
    }

    /// Remove and return the value stored for an entry
    ///
    /// A value of a different type is left in place.
    pub fn remove<T>(&self, domain: &str, entry_id: &str) -> Option<Arc<T>>
    where
        T: Any + Send + Sync,
    {
        let key = (domain.to_string(), entry_id.to_string());
        let (_, value) = self
            .entries
            .remove_if(&key, |_, value| value.is::<T>())?;
        debug!("Removed runtime data for {} entry {}", domain, entry_id);
        value.downcast::<T>().ok()
    }

    pub fn contains(&self, domain: &str, entry_id: &str) -> bool {
        self.entries
            .contains_key(&(domain.to_string(), entry_id.to_string()))
    }

    /// Number of entries with stored data for a domain
    pub fn count_for_domain(&self, domain: &str) -> usize {
        self.entries.iter().filter(|r| r.key().0 == domain).count()
    }
}

/// The host context
#[derive(Clone)]
pub struct Hass {
    /// Per-entry runtime storage
    pub data: HassData,

    /// Registered integrations by domain
    pub integrations: Arc<Integrations>,

    /// All config entries
    pub config_entries: Arc<ConfigEntries>,

    /// In-progress config flows
    pub flows: Arc<FlowManager>,

    /// Platform setup/teardown for entries
    pub platforms: Arc<dyn PlatformForwarder>,
}

impl Hass {
    /// Create a host with the default entity platform implementation
    pub fn new() -> Self {
        Self::with_platforms(Arc::new(EntityPlatforms::new()))
    }

    /// Create a host with a custom platform forwarder
    pub fn with_platforms(platforms: Arc<dyn PlatformForwarder>) -> Self {
        Self {
            data: HassData::new(),
            integrations: Arc::new(Integrations::new()),
            config_entries: Arc::new(ConfigEntries::new()),
            flows: Arc::new(FlowManager::new()),
            platforms,
        }
    }
}

impl Default for Hass {
    fn default() -> Self {
        Self::new()
    }
}
