//! Integration trait and registry
//!
//! An integration is the code behind a domain: it sets up and unloads config
//! entries, builds entities for the platforms it forwards to, and optionally
//! provides a config flow.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use ha_core::{HomeAssistantError, Platform};
use tracing::debug;

use crate::entry::ConfigEntry;
use crate::flow::ConfigFlow;
use crate::hass::Hass;
use crate::platforms::AddEntitiesCallback;

/// Lifecycle hooks of an integration
///
/// `async_setup_entry` follows Home Assistant's contract: `Ok(true)` means the
/// entry is loaded, `Ok(false)` means a transient failure the host may retry,
/// and `Err` is a setup error.
#[async_trait]
pub trait Integration: Send + Sync {
    /// Integration domain (e.g. "blustream")
    fn domain(&self) -> &str;

    /// Set up a config entry
    async fn async_setup_entry(
        &self,
        hass: &Hass,
        entry: &ConfigEntry,
    ) -> Result<bool, HomeAssistantError>;

    /// Unload a config entry
    async fn async_unload_entry(
        &self,
        hass: &Hass,
        entry: &ConfigEntry,
    ) -> Result<bool, HomeAssistantError>;

    /// Create the entities of one platform for an entry
    async fn async_setup_platform(
        &self,
        _hass: &Hass,
        _entry: &ConfigEntry,
        platform: Platform,
        _add_entities: &AddEntitiesCallback,
    ) -> Result<(), HomeAssistantError> {
        debug!("{} does not provide platform {}", self.domain(), platform);
        Ok(())
    }

    /// Start a new config flow, if the integration supports one
    fn config_flow(&self) -> Option<Box<dyn ConfigFlow>> {
        None
    }
}

/// Registry of integrations by domain
#[derive(Default)]
pub struct Integrations {
    by_domain: DashMap<String, Arc<dyn Integration>>,
}

impl Integrations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an integration under its domain
    pub fn register(&self, integration: Arc<dyn Integration>) {
        let domain = integration.domain().to_string();
        debug!("Registered integration: {}", domain);
        self.by_domain.insert(domain, integration);
    }

    pub fn get(&self, domain: &str) -> Option<Arc<dyn Integration>> {
        self.by_domain.get(domain).map(|r| r.value().clone())
    }

    /// Get an integration or fail with [`HomeAssistantError::IntegrationNotFound`]
    pub fn require(&self, domain: &str) -> Result<Arc<dyn Integration>, HomeAssistantError> {
        self.get(domain)
            .ok_or_else(|| HomeAssistantError::IntegrationNotFound(domain.to_string()))
    }
}
