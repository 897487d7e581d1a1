//! Host wired for Blustream tests

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use ha_blustream::{BlustreamIntegration, MatrixFactory};
use ha_config_entries::{ConfigEntry, EntityPlatforms, Hass, PlatformForwarder};
use ha_core::{HomeAssistantError, Platform};

use super::{ConnectOutcome, FakeFactory, Journal};

/// Platform forwarder that records calls and delegates to [`EntityPlatforms`]
#[derive(Default)]
pub struct RecordingPlatforms {
    pub entities: EntityPlatforms,
    journal: Journal,
    forwarded: Mutex<Vec<(String, Vec<Platform>)>>,
    unloaded: Mutex<Vec<(String, Vec<Platform>)>>,
}

impl RecordingPlatforms {
    pub fn new(journal: Journal) -> Self {
        Self {
            journal,
            ..Default::default()
        }
    }

    pub fn forwarded(&self) -> Vec<(String, Vec<Platform>)> {
        self.forwarded.lock().unwrap().clone()
    }

    pub fn unloaded(&self) -> Vec<(String, Vec<Platform>)> {
        self.unloaded.lock().unwrap().clone()
    }
}

#[async_trait]
impl PlatformForwarder for RecordingPlatforms {
    async fn forward_entry_setups(
        &self,
        hass: &Hass,
        entry: &ConfigEntry,
        platforms: &[Platform],
    ) -> Result<(), HomeAssistantError> {
        self.forwarded
            .lock()
            .unwrap()
            .push((entry.entry_id.clone(), platforms.to_vec()));
        self.entities
            .forward_entry_setups(hass, entry, platforms)
            .await
    }

    async fn unload_platforms(
        &self,
        hass: &Hass,
        entry: &ConfigEntry,
        platforms: &[Platform],
    ) -> Result<bool, HomeAssistantError> {
        self.journal
            .lock()
            .unwrap()
            .push(format!("unload_platforms {}", entry.entry_id));
        self.unloaded
            .lock()
            .unwrap()
            .push((entry.entry_id.clone(), platforms.to_vec()));
        self.entities.unload_platforms(hass, entry, platforms).await
    }
}

/// A host with the Blustream integration registered against fakes
pub struct TestHass {
    pub hass: Hass,
    pub factory: Arc<FakeFactory>,
    pub platforms: Arc<RecordingPlatforms>,
    pub integration: Arc<BlustreamIntegration>,
    pub journal: Journal,
}

impl TestHass {
    pub fn new(outcome: ConnectOutcome) -> Self {
        super::init_tracing();

        let journal = Journal::default();
        let factory = FakeFactory::with_journal(outcome, journal.clone());
        let platforms = Arc::new(RecordingPlatforms::new(journal.clone()));
        let hass = Hass::with_platforms(platforms.clone());

        let matrix_factory: Arc<dyn MatrixFactory> = factory.clone();
        let integration = Arc::new(BlustreamIntegration::with_factory(matrix_factory));
        hass.integrations.register(integration.clone());

        Self {
            hass,
            factory,
            platforms,
            integration,
            journal,
        }
    }
}
