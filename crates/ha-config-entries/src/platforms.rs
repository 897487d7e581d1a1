//! Platform forwarding
//!
//! After an integration has set up an entry it forwards the entry to its
//! entity platforms. The host then calls back into the integration's platform
//! setup with an [`AddEntitiesCallback`] and keeps the entities it receives.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use dashmap::DashMap;
use ha_core::{HomeAssistantError, MediaPlayerEntity, Platform};
use tracing::{debug, info, warn};

use crate::entry::ConfigEntry;
use crate::hass::Hass;

/// Collects the entities a platform setup produces
#[derive(Default)]
pub struct AddEntitiesCallback {
    media_players: Mutex<Vec<Arc<dyn MediaPlayerEntity>>>,
}

impl AddEntitiesCallback {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add media player entities
    pub fn add_media_players(&self, entities: Vec<Arc<dyn MediaPlayerEntity>>) {
        if let Ok(mut added) = self.media_players.lock() {
            added.extend(entities);
        }
    }

    /// Take everything added so far
    pub fn take_media_players(&self) -> Vec<Arc<dyn MediaPlayerEntity>> {
        self.media_players
            .lock()
            .map(|mut added| std::mem::take(&mut *added))
            .unwrap_or_default()
    }
}

/// Host side of platform forwarding
#[async_trait]
pub trait PlatformForwarder: Send + Sync {
    /// Set up the given platforms for an entry
    async fn forward_entry_setups(
        &self,
        hass: &Hass,
        entry: &ConfigEntry,
        platforms: &[Platform],
    ) -> Result<(), HomeAssistantError>;

    /// Tear down the given platforms for an entry
    ///
    /// Returns `true` if every platform unloaded.
    async fn unload_platforms(
        &self,
        hass: &Hass,
        entry: &ConfigEntry,
        platforms: &[Platform],
    ) -> Result<bool, HomeAssistantError>;
}

/// Default platform forwarder keeping entities in memory per entry
#[derive(Default)]
pub struct EntityPlatforms {
    /// entry_id -> media player entities
    media_players: DashMap<String, Vec<Arc<dyn MediaPlayerEntity>>>,

    /// entry_id -> platforms currently set up
    loaded: DashMap<String, HashSet<Platform>>,
}

impl EntityPlatforms {
    pub fn new() -> Self {
        Self::default()
    }

    /// Media player entities created for an entry
    pub fn media_players(&self, entry_id: &str) -> Vec<Arc<dyn MediaPlayerEntity>> {
        self.media_players
            .get(entry_id)
            .map(|r| r.value().clone())
            .unwrap_or_default()
    }

    /// Find a media player by unique id across all entries
    pub fn media_player(&self, unique_id: &str) -> Option<Arc<dyn MediaPlayerEntity>> {
        self.media_players.iter().find_map(|r| {
            r.value()
                .iter()
                .find(|e| e.unique_id().as_deref() == Some(unique_id))
                .cloned()
        })
    }

    /// Platforms currently set up for an entry
    pub fn loaded_platforms(&self, entry_id: &str) -> HashSet<Platform> {
        self.loaded
            .get(entry_id)
            .map(|r| r.value().clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl PlatformForwarder for EntityPlatforms {
    async fn forward_entry_setups(
        &self,
        hass: &Hass,
        entry: &ConfigEntry,
        platforms: &[Platform],
    ) -> Result<(), HomeAssistantError> {
        let integration = hass.integrations.require(&entry.domain)?;

        for &platform in platforms {
            let add_entities = AddEntitiesCallback::new();
            integration
                .async_setup_platform(hass, entry, platform, &add_entities)
                .await?;

            match platform {
                Platform::MediaPlayer => {
                    let added = add_entities.take_media_players();
                    info!(
                        "Added {} {} entities for {} ({})",
                        added.len(),
                        platform,
                        entry.title,
                        entry.entry_id
                    );
                    self.media_players
                        .entry(entry.entry_id.clone())
                        .or_default()
                        .extend(added);
                }
                other => debug!("No entity storage for platform {}", other),
            }

            self.loaded
                .entry(entry.entry_id.clone())
                .or_default()
                .insert(platform);
        }

        Ok(())
    }

    async fn unload_platforms(
        &self,
        _hass: &Hass,
        entry: &ConfigEntry,
        platforms: &[Platform],
    ) -> Result<bool, HomeAssistantError> {
        let mut all_unloaded = true;

        for &platform in platforms {
            let was_loaded = self
                .loaded
                .get_mut(&entry.entry_id)
                .map(|mut set| set.remove(&platform))
                .unwrap_or(false);

            if !was_loaded {
                warn!(
                    "Platform {} was never set up for entry {}",
                    platform, entry.entry_id
                );
                all_unloaded = false;
                continue;
            }

            match platform {
                Platform::MediaPlayer => {
                    let removed = self
                        .media_players
                        .remove(&entry.entry_id)
                        .map(|(_, v)| v.len())
                        .unwrap_or(0);
                    debug!(
                        "Removed {} {} entities for entry {}",
                        removed, platform, entry.entry_id
                    );
                }
                _ => {}
            }
        }

        self.loaded.remove_if(&entry.entry_id, |_, set| set.is_empty());
        Ok(all_unloaded)
    }
}
