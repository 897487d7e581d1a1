//! Media player entity model
//!
//! The subset of Home Assistant's media player model that integrations need
//! to describe a switchable, source-selecting device.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{DeviceInfo, HomeAssistantError};

/// Media player state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaPlayerState {
    On,
    Off,
}

impl MediaPlayerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaPlayerState::On => "on",
            MediaPlayerState::Off => "off",
        }
    }
}

impl fmt::Display for MediaPlayerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Media player device class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaPlayerDeviceClass {
    Receiver,
}

bitflags! {
    /// Supported media player features, values match Home Assistant
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
    pub struct MediaPlayerEntityFeature: u32 {
        const TURN_ON = 128;
        const TURN_OFF = 256;
        const SELECT_SOURCE = 2048;
    }
}

/// A media player entity
///
/// Entities are pushed by the integration (`should_poll = false`): they update
/// their own state from device callbacks and the host reads it on demand.
/// Actions default to [`HomeAssistantError::NotSupported`] so an entity only
/// implements what its [`supported_features`](Self::supported_features)
/// advertise.
pub trait MediaPlayerEntity: Send + Sync {
    /// Stable unique id used by the entity registry
    fn unique_id(&self) -> Option<String>;

    /// Entity name; `None` means "use the device name"
    fn name(&self) -> Option<String> {
        None
    }

    fn device_info(&self) -> Option<DeviceInfo> {
        None
    }

    fn device_class(&self) -> Option<MediaPlayerDeviceClass> {
        None
    }

    fn supported_features(&self) -> MediaPlayerEntityFeature {
        MediaPlayerEntityFeature::empty()
    }

    /// Current state; `None` is reported as unknown
    fn state(&self) -> Option<MediaPlayerState>;

    /// Currently selected source
    fn source(&self) -> Option<String> {
        None
    }

    /// Selectable sources
    fn source_list(&self) -> Vec<String> {
        Vec::new()
    }

    fn turn_on(&self) -> Result<(), HomeAssistantError> {
        Err(HomeAssistantError::NotSupported("turn_on".to_string()))
    }

    fn turn_off(&self) -> Result<(), HomeAssistantError> {
        Err(HomeAssistantError::NotSupported("turn_off".to_string()))
    }

    fn select_source(&self, source: &str) -> Result<(), HomeAssistantError> {
        Err(HomeAssistantError::NotSupported(format!(
            "select_source({})",
            source
        )))
    }
}
