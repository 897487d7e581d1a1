//! Core types for Home Assistant integrations
//!
//! This crate provides the host-side vocabulary shared by integrations and the
//! config entry machinery: the [`HomeAssistantError`] type, entity
//! [`Platform`]s, device metadata and the media player entity model.

mod device;
mod error;
pub mod media_player;
mod platform;

pub use device::{format_mac, DeviceInfo};
pub use error::{HomeAssistantError, HomeAssistantResult};
pub use media_player::{
    MediaPlayerDeviceClass, MediaPlayerEntity, MediaPlayerEntityFeature, MediaPlayerState,
};
pub use platform::Platform;

/// Standard configuration keys shared by integrations
pub mod const_keys {
    /// Display name of the configured device
    pub const CONF_NAME: &str = "name";

    /// Hostname or IP address
    pub const CONF_HOST: &str = "host";

    /// TCP port
    pub const CONF_PORT: &str = "port";
}
