//! Config Entries
//!
//! This crate provides the configuration entry system for Home Assistant
//! integrations. Config entries represent individual integration instances
//! and this crate manages their lifecycle (setup, unload, reload), the config
//! flows that create them, and the forwarding of entries to entity platforms.
//!
//! # Key Types
//!
//! - [`ConfigEntry`] - A single integration configuration
//! - [`ConfigEntries`] - Manager for all config entries
//! - [`Hass`] - Host context passed to integrations, with [`HassData`] storage
//! - [`Integration`] - Hooks an integration implements
//! - [`ConfigFlow`] / [`FlowManager`] - Config flow steps and their driver

pub mod entry;
pub mod flow;
pub mod hass;
pub mod integration;
pub mod manager;
pub mod platforms;
pub mod state_machine;

// Re-export main types
pub use entry::{ConfigEntry, ConfigEntrySource, ConfigEntryState};

pub use flow::{
    validate_input, ConfigFlow, FieldType, FlowError, FlowInput, FlowManager, FlowResult,
    FlowStep, FormField, SchemaError,
};

pub use hass::{Hass, HassData};

pub use integration::{Integration, Integrations};

pub use manager::{ConfigEntries, ConfigEntriesError, ConfigEntriesResult};

pub use platforms::{AddEntitiesCallback, EntityPlatforms, PlatformForwarder};

pub use state_machine::InvalidTransition;
