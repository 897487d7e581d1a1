//! Blustream Matrix integration
//!
//! Connects to a Blustream HDMI matrix over TCP and exposes the matrix and
//! each of its outputs as media players.
//!
//! - entry setup/unload live here
//! - the single-step config flow is in [`config_flow`]
//! - entities are built in [`media_player`]

pub mod config_flow;
mod consts;
pub mod media_player;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use blustream_matrix::{LoggingListener, Matrix, MatrixControl, MatrixError, TurningOnListener};
use ha_config_entries::{AddEntitiesCallback, ConfigEntry, ConfigFlow, Hass, Integration};
use ha_core::{HomeAssistantError, Platform};
use tracing::{debug, error, info};

pub use config_flow::BlustreamConfigFlow;
pub use consts::*;

/// Platforms an entry is forwarded to
pub const PLATFORMS: &[Platform] = &[Platform::MediaPlayer];

/// Upper bound on connecting to a matrix, including the first status dump
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Builds matrix handles for a host and port
pub trait MatrixFactory: Send + Sync {
    fn create(&self, host: &str, port: u16) -> Arc<dyn MatrixControl>;
}

/// Factory for real TCP matrices
#[derive(Debug, Default, Clone, Copy)]
pub struct TcpMatrixFactory;

impl MatrixFactory for TcpMatrixFactory {
    fn create(&self, host: &str, port: u16) -> Arc<dyn MatrixControl> {
        Arc::new(Matrix::new(host, port))
    }
}

/// Runtime data kept for a loaded entry
pub struct BlustreamData {
    pub matrix: Arc<dyn MatrixControl>,
    pub config: MatrixConfig,
}

/// Connect, giving up after [`CONNECT_TIMEOUT`]
pub async fn connect_with_timeout(matrix: &dyn MatrixControl) -> Result<(), MatrixError> {
    match tokio::time::timeout(CONNECT_TIMEOUT, matrix.async_connect()).await {
        Ok(result) => result,
        Err(_) => Err(MatrixError::TimedOut(format!(
            "{}:{}",
            matrix.hostname(),
            matrix.port()
        ))),
    }
}

/// The Blustream integration
pub struct BlustreamIntegration {
    factory: Arc<dyn MatrixFactory>,
}

impl BlustreamIntegration {
    pub fn new() -> Self {
        Self::with_factory(Arc::new(TcpMatrixFactory))
    }

    /// Use a custom source of matrix handles
    pub fn with_factory(factory: Arc<dyn MatrixFactory>) -> Self {
        Self { factory }
    }
}

impl Default for BlustreamIntegration {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Integration for BlustreamIntegration {
    fn domain(&self) -> &str {
        DOMAIN
    }

    async fn async_setup_entry(
        &self,
        hass: &Hass,
        entry: &ConfigEntry,
    ) -> Result<bool, HomeAssistantError> {
        let config: MatrixConfig = entry
            .data_as()
            .map_err(|e| HomeAssistantError::InvalidData(e.to_string()))?;

        let matrix = self.factory.create(&config.host, config.port);
        matrix.register_listener(Arc::new(LoggingListener::new()));
        if config.power_on_on_source_change {
            info!("Registering listener to turn on matrix when app source is changed");
            matrix.register_listener(Arc::new(TurningOnListener::new(Arc::downgrade(&matrix))));
        }

        if let Err(e) = connect_with_timeout(matrix.as_ref()).await {
            matrix.close();
            if e.is_unreachable() {
                error!("Error connecting to matrix {}: {}", config.host, e);
                return Ok(false);
            }
            return Err(HomeAssistantError::other(e));
        }

        hass.data.insert(
            DOMAIN,
            &entry.entry_id,
            Arc::new(BlustreamData {
                matrix: matrix.clone(),
                config,
            }),
        );

        if let Err(e) = hass.platforms.forward_entry_setups(hass, entry, PLATFORMS).await {
            hass.data.remove::<BlustreamData>(DOMAIN, &entry.entry_id);
            matrix.close();
            return Err(e);
        }

        Ok(true)
    }

    async fn async_unload_entry(
        &self,
        hass: &Hass,
        entry: &ConfigEntry,
    ) -> Result<bool, HomeAssistantError> {
        let data = hass
            .data
            .remove::<BlustreamData>(DOMAIN, &entry.entry_id)
            .ok_or_else(|| HomeAssistantError::NotLoaded(entry.entry_id.clone()))?;
        data.matrix.close();

        hass.platforms.unload_platforms(hass, entry, PLATFORMS).await
    }

    async fn async_setup_platform(
        &self,
        hass: &Hass,
        entry: &ConfigEntry,
        platform: Platform,
        add_entities: &AddEntitiesCallback,
    ) -> Result<(), HomeAssistantError> {
        match platform {
            Platform::MediaPlayer => media_player::async_setup_entry(hass, entry, add_entities),
            other => {
                debug!("{} has no {} platform", DOMAIN, other);
                Ok(())
            }
        }
    }

    fn config_flow(&self) -> Option<Box<dyn ConfigFlow>> {
        Some(Box::new(BlustreamConfigFlow::new(self.factory.clone())))
    }
}
