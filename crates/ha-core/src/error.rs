//! Host error type

use thiserror::Error;

/// Errors surfaced by integrations to the host
///
/// Integrations return these from setup, unload, platform setup, config flow
/// steps and entity actions. The host decides what a failure means (for
/// example, a failed entry setup marks the entry as `SetupError`).
#[derive(Debug, Error)]
pub enum HomeAssistantError {
    /// No integration is registered for the domain
    #[error("integration not found: {0}")]
    IntegrationNotFound(String),

    /// The integration has no runtime data for the entry
    #[error("entry not loaded: {0}")]
    NotLoaded(String),

    /// Stored or submitted configuration could not be interpreted
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// An entity action was rejected because its arguments are invalid
    #[error("service validation error: {0}")]
    ServiceValidation(String),

    /// An entity does not implement the requested action
    #[error("not supported: {0}")]
    NotSupported(String),

    /// Any other failure raised by an integration
    #[error(transparent)]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl HomeAssistantError {
    /// Wrap an arbitrary error as [`HomeAssistantError::Other`]
    pub fn other<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Other(Box::new(err))
    }
}

pub type HomeAssistantResult<T> = Result<T, HomeAssistantError>;
