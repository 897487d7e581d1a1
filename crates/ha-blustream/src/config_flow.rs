//! Config flow for Blustream Matrix

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use ha_config_entries::{ConfigFlow, FieldType, FlowInput, FlowResult, FormField, Hass};
use ha_core::HomeAssistantError;
use serde_json::Value;
use thiserror::Error;
use tracing::error;

use crate::consts::{
    MatrixConfig, CONF_HOST, CONF_NAME, CONF_PORT, CONF_POWER_ON_APP_SOURCE_CHANGE, DEFAULT_NAME,
};
use crate::{connect_with_timeout, MatrixFactory};

const STEP_USER: &str = "user";

/// Schema of the `user` step
pub fn user_data_schema() -> Vec<FormField> {
    vec![
        FormField::required(CONF_NAME, FieldType::String).with_default(DEFAULT_NAME),
        FormField::required(CONF_HOST, FieldType::String),
        FormField::required(CONF_PORT, FieldType::Integer)
            .with_default(blustream_matrix::DEFAULT_PORT),
        FormField::required(CONF_POWER_ON_APP_SOURCE_CHANGE, FieldType::Boolean)
            .with_default(false),
    ]
}

/// Why submitted settings were rejected
#[derive(Debug, Error)]
pub enum ValidationError {
    /// The matrix refused, reset or did not answer in time
    #[error("cannot connect")]
    CannotConnect,

    #[error("unexpected error: {0}")]
    Unknown(String),
}

impl ValidationError {
    /// Error key shown on the form
    pub fn as_key(&self) -> &'static str {
        match self {
            ValidationError::CannotConnect => "cannot_connect",
            ValidationError::Unknown(_) => "unknown",
        }
    }
}

/// What a successful validation yields
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedInput {
    pub title: String,
}

/// Check that a matrix answers at the submitted address
///
/// Connects a throwaway handle and closes it again whatever the outcome.
pub async fn validate_input(
    factory: &dyn MatrixFactory,
    data: &FlowInput,
) -> Result<ValidatedInput, ValidationError> {
    let object = data
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect::<serde_json::Map<String, Value>>();
    let config: MatrixConfig = serde_json::from_value(Value::Object(object))
        .map_err(|e| ValidationError::Unknown(e.to_string()))?;

    let matrix = factory.create(&config.host, config.port);
    let result = connect_with_timeout(matrix.as_ref()).await;
    matrix.close();

    match result {
        Ok(()) => Ok(ValidatedInput { title: config.name }),
        Err(e) if e.is_unreachable() => {
            error!("Error connecting to matrix {}:{}: {}", config.host, config.port, e);
            Err(ValidationError::CannotConnect)
        }
        Err(e) => Err(ValidationError::Unknown(e.to_string())),
    }
}

/// The `user` step wizard
pub struct BlustreamConfigFlow {
    factory: Arc<dyn MatrixFactory>,
}

impl BlustreamConfigFlow {
    pub fn new(factory: Arc<dyn MatrixFactory>) -> Self {
        Self { factory }
    }
}

#[async_trait]
impl ConfigFlow for BlustreamConfigFlow {
    async fn async_step_user(
        &mut self,
        _hass: &Hass,
        user_input: Option<FlowInput>,
    ) -> Result<FlowResult, HomeAssistantError> {
        let mut errors = HashMap::new();

        if let Some(user_input) = user_input {
            match validate_input(self.factory.as_ref(), &user_input).await {
                Ok(info) => return Ok(FlowResult::create_entry(info.title, user_input)),
                Err(ValidationError::CannotConnect) => {
                    errors.insert("base".to_string(), "cannot_connect".to_string());
                }
                Err(e) => {
                    error!("Unexpected exception validating matrix settings: {}", e);
                    errors.insert("base".to_string(), e.as_key().to_string());
                }
            }
        }

        Ok(FlowResult::form(STEP_USER, user_data_schema(), errors))
    }
}
