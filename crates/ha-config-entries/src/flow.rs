//! Config Flows
//!
//! A config flow is the wizard that produces a config entry. Each step either
//! shows a form (optionally with errors), creates an entry or aborts. The
//! [`FlowManager`] keeps in-progress flows, checks submitted input against the
//! form schema, and on `CreateEntry` adds the entry and sets it up.

use std::collections::HashMap;

use async_trait::async_trait;
use dashmap::DashMap;
use ha_core::HomeAssistantError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};
use ulid::Ulid;

use crate::entry::{ConfigEntry, ConfigEntryState};
use crate::hass::Hass;
use crate::manager::ConfigEntriesError;

/// Submitted or stored flow data
pub type FlowInput = HashMap<String, Value>;

/// Type of a form field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    String,
    Integer,
    Boolean,
}

/// Form field schema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormField {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

impl FormField {
    /// A required field without a default
    pub fn required(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            required: true,
            default: None,
        }
    }

    /// Set the value used when the field is not submitted
    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into());
        self
    }

    fn accepts(&self, value: &Value) -> bool {
        match self.field_type {
            FieldType::String => value.is_string(),
            FieldType::Integer => value.is_i64() || value.is_u64(),
            FieldType::Boolean => value.is_boolean(),
        }
    }
}

/// Submitted data does not match the form schema
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SchemaError {
    #[error("required key not provided: {0}")]
    MissingField(String),

    #[error("expected {expected:?} for {field}")]
    WrongType { field: String, expected: FieldType },

    #[error("extra keys not allowed: {0}")]
    ExtraField(String),
}

/// Check submitted data against a schema and fill in defaults
pub fn validate_input(schema: &[FormField], input: &FlowInput) -> Result<FlowInput, SchemaError> {
    if let Some(extra) = input
        .keys()
        .find(|key| !schema.iter().any(|field| &field.name == *key))
    {
        return Err(SchemaError::ExtraField(extra.clone()));
    }

    let mut validated = FlowInput::new();
    for field in schema {
        match input.get(&field.name).or(field.default.as_ref()) {
            Some(value) if field.accepts(value) => {
                validated.insert(field.name.clone(), value.clone());
            }
            Some(_) => {
                return Err(SchemaError::WrongType {
                    field: field.name.clone(),
                    expected: field.field_type,
                });
            }
            None if field.required => return Err(SchemaError::MissingField(field.name.clone())),
            None => {}
        }
    }
    Ok(validated)
}

/// Result of a config flow step
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FlowResult {
    /// Show a form, with errors from the previous submission
    Form {
        step_id: String,
        data_schema: Vec<FormField>,
        errors: HashMap<String, String>,
    },
    /// Finish the flow by creating a config entry
    CreateEntry { title: String, data: FlowInput },
    /// Finish the flow without creating anything
    Abort { reason: String },
}

impl FlowResult {
    /// Show a form for a step
    pub fn form(
        step_id: impl Into<String>,
        data_schema: Vec<FormField>,
        errors: HashMap<String, String>,
    ) -> Self {
        FlowResult::Form {
            step_id: step_id.into(),
            data_schema,
            errors,
        }
    }

    pub fn create_entry(title: impl Into<String>, data: FlowInput) -> Self {
        FlowResult::CreateEntry {
            title: title.into(),
            data,
        }
    }

    /// Errors of a form result
    pub fn errors(&self) -> Option<&HashMap<String, String>> {
        match self {
            FlowResult::Form { errors, .. } => Some(errors),
            _ => None,
        }
    }
}

/// A config flow handler for one integration
#[async_trait]
pub trait ConfigFlow: Send + Sync {
    /// Version stamped on created entries
    fn version(&self) -> u32 {
        1
    }

    /// The initial `user` step
    async fn async_step_user(
        &mut self,
        hass: &Hass,
        user_input: Option<FlowInput>,
    ) -> Result<FlowResult, HomeAssistantError>;
}

/// Flow manager errors
#[derive(Debug, Error)]
pub enum FlowError {
    #[error("Unknown flow: {0}")]
    UnknownFlow(String),

    #[error("{0} does not support config flows")]
    NotSupported(String),

    #[error("Invalid user input: {0}")]
    InvalidData(#[from] SchemaError),

    #[error(transparent)]
    Handler(#[from] HomeAssistantError),

    #[error(transparent)]
    ConfigEntries(#[from] ConfigEntriesError),
}

/// What a flow step produced
#[derive(Debug, Clone)]
pub struct FlowStep {
    pub flow_id: String,
    pub handler: String,
    pub result: FlowResult,
    /// Entry created by a `CreateEntry` result
    pub entry: Option<ConfigEntry>,
}

struct ActiveFlow {
    handler: String,
    flow: Box<dyn ConfigFlow>,
    /// Schema of the form last shown, used to check the next submission
    schema: Vec<FormField>,
}

/// Manages in-progress config flows
#[derive(Default)]
pub struct FlowManager {
    flows: DashMap<String, ActiveFlow>,
}

impl FlowManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a flow for an integration domain
    pub async fn async_init(&self, hass: &Hass, handler: &str) -> Result<FlowStep, FlowError> {
        let integration = hass.integrations.require(handler)?;
        let flow = integration
            .config_flow()
            .ok_or_else(|| FlowError::NotSupported(handler.to_string()))?;

        let flow_id = Ulid::new().to_string();
        debug!("Starting config flow {} for {}", flow_id, handler);

        let active = ActiveFlow {
            handler: handler.to_string(),
            flow,
            schema: Vec::new(),
        };
        self.run_step(hass, flow_id, active, None).await
    }

    /// Submit input to an in-progress flow
    ///
    /// Input is checked against the schema of the form last shown before the
    /// step runs; a schema mismatch leaves the flow in place.
    pub async fn async_configure(
        &self,
        hass: &Hass,
        flow_id: &str,
        user_input: FlowInput,
    ) -> Result<FlowStep, FlowError> {
        let (flow_id, active) = self
            .flows
            .remove(flow_id)
            .ok_or_else(|| FlowError::UnknownFlow(flow_id.to_string()))?;

        let validated = match validate_input(&active.schema, &user_input) {
            Ok(validated) => validated,
            Err(err) => {
                warn!("Rejected input for flow {}: {}", flow_id, err);
                self.flows.insert(flow_id, active);
                return Err(err.into());
            }
        };

        self.run_step(hass, flow_id, active, Some(validated)).await
    }

    async fn run_step(
        &self,
        hass: &Hass,
        flow_id: String,
        mut active: ActiveFlow,
        user_input: Option<FlowInput>,
    ) -> Result<FlowStep, FlowError> {
        let handler = active.handler.clone();
        let result = active.flow.async_step_user(hass, user_input).await?;

        let entry = match &result {
            FlowResult::Form { data_schema, .. } => {
                active.schema = data_schema.clone();
                self.flows.insert(flow_id.clone(), active);
                None
            }
            FlowResult::CreateEntry { title, data } => {
                let entry = ConfigEntry::new(handler.clone(), title.clone())
                    .with_data(data.clone())
                    .with_version(active.flow.version());
                let entry = hass.config_entries.add(entry)?;
                info!("Config flow {} created entry {}", flow_id, entry.entry_id);

                match hass.config_entries.setup(hass, &entry.entry_id).await {
                    Ok(ConfigEntryState::Loaded) => {}
                    Ok(state) => warn!("Entry {} is {:?} after setup", entry.entry_id, state),
                    Err(err) => warn!("Entry {} failed setup: {}", entry.entry_id, err),
                }
                hass.config_entries.get(&entry.entry_id)
            }
            FlowResult::Abort { reason } => {
                info!("Config flow {} aborted: {}", flow_id, reason);
                None
            }
        };

        Ok(FlowStep {
            flow_id,
            handler,
            result,
            entry,
        })
    }

    /// Number of flows waiting for input
    pub fn in_progress(&self) -> usize {
        self.flows.len()
    }
}
