//! Media player platform
//!
//! One [`MatrixEntity`] represents the matrix itself (power), and one
//! [`MatrixOutput`] per output lets the user pick the input shown on it. An
//! [`EntityListener`] registered on the matrix pushes updates into them.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use blustream_matrix::{MatrixControl, MatrixEvent, MatrixListener, MatrixStatus, PowerState};
use ha_config_entries::{AddEntitiesCallback, ConfigEntry, Hass};
use ha_core::{
    format_mac, DeviceInfo, HomeAssistantError, MediaPlayerDeviceClass, MediaPlayerEntity,
    MediaPlayerEntityFeature, MediaPlayerState,
};
use tracing::{debug, error, info, warn};

use crate::{BlustreamData, DOMAIN, MANUFACTURER};

/// Create the entities for a loaded entry
pub fn async_setup_entry(
    hass: &Hass,
    entry: &ConfigEntry,
    add_entities: &AddEntitiesCallback,
) -> Result<(), HomeAssistantError> {
    let data = hass
        .data
        .get::<BlustreamData>(DOMAIN, &entry.entry_id)
        .ok_or_else(|| HomeAssistantError::NotLoaded(entry.entry_id.clone()))?;
    let matrix = data.matrix.clone();
    let status = matrix.status();

    debug!("Setting up matrix entities for {}", data.config.name);
    let matrix_entity = Arc::new(MatrixEntity::new(&data.config.name, matrix.clone(), &status));

    let mut outputs = BTreeMap::new();
    for (&output_id, output_name) in &status.outputs {
        debug!(
            "Setting up output entity for output_id: {}, {}",
            output_id, output_name
        );
        outputs.insert(
            output_id,
            Arc::new(MatrixOutput::new(
                output_id,
                output_name,
                matrix.clone(),
                &status,
            )),
        );
    }

    let mut entities: Vec<Arc<dyn MediaPlayerEntity>> = Vec::with_capacity(outputs.len() + 1);
    entities.push(matrix_entity.clone());
    for output in outputs.values() {
        entities.push(output.clone());
    }

    matrix.register_listener(Arc::new(EntityListener::new(vec![matrix_entity], outputs)));

    info!("Refreshing status after setup");
    if let Err(e) = matrix.update_status() {
        warn!("Failed to request matrix status: {}", e);
    }

    add_entities.add_media_players(entities);
    Ok(())
}

fn power_to_state(power: PowerState) -> Option<MediaPlayerState> {
    match power {
        PowerState::On => Some(MediaPlayerState::On),
        PowerState::Off => Some(MediaPlayerState::Off),
        PowerState::Unknown => None,
    }
}

/// Matrix identity: formatted MAC, or the host when no MAC was reported
fn matrix_id(matrix: &dyn MatrixControl, status: &MatrixStatus) -> String {
    status
        .mac
        .as_deref()
        .map(format_mac)
        .unwrap_or_else(|| matrix.hostname().to_string())
}

fn base_device_info(matrix: &dyn MatrixControl, status: &MatrixStatus) -> DeviceInfo {
    DeviceInfo {
        manufacturer: Some(MANUFACTURER.to_string()),
        configuration_url: Some(format!("http://{}", matrix.hostname())),
        model: status.device_name.clone(),
        sw_version: status.firmware_version.clone(),
        ..Default::default()
    }
}

/// The matrix itself
pub struct MatrixEntity {
    matrix: Arc<dyn MatrixControl>,
    unique_id: String,
    device_info: DeviceInfo,
    state: RwLock<Option<MediaPlayerState>>,
}

impl MatrixEntity {
    pub fn new(name: &str, matrix: Arc<dyn MatrixControl>, status: &MatrixStatus) -> Self {
        let unique_id = matrix_id(matrix.as_ref(), status);
        let device_info = DeviceInfo {
            identifiers: vec![(DOMAIN.to_string(), unique_id.clone())],
            name: Some(name.to_string()),
            ..base_device_info(matrix.as_ref(), status)
        };

        Self {
            state: RwLock::new(power_to_state(status.power)),
            matrix,
            unique_id,
            device_info,
        }
    }

    pub fn set_state(&self, state: Option<MediaPlayerState>) {
        if let Ok(mut current) = self.state.write() {
            *current = state;
        }
    }
}

impl MediaPlayerEntity for MatrixEntity {
    fn unique_id(&self) -> Option<String> {
        Some(self.unique_id.clone())
    }

    fn device_info(&self) -> Option<DeviceInfo> {
        Some(self.device_info.clone())
    }

    fn device_class(&self) -> Option<MediaPlayerDeviceClass> {
        Some(MediaPlayerDeviceClass::Receiver)
    }

    fn supported_features(&self) -> MediaPlayerEntityFeature {
        MediaPlayerEntityFeature::TURN_ON | MediaPlayerEntityFeature::TURN_OFF
    }

    fn state(&self) -> Option<MediaPlayerState> {
        self.state.read().ok().and_then(|s| *s)
    }

    fn turn_on(&self) -> Result<(), HomeAssistantError> {
        self.matrix.turn_on().map_err(HomeAssistantError::other)
    }

    fn turn_off(&self) -> Result<(), HomeAssistantError> {
        self.matrix.turn_off().map_err(HomeAssistantError::other)
    }
}

/// One output of the matrix
pub struct MatrixOutput {
    output_id: u8,
    name: String,
    matrix: Arc<dyn MatrixControl>,
    unique_id: String,
    device_info: DeviceInfo,
    state: RwLock<Option<MediaPlayerState>>,
    /// Input id currently shown
    source: RwLock<Option<u8>>,
}

impl MatrixOutput {
    pub fn new(
        output_id: u8,
        output_name: &str,
        matrix: Arc<dyn MatrixControl>,
        status: &MatrixStatus,
    ) -> Self {
        let parent = matrix_id(matrix.as_ref(), status);
        let unique_id = format!("{}-output{}", parent, output_id);
        let device_info = DeviceInfo {
            identifiers: vec![(DOMAIN.to_string(), unique_id.clone())],
            name: Some(output_name.to_string()),
            via_device: Some((DOMAIN.to_string(), parent)),
            ..base_device_info(matrix.as_ref(), status)
        };

        Self {
            output_id,
            name: output_name.to_string(),
            state: RwLock::new(power_to_state(status.power)),
            source: RwLock::new(status.routes.get(&output_id).copied()),
            matrix,
            unique_id,
            device_info,
        }
    }

    pub fn set_state(&self, state: Option<MediaPlayerState>) {
        if let Ok(mut current) = self.state.write() {
            *current = state;
        }
    }

    /// Record the input now routed to this output
    pub fn set_source(&self, input_id: u8) {
        if let Ok(mut source) = self.source.write() {
            *source = Some(input_id);
        }
    }
}

impl MediaPlayerEntity for MatrixOutput {
    fn unique_id(&self) -> Option<String> {
        Some(self.unique_id.clone())
    }

    fn name(&self) -> Option<String> {
        Some(self.name.clone())
    }

    fn device_info(&self) -> Option<DeviceInfo> {
        Some(self.device_info.clone())
    }

    fn device_class(&self) -> Option<MediaPlayerDeviceClass> {
        Some(MediaPlayerDeviceClass::Receiver)
    }

    fn supported_features(&self) -> MediaPlayerEntityFeature {
        MediaPlayerEntityFeature::SELECT_SOURCE
    }

    fn state(&self) -> Option<MediaPlayerState> {
        self.state.read().ok().and_then(|s| *s)
    }

    fn source(&self) -> Option<String> {
        let input_id = self.source.read().ok().and_then(|s| *s)?;
        self.matrix
            .status()
            .input_name(input_id)
            .map(str::to_string)
    }

    fn source_list(&self) -> Vec<String> {
        self.matrix.status().input_names()
    }

    fn select_source(&self, source: &str) -> Result<(), HomeAssistantError> {
        let status = self.matrix.status();
        let Some(input_id) = status.input_id(source) else {
            let valid = status.input_names();
            error!("Invalid input source: {}, valid sources {:?}", source, valid);
            return Err(HomeAssistantError::ServiceValidation(format!(
                "invalid input source: {}",
                source
            )));
        };

        self.matrix
            .change_source(self.output_id, input_id)
            .map_err(HomeAssistantError::other)
    }
}

/// Routes matrix events to the entities of one entry
pub struct EntityListener {
    matrix_entities: Vec<Arc<MatrixEntity>>,
    outputs: BTreeMap<u8, Arc<MatrixOutput>>,
}

impl EntityListener {
    pub fn new(
        matrix_entities: Vec<Arc<MatrixEntity>>,
        outputs: BTreeMap<u8, Arc<MatrixOutput>>,
    ) -> Self {
        Self {
            matrix_entities,
            outputs,
        }
    }

    fn set_all_states(&self, state: Option<MediaPlayerState>) {
        for entity in &self.matrix_entities {
            entity.set_state(state);
        }
        for output in self.outputs.values() {
            output.set_state(state);
        }
    }
}

impl MatrixListener for EntityListener {
    fn notify(&self, event: &MatrixEvent) {
        match event {
            MatrixEvent::SourceChanged { output, input }
            | MatrixEvent::OutputStatus { output, input } => {
                if let Some(entity) = self.outputs.get(output) {
                    debug!("Output {} now shows input {}", output, input);
                    entity.set_source(*input);
                }
            }
            MatrixEvent::PowerChanged(power) => {
                let state = power_to_state(*power);
                info!("Power changed to: {}, state: {:?}", power, state);
                self.set_all_states(state);
            }
            MatrixEvent::Disconnected => {
                warn!("Matrix disconnected");
                self.set_all_states(None);
            }
            MatrixEvent::Connected
            | MatrixEvent::SourceChangeRequested { .. }
            | MatrixEvent::Error(_) => {}
        }
    }
}
