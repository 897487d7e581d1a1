//! Constants and stored configuration

use blustream_matrix::DEFAULT_PORT;
use serde::{Deserialize, Serialize};

pub use ha_core::const_keys::{CONF_HOST, CONF_NAME, CONF_PORT};

pub const DOMAIN: &str = "blustream";

/// Power the matrix on when another controller changes a source
pub const CONF_POWER_ON_APP_SOURCE_CHANGE: &str = "power_on_on_source_change";

pub const DEFAULT_NAME: &str = "Matrix";

pub const MANUFACTURER: &str = "Blustream";

/// Typed view of a Blustream config entry's data
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatrixConfig {
    #[serde(default = "default_name")]
    pub name: String,

    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default)]
    pub power_on_on_source_change: bool,
}

impl MatrixConfig {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            name: default_name(),
            host: host.into(),
            port: DEFAULT_PORT,
            power_on_on_source_change: false,
        }
    }
}

fn default_name() -> String {
    DEFAULT_NAME.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}
