//! Device metadata attached to entities

use serde::{Deserialize, Serialize};

/// Information about the physical device behind an entity
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    /// (domain, id) pairs identifying the device
    #[serde(default)]
    pub identifiers: Vec<(String, String)>,

    /// Device name, when it differs from the entity name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manufacturer: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sw_version: Option<String>,

    /// URL of the device's own configuration page
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub configuration_url: Option<String>,

    /// Parent device this one is reached through
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub via_device: Option<(String, String)>,
}

/// Normalize a MAC address to lowercase colon-separated form
///
/// Accepts colon, dash or dot separated input as well as bare hex. Anything
/// that is not twelve hex digits is returned unchanged, matching Home Assistant's
/// `format_mac`.
pub fn format_mac(mac: &str) -> String {
    let hex: String = mac
        .chars()
        .filter(|c| !matches!(c, ':' | '-' | '.'))
        .collect();

    if hex.len() != 12 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return mac.to_string();
    }

    let lower = hex.to_ascii_lowercase();
    lower
        .as_bytes()
        .chunks(2)
        .filter_map(|pair| std::str::from_utf8(pair).ok())
        .collect::<Vec<_>>()
        .join(":")
}
