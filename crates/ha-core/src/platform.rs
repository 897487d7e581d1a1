//! Entity platforms an integration can forward a config entry to

use serde::{Deserialize, Serialize};
use std::fmt;

/// Entity platform kinds
///
/// Only the platforms the host can currently instantiate are listed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum Platform {
    /// `media_player` entities
    MediaPlayer,
}

impl Platform {
    /// Platform domain string (e.g. "media_player")
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::MediaPlayer => "media_player",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
