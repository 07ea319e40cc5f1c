//! Driver configuration

use std::path::Path;

use serde::Deserialize;

use crate::error::{Error, Result};

/// Environment variable overriding the configured device path.
pub const DEVICE_ENV: &str = "SOUNDCUE_DEVICE";

/// Playback driver configuration.
///
/// The device path resolves in precedence order: the [`DEVICE_ENV`]
/// environment variable (via [`DriverConfig::with_env_override`]), an
/// explicit setting (file or code), then the backend default device.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    /// Output device path (None = backend default)
    pub device: Option<String>,
}

impl DriverConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::Invalid(format!("config {}: {e}", path.display())))?;
        toml::from_str(&text).map_err(|e| Error::Invalid(format!("config {}: {e}", path.display())))
    }

    /// Apply the [`DEVICE_ENV`] override, when set and non-empty.
    pub fn with_env_override(mut self) -> Self {
        if let Ok(device) = std::env::var(DEVICE_ENV) {
            if !device.is_empty() {
                self.device = Some(device);
            }
        }
        self
    }
}
