//! Telemetry configuration
//!
//! Every field has a default, so an empty YAML document is a valid configuration.
//!
//! ```rust
//! use navigation_telemetry::TelemetryConfig;
//!
//! let config = TelemetryConfig::from_yaml_str("location_buffer_size: 30\nsku_id: '08'").unwrap();
//! assert_eq!(config.location_buffer_size, 30);
//! assert_eq!(config.sdk_identifier(), "mapbox-navigation-android");
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::buffer::LOCATION_BUFFER_MAX_SIZE;
use crate::{Result, TelemetryError};

/// Version of the navigation event schema.
pub const EVENT_VERSION: u32 = 7;

/// Location engine name that marks events as simulated.
pub const REPLAY_LOCATION_ENGINE: &str = "replay";

const SDK_IDENTIFIER: &str = "mapbox-navigation-android";
const UI_SDK_IDENTIFIER: &str = "mapbox-navigation-ui-android";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Locations kept before and after each reroute/feedback event
    pub location_buffer_size: usize,

    /// Report as the UI SDK rather than the core SDK
    pub from_navigation_ui: bool,

    /// Explicit SDK identifier, overriding `from_navigation_ui`
    pub sdk_identifier: Option<String>,

    pub sdk_version: String,

    pub event_version: u32,

    /// Name of the location engine feeding raw locations
    pub location_engine: String,

    pub sku_id: Option<String>,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            location_buffer_size: LOCATION_BUFFER_MAX_SIZE,
            from_navigation_ui: false,
            sdk_identifier: None,
            sdk_version: env!("CARGO_PKG_VERSION").to_string(),
            event_version: EVENT_VERSION,
            location_engine: "default".to_string(),
            sku_id: None,
        }
    }
}

impl TelemetryConfig {
    /// Parse and validate a YAML configuration document.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = if yaml.trim().is_empty() {
            Self::default()
        } else {
            serde_yaml_ng::from_str(yaml)?
        };
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a YAML configuration file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        debug!("Loading telemetry configuration from {}", path.display());
        let yaml = std::fs::read_to_string(path)
            .map_err(|e| TelemetryError::file_error(path.to_path_buf(), e))?;
        Self::from_yaml_str(&yaml)
    }

    pub fn validate(&self) -> Result<()> {
        if self.location_buffer_size == 0 {
            return Err(TelemetryError::config("location_buffer_size must be at least 1"));
        }
        if self.sdk_version.is_empty() {
            return Err(TelemetryError::config("sdk_version must not be empty"));
        }
        Ok(())
    }

    pub fn sdk_identifier(&self) -> &str {
        match &self.sdk_identifier {
            Some(identifier) => identifier,
            None if self.from_navigation_ui => UI_SDK_IDENTIFIER,
            None => SDK_IDENTIFIER,
        }
    }

    /// Whether locations come from a replay rather than a real device.
    pub fn is_simulation(&self) -> bool {
        self.location_engine == REPLAY_LOCATION_ENGINE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_is_default() {
        assert_eq!(TelemetryConfig::from_yaml_str("").unwrap(), TelemetryConfig::default());
        assert_eq!(TelemetryConfig::default().location_buffer_size, 20);
        assert_eq!(TelemetryConfig::default().event_version, 7);
    }

    #[test]
    fn sdk_identifier_selection() {
        let mut config = TelemetryConfig::default();
        assert_eq!(config.sdk_identifier(), "mapbox-navigation-android");

        config.from_navigation_ui = true;
        assert_eq!(config.sdk_identifier(), "mapbox-navigation-ui-android");

        config.sdk_identifier = Some("custom".to_string());
        assert_eq!(config.sdk_identifier(), "custom");
    }

    #[test]
    fn zero_buffer_is_rejected() {
        let err = TelemetryConfig::from_yaml_str("location_buffer_size: 0").unwrap_err();
        assert!(matches!(err, TelemetryError::Config { .. }));
    }

    #[test]
    fn malformed_yaml_is_parse_error() {
        let err = TelemetryConfig::from_yaml_str("location_buffer_size: [").unwrap_err();
        assert!(matches!(err, TelemetryError::Parse { .. }));
    }

    #[test]
    fn replay_engine_marks_simulation() {
        let config = TelemetryConfig::from_yaml_str("location_engine: replay").unwrap();
        assert!(config.is_simulation());
        assert!(!TelemetryConfig::default().is_simulation());
    }

    #[test]
    fn missing_file_is_file_error() {
        let err = TelemetryConfig::load("/nonexistent/telemetry.yaml").unwrap_err();
        assert!(matches!(err, TelemetryError::File { .. }));
    }
}
