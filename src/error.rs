//! Error types for navigation telemetry.
//!
//! Most of this crate is infallible by construction: buffering, route dispatch and
//! event gating never fail, and a telemetry event that cannot be sent is dropped with
//! a diagnostic log rather than surfaced as an error. What remains are programming
//! errors (using the service after it stopped, building it without a sink) and the
//! I/O edges: configuration files, replay recordings and event sinks.
//!
//! ## Error Categories
//!
//! - **Lifecycle Errors**: the telemetry service is not running or was built incomplete
//! - **Configuration Errors**: invalid configuration values
//! - **File / Parse Errors**: problems reading configuration or replay recordings
//! - **Sink Errors**: a metrics sink failed to accept an event
//!
//! ```rust
//! use navigation_telemetry::TelemetryError;
//!
//! let error = TelemetryError::not_running("post_user_feedback");
//! assert!(error.is_fatal());
//! for suggestion in error.recovery_suggestions() {
//!     println!("  - {}", suggestion);
//! }
//! ```

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for telemetry operations.
pub type Result<T, E = TelemetryError> = std::result::Result<T, E>;

/// Main error type for telemetry operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum TelemetryError {
    #[error("Telemetry service is not running (attempted {operation})")]
    NotRunning { operation: String },

    #[error("Telemetry service built without a {component}")]
    MissingComponent { component: &'static str },

    #[error("Invalid telemetry configuration: {details}")]
    Config { details: String },

    #[error("File error: {path}")]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Parse error in {context}: {details}")]
    Parse { context: String, details: String },

    #[error("Metrics sink rejected event: {reason}")]
    Sink {
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl TelemetryError {
    /// Returns whether this error indicates misuse of the API rather than a runtime condition.
    ///
    /// Fatal errors mean telemetry would otherwise run silently empty.
    pub fn is_fatal(&self) -> bool {
        match self {
            TelemetryError::NotRunning { .. } => true,
            TelemetryError::MissingComponent { .. } => true,
            TelemetryError::Config { .. } => true,
            TelemetryError::File { .. } => false,
            TelemetryError::Parse { .. } => false,
            TelemetryError::Sink { .. } => false,
        }
    }

    /// Returns suggested recovery actions for this error.
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            TelemetryError::NotRunning { .. } => vec![
                "Build the telemetry service before reporting to it",
                "Check that the owning cancellation token was not cancelled",
                "Keep the NavigationTelemetry value alive for the navigation lifetime",
            ],
            TelemetryError::MissingComponent { .. } => vec![
                "Pass a metrics reporter to TelemetryBuilder::reporter",
                "Use ChannelReporter when events should be consumed in-process",
            ],
            TelemetryError::Config { .. } => vec![
                "Check configuration values against their documented ranges",
                "Remove the key to fall back to the default",
            ],
            TelemetryError::File { .. } => vec![
                "Check file exists and is readable",
                "Check file permissions",
            ],
            TelemetryError::Parse { .. } => vec![
                "Verify the YAML document structure",
                "Check signal names and field spelling",
            ],
            TelemetryError::Sink { .. } => vec![
                "Check the sink destination is writable",
                "Events are not retried by this crate",
            ],
        }
    }

    /// Helper constructor for operations on a stopped service.
    pub fn not_running(operation: impl Into<String>) -> Self {
        TelemetryError::NotRunning { operation: operation.into() }
    }

    /// Helper constructor for configuration errors.
    pub fn config(details: impl Into<String>) -> Self {
        TelemetryError::Config { details: details.into() }
    }

    /// Helper constructor for file errors with path context.
    pub fn file_error(path: PathBuf, source: std::io::Error) -> Self {
        TelemetryError::File { path, source }
    }

    /// Helper constructor for parse errors.
    pub fn parse_error(context: impl Into<String>, details: impl Into<String>) -> Self {
        TelemetryError::Parse { context: context.into(), details: details.into() }
    }

    /// Helper constructor for sink errors with source.
    pub fn sink_error(
        reason: impl Into<String>,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        TelemetryError::Sink { reason: reason.into(), source: Some(source) }
    }
}

impl From<std::io::Error> for TelemetryError {
    fn from(err: std::io::Error) -> Self {
        TelemetryError::File { path: PathBuf::from("<unknown>"), source: err }
    }
}

impl From<serde_yaml_ng::Error> for TelemetryError {
    fn from(err: serde_yaml_ng::Error) -> Self {
        TelemetryError::Parse { context: "YAML document".to_string(), details: err.to_string() }
    }
}
