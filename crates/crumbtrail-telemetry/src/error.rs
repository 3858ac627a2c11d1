//! Error types for the telemetry engine

use crumbtrail_core::config::ConfigError;
use thiserror::Error;

/// Errors surfaced while starting or operating the engine.
///
/// Only start-up errors ever reach a caller. Everything that happens once
/// the engine is running is logged and swallowed.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// Configuration is missing or invalid
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The engine was started outside a Tokio runtime
    #[error("no async runtime available: {0}")]
    Runtime(String),

    /// Metrics registry could not be created
    #[error("metrics registry error: {0}")]
    Metrics(#[from] prometheus::Error),

    /// HTTP client could not be constructed
    #[error("transport error: {0}")]
    Transport(String),

    /// The host refused an error-hook subscription
    #[error("failed to subscribe to host errors: {0}")]
    Subscribe(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_display() {
        let err = TelemetryError::from(ConfigError::MissingReportUrl);
        assert_eq!(err.to_string(), "configuration error: report_url is required");
    }
}
