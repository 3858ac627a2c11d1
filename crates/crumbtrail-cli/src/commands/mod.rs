//! CLI subcommands

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use crumbtrail_core::config::TelemetryConfig;

pub mod config;
pub mod payload;
pub mod replay;

/// `--config` if given, otherwise the platform default.
pub fn config_path(explicit: Option<&Path>) -> PathBuf {
    explicit
        .map(Path::to_path_buf)
        .unwrap_or_else(TelemetryConfig::default_path)
}

/// Loads `path`, falling back to defaults when the file does not exist.
pub fn load_or_default(path: &Path) -> Result<TelemetryConfig> {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "No configuration file, using defaults");
        return Ok(TelemetryConfig::default());
    }
    TelemetryConfig::load(path)
        .with_context(|| format!("Failed to load configuration from {}", path.display()))
}
