//! Configuration module for crumbtrail.
//!
//! Provides the typed [`TelemetryConfig`] that maps to the YAML configuration
//! file, with loading, validation, defaults, and a builder for programmatic use.
//! The configuration is immutable once an engine has been started with it.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Default number of breadcrumbs retained for each report.
pub const DEFAULT_MAX_BREADCRUMBS: usize = 20;

/// Default window during which a repeated error is suppressed.
pub const DEFAULT_ERROR_THROTTLE_TIME_MS: u64 = 60_000;

// ---------------------------------------------------------------------------
// Config structs
// ---------------------------------------------------------------------------

/// Top-level configuration for the telemetry engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Collector endpoint. Required; an engine refuses to start without it.
    pub report_url: String,
    pub project_name: Option<String>,
    pub project_version: Option<String>,
    /// Capacity of the breadcrumb buffer.
    pub max_breadcrumbs: usize,
    /// Duplicate-suppression window in milliseconds.
    pub error_throttle_time_ms: u64,
    /// Replace user-entered text with a `length:<n>` summary.
    pub filter_sensitive_input: bool,
    /// Extra request headers sent with every report.
    pub custom_headers: BTreeMap<String, String>,
    /// Extra top-level fields merged into every payload.
    pub custom_data: Map<String, Value>,
    pub performance: PerformanceConfig,
    pub logging: LoggingConfig,
}

/// Performance sampling settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PerformanceConfig {
    /// Subscribe to paint / LCP / FID / CLS / long-task signals.
    pub observe_metrics: bool,
    /// Run the per-frame drop detector.
    pub frame_drop_detection: bool,
}

/// Logging / tracing settings (used by binaries embedding the engine).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: `trace`, `debug`, `info`, `warn`, or `error`.
    pub level: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            report_url: String::new(),
            project_name: None,
            project_version: None,
            max_breadcrumbs: DEFAULT_MAX_BREADCRUMBS,
            error_throttle_time_ms: DEFAULT_ERROR_THROTTLE_TIME_MS,
            filter_sensitive_input: true,
            custom_headers: BTreeMap::new(),
            custom_data: Map::new(),
            performance: PerformanceConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self {
            observe_metrics: true,
            frame_drop_detection: true,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

impl TelemetryConfig {
    /// Load configuration from a YAML file at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: TelemetryConfig = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Platform-appropriate default path for the configuration file.
    ///
    /// Typically `$XDG_CONFIG_HOME/crumbtrail/config.yaml` on Linux.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("crumbtrail")
            .join("config.yaml")
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// A single validation error found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field, e.g. `"logging.level"`.
    pub field: String,
    /// Human-readable explanation.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Fatal configuration problems. An engine never starts with any of these.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// No collector endpoint was configured
    #[error("report_url is required")]
    MissingReportUrl,

    /// One or more fields hold invalid values
    #[error("invalid configuration: {}", join_errors(.0))]
    Invalid(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Valid values for `logging.level`.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

impl TelemetryConfig {
    /// Validate the configuration and return all errors found.
    ///
    /// An empty vector means the configuration is valid.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        // --- report_url ---
        let report_url = self.report_url.trim();
        if report_url.is_empty() {
            errors.push(ValidationError {
                field: "report_url".into(),
                message: "is required".into(),
            });
        } else {
            match url::Url::parse(report_url) {
                Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => {}
                Ok(parsed) => errors.push(ValidationError {
                    field: "report_url".into(),
                    message: format!("unsupported scheme '{}'", parsed.scheme()),
                }),
                Err(e) => errors.push(ValidationError {
                    field: "report_url".into(),
                    message: format!("not a valid URL: {e}"),
                }),
            }
        }

        // --- buffers and windows ---
        if self.max_breadcrumbs == 0 {
            errors.push(ValidationError {
                field: "max_breadcrumbs".into(),
                message: "must be greater than 0".into(),
            });
        }
        if self.error_throttle_time_ms == 0 {
            errors.push(ValidationError {
                field: "error_throttle_time_ms".into(),
                message: "must be greater than 0".into(),
            });
        }

        // --- custom_headers ---
        for name in self.custom_headers.keys() {
            if !is_header_token(name) {
                errors.push(ValidationError {
                    field: format!("custom_headers.{name}"),
                    message: "is not a valid header name".into(),
                });
            }
        }

        // --- logging ---
        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            errors.push(ValidationError {
                field: "logging.level".into(),
                message: format!(
                    "invalid level '{}'; valid options: {}",
                    self.logging.level,
                    VALID_LOG_LEVELS.join(", ")
                ),
            });
        }

        errors
    }

    /// Consume the configuration, returning it only if it is usable.
    ///
    /// A missing `report_url` is reported on its own so callers can tell
    /// "not configured" apart from "misconfigured".
    pub fn validated(self) -> Result<Self, ConfigError> {
        if self.report_url.trim().is_empty() {
            return Err(ConfigError::MissingReportUrl);
        }
        let errors = self.validate();
        if errors.is_empty() {
            Ok(self)
        } else {
            Err(ConfigError::Invalid(errors))
        }
    }
}

/// RFC 7230 `token` characters.
fn is_header_token(name: &str) -> bool {
    !name.is_empty()
        && name.bytes().all(|b| {
            b.is_ascii_alphanumeric()
                || matches!(
                    b,
                    b'!' | b'#'
                        | b'$'
                        | b'%'
                        | b'&'
                        | b'\''
                        | b'*'
                        | b'+'
                        | b'-'
                        | b'.'
                        | b'^'
                        | b'_'
                        | b'`'
                        | b'|'
                        | b'~'
                )
        })
}

// ---------------------------------------------------------------------------
// ConfigBuilder
// ---------------------------------------------------------------------------

/// Builder for constructing a [`TelemetryConfig`] programmatically.
///
/// Starts from [`TelemetryConfig::default`] and allows selective overrides.
///
/// # Example
///
/// ```rust
/// use crumbtrail_core::config::ConfigBuilder;
///
/// let config = ConfigBuilder::new()
///     .report_url("https://collector.example.com/report")
///     .project_name("storefront")
///     .max_breadcrumbs(30)
///     .build_validated()
///     .expect("valid config");
/// assert_eq!(config.max_breadcrumbs, 30);
/// ```
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: TelemetryConfig,
}

impl ConfigBuilder {
    /// Creates a builder pre-filled with default values.
    pub fn new() -> Self {
        Self {
            config: TelemetryConfig::default(),
        }
    }

    pub fn report_url(mut self, url: impl Into<String>) -> Self {
        self.config.report_url = url.into();
        self
    }

    pub fn project_name(mut self, name: impl Into<String>) -> Self {
        self.config.project_name = Some(name.into());
        self
    }

    pub fn project_version(mut self, version: impl Into<String>) -> Self {
        self.config.project_version = Some(version.into());
        self
    }

    pub fn max_breadcrumbs(mut self, n: usize) -> Self {
        self.config.max_breadcrumbs = n;
        self
    }

    pub fn error_throttle_time_ms(mut self, ms: u64) -> Self {
        self.config.error_throttle_time_ms = ms;
        self
    }

    pub fn filter_sensitive_input(mut self, enabled: bool) -> Self {
        self.config.filter_sensitive_input = enabled;
        self
    }

    pub fn custom_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.custom_headers.insert(name.into(), value.into());
        self
    }

    pub fn custom_data(mut self, key: impl Into<String>, value: Value) -> Self {
        self.config.custom_data.insert(key.into(), value);
        self
    }

    pub fn observe_metrics(mut self, enabled: bool) -> Self {
        self.config.performance.observe_metrics = enabled;
        self
    }

    pub fn frame_drop_detection(mut self, enabled: bool) -> Self {
        self.config.performance.frame_drop_detection = enabled;
        self
    }

    pub fn logging_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    /// Build the configuration without validation.
    pub fn build(self) -> TelemetryConfig {
        self.config
    }

    /// Build and validate in one step.
    pub fn build_validated(self) -> Result<TelemetryConfig, ConfigError> {
        self.config.validated()
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use serde_json::json;

    use super::*;

    // -- Defaults --

    #[test]
    fn default_config_has_sensible_values() {
        let cfg = TelemetryConfig::default();
        assert!(cfg.report_url.is_empty());
        assert_eq!(cfg.max_breadcrumbs, 20);
        assert_eq!(cfg.error_throttle_time_ms, 60_000);
        assert!(cfg.filter_sensitive_input);
        assert!(cfg.custom_headers.is_empty());
        assert!(cfg.custom_data.is_empty());
        assert!(cfg.performance.observe_metrics);
        assert!(cfg.performance.frame_drop_detection);
        assert_eq!(cfg.logging.level, "info");
    }

    #[test]
    fn default_config_requires_report_url() {
        let result = TelemetryConfig::default().validated();
        assert_eq!(result.unwrap_err(), ConfigError::MissingReportUrl);
    }

    // -- Loading --

    #[test]
    fn load_from_yaml_file_fills_unset_fields() {
        let yaml = r#"
report_url: https://collector.example.com/api/report
project_name: storefront
max_breadcrumbs: 30
custom_headers:
  X-Api-Key: secret
custom_data:
  tenant: acme
  build: 118
performance:
  frame_drop_detection: false
"#;
        let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
        tmp.write_all(yaml.as_bytes()).unwrap();
        tmp.flush().unwrap();

        let cfg = TelemetryConfig::load(tmp.path()).expect("load config");
        assert_eq!(cfg.report_url, "https://collector.example.com/api/report");
        assert_eq!(cfg.project_name.as_deref(), Some("storefront"));
        assert!(cfg.project_version.is_none());
        assert_eq!(cfg.max_breadcrumbs, 30);
        assert_eq!(cfg.error_throttle_time_ms, 60_000);
        assert!(cfg.filter_sensitive_input);
        assert_eq!(cfg.custom_headers["X-Api-Key"], "secret");
        assert_eq!(cfg.custom_data["tenant"], json!("acme"));
        assert_eq!(cfg.custom_data["build"], json!(118));
        assert!(cfg.performance.observe_metrics);
        assert!(!cfg.performance.frame_drop_detection);
        assert!(cfg.validated().is_ok());
    }

    #[test]
    fn load_returns_error_on_invalid_yaml() {
        let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
        tmp.write_all(b"not: [valid: yaml: {{{").unwrap();
        tmp.flush().unwrap();

        assert!(TelemetryConfig::load(tmp.path()).is_err());
    }

    #[test]
    fn load_returns_error_on_missing_file() {
        assert!(TelemetryConfig::load(Path::new("/nonexistent/crumbtrail.yaml")).is_err());
    }

    // -- Validation --

    #[test]
    fn validate_catches_bad_report_url() {
        let cfg = ConfigBuilder::new().report_url("not a url").build();
        let errors = cfg.validate();
        assert!(errors.iter().any(|e| e.field == "report_url"));

        let cfg = ConfigBuilder::new().report_url("ftp://collector/report").build();
        let errors = cfg.validate();
        assert!(errors
            .iter()
            .any(|e| e.field == "report_url" && e.message.contains("ftp")));
    }

    #[test]
    fn validate_catches_zero_sizes() {
        let cfg = ConfigBuilder::new()
            .report_url("https://c/r")
            .max_breadcrumbs(0)
            .error_throttle_time_ms(0)
            .build();
        let fields: Vec<String> = cfg.validate().into_iter().map(|e| e.field).collect();
        assert!(fields.contains(&"max_breadcrumbs".to_string()));
        assert!(fields.contains(&"error_throttle_time_ms".to_string()));
    }

    #[test]
    fn validate_catches_bad_header_name() {
        let cfg = ConfigBuilder::new()
            .report_url("https://c/r")
            .custom_header("bad header", "x")
            .build();
        let errors = cfg.validate();
        assert!(errors.iter().any(|e| e.field == "custom_headers.bad header"));
    }

    #[test]
    fn validate_catches_invalid_log_level() {
        let cfg = ConfigBuilder::new()
            .report_url("https://c/r")
            .logging_level("verbose")
            .build();
        assert!(cfg.validate().iter().any(|e| e.field == "logging.level"));
    }

    #[test]
    fn validated_reports_all_field_errors() {
        let err = ConfigBuilder::new()
            .report_url("https://c/r")
            .max_breadcrumbs(0)
            .logging_level("loud")
            .build_validated()
            .unwrap_err();
        match err {
            ConfigError::Invalid(errors) => assert_eq!(errors.len(), 2),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn whitespace_report_url_counts_as_missing() {
        let err = ConfigBuilder::new()
            .report_url("   ")
            .build_validated()
            .unwrap_err();
        assert_eq!(err, ConfigError::MissingReportUrl);
        assert_eq!(err.to_string(), "report_url is required");
    }

    // -- Builder --

    #[test]
    fn builder_overrides_fields() {
        let cfg = ConfigBuilder::new()
            .report_url("https://c/r")
            .project_name("p")
            .project_version("1.0.0")
            .max_breadcrumbs(3)
            .error_throttle_time_ms(1000)
            .filter_sensitive_input(false)
            .observe_metrics(false)
            .frame_drop_detection(false)
            .logging_level("debug")
            .build_validated()
            .expect("valid");
        assert_eq!(cfg.project_version.as_deref(), Some("1.0.0"));
        assert_eq!(cfg.max_breadcrumbs, 3);
        assert_eq!(cfg.error_throttle_time_ms, 1000);
        assert!(!cfg.filter_sensitive_input);
        assert!(!cfg.performance.observe_metrics);
        assert!(!cfg.performance.frame_drop_detection);
        assert_eq!(cfg.logging.level, "debug");
    }
}
