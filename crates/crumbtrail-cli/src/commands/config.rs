//! Config command - view, validate and create crumbtrail configuration
//!
//! Provides the `crumbtrail config` CLI command which:
//! 1. Shows the effective configuration (YAML or JSON)
//! 2. Validates the configuration file and reports every error
//! 3. Writes a starter configuration file

use std::path::Path;

use anyhow::{bail, Context, Result};
use clap::Subcommand;
use crumbtrail_core::config::{ConfigBuilder, ConfigError, TelemetryConfig};
use tracing::info;

use crate::output::{get_formatter, OutputFormat};

/// Config subcommands
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Display the effective configuration
    Show,
    /// Validate the configuration file
    Validate,
    /// Write a new configuration file
    Init {
        /// Collector endpoint
        #[arg(long)]
        report_url: String,
        /// Project name sent with every report
        #[arg(long)]
        project_name: Option<String>,
        /// Project version sent with every report
        #[arg(long)]
        project_version: Option<String>,
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

impl ConfigCommand {
    pub async fn execute(&self, format: OutputFormat, config_path: &Path) -> Result<()> {
        match self {
            ConfigCommand::Show => execute_show(format, config_path),
            ConfigCommand::Validate => execute_validate(format, config_path),
            ConfigCommand::Init {
                report_url,
                project_name,
                project_version,
                force,
            } => {
                let mut builder = ConfigBuilder::new().report_url(report_url);
                if let Some(name) = project_name {
                    builder = builder.project_name(name);
                }
                if let Some(version) = project_version {
                    builder = builder.project_version(version);
                }
                let config = builder.build_validated()?;
                write_config(&config, config_path, *force)?;

                let formatter = get_formatter(format);
                if format.is_json() {
                    formatter.print_json(&serde_json::json!({
                        "success": true,
                        "config_path": config_path.display().to_string(),
                    }));
                } else {
                    formatter.success(&format!("Wrote {}", config_path.display()));
                }
                Ok(())
            }
        }
    }
}

fn execute_show(format: OutputFormat, config_path: &Path) -> Result<()> {
    let formatter = get_formatter(format);
    let config = super::load_or_default(config_path)?;

    info!(config_path = %config_path.display(), "Showing configuration");

    if format.is_json() {
        let json =
            serde_json::to_value(&config).context("Failed to serialize configuration to JSON")?;
        formatter.print_json(&json);
    } else {
        formatter.success(&format!("Configuration ({})", config_path.display()));
        formatter.info("");
        let yaml =
            serde_yaml::to_string(&config).context("Failed to serialize configuration to YAML")?;
        for line in yaml.lines() {
            formatter.info(line);
        }
    }
    Ok(())
}

/// Every problem that would stop an engine from starting.
fn collect_errors(config: &TelemetryConfig) -> Vec<String> {
    match config.clone().validated() {
        Ok(_) => Vec::new(),
        Err(ConfigError::Invalid(errors)) => errors.iter().map(ToString::to_string).collect(),
        Err(e) => vec![e.to_string()],
    }
}

fn execute_validate(format: OutputFormat, config_path: &Path) -> Result<()> {
    let formatter = get_formatter(format);

    let errors = if config_path.exists() {
        match TelemetryConfig::load(config_path) {
            Ok(config) => collect_errors(&config),
            Err(e) => vec![format!("Failed to parse configuration: {e}")],
        }
    } else {
        vec!["Configuration file not found".to_string()]
    };

    info!(config_path = %config_path.display(), errors = errors.len(), "Validated configuration");

    if format.is_json() {
        formatter.print_json(&serde_json::json!({
            "valid": errors.is_empty(),
            "config_path": config_path.display().to_string(),
            "errors": errors,
        }));
    } else if errors.is_empty() {
        formatter.success("Configuration is valid");
        formatter.info(&format!("File: {}", config_path.display()));
    } else {
        formatter.error(&format!(
            "Configuration has {} error{}:",
            errors.len(),
            if errors.len() == 1 { "" } else { "s" }
        ));
        formatter.info(&format!("File: {}", config_path.display()));
        for error in &errors {
            formatter.info(&format!("  {error}"));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        bail!("configuration is invalid")
    }
}

fn write_config(config: &TelemetryConfig, path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!(
            "{} already exists (use --force to overwrite)",
            path.display()
        );
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).context("Failed to create configuration directory")?;
    }
    let yaml = serde_yaml::to_string(config).context("Failed to serialize configuration")?;
    std::fs::write(path, yaml).context("Failed to write configuration file")?;
    Ok(())
}
