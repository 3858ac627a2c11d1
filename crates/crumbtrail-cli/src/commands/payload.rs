//! Payload command - show the exact JSON a report would carry

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use crumbtrail_core::domain::{Breadcrumb, ErrorInfo, Payload};

use crate::output::{get_formatter, OutputFormat};

#[derive(Debug, Args)]
pub struct PayloadCommand {
    /// Error message
    #[arg(long)]
    message: String,
    /// Page the error happened on
    #[arg(long)]
    url: String,
    /// Stack trace
    #[arg(long)]
    stack: Option<String>,
    /// Framework context, e.g. the failing lifecycle hook
    #[arg(long)]
    info: Option<String>,
    /// JSON file holding an array of breadcrumbs to include
    #[arg(long)]
    breadcrumbs: Option<PathBuf>,
}

impl PayloadCommand {
    pub async fn execute(&self, format: OutputFormat, config_path: &Path) -> Result<()> {
        let config = super::load_or_default(config_path)?;

        let mut error = ErrorInfo::new(&self.message, &self.url);
        if let Some(stack) = &self.stack {
            error = error.with_stack(stack);
        }
        if let Some(info) = &self.info {
            error = error.with_info(info);
        }

        let breadcrumbs = match &self.breadcrumbs {
            Some(path) => read_breadcrumbs(path)?,
            None => Vec::new(),
        };

        let document = Payload::new(&config, error, breadcrumbs).to_json()?;
        get_formatter(format).print_json(&document);
        Ok(())
    }
}

fn read_breadcrumbs(path: &Path) -> Result<Vec<Breadcrumb>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("{} is not a JSON array of breadcrumbs", path.display()))
}
