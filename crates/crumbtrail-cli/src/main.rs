//! Crumbtrail CLI - tooling around the crumbtrail telemetry engine
//!
//! Provides commands for:
//! - Replaying a recorded event log through a real engine
//! - Previewing the report payload a configuration produces
//! - Viewing, validating and creating configuration files

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod output;

use commands::{config::ConfigCommand, payload::PayloadCommand, replay::ReplayCommand};
use output::OutputFormat;

#[derive(Debug, Parser)]
#[command(name = "crumbtrail", version, about = "Client-side error telemetry toolkit")]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    json: bool,

    /// Verbose output (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Use alternate config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Replay a JSON-lines event log through the engine
    Replay(ReplayCommand),
    /// Print the report payload for an error
    Payload(PayloadCommand),
    /// View and manage configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

// Replay relies on background tasks only running at await points.
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Human
    };
    let config_path = commands::config_path(cli.config.as_deref());

    match cli.command {
        Commands::Replay(cmd) => cmd.execute(format, &config_path).await,
        Commands::Payload(cmd) => cmd.execute(format, &config_path).await,
        Commands::Config(cmd) => cmd.execute(format, &config_path).await,
    }
}
