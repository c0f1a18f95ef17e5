//! CLI command definitions and dispatch.

pub mod config;
pub mod inspect;
pub mod run;

use clap::{Parser, Subcommand};

use crate::output::OutputFormat;
use jobhost_core::config::AppConfig;
use jobhost_core::error::AppError;

/// Run and inspect JobHost plugins from the command line
#[derive(Debug, Parser)]
#[command(name = "jobhost", version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/default.toml")]
    pub config: String,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub format: OutputFormat,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run a plugin once in an isolated context
    Run(run::RunArgs),
    /// List the types a plugin module exports
    Inspect(inspect::InspectArgs),
    /// Configuration management
    Config(config::ConfigArgs),
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(&self) -> Result<(), AppError> {
        match &self.command {
            Commands::Run(args) => run::execute(args, &self.config, self.format).await,
            Commands::Inspect(args) => inspect::execute(args, &self.config, self.format).await,
            Commands::Config(args) => config::execute(args, &self.config, self.format).await,
        }
    }
}

/// Helper: load configuration from file
pub fn load_config(config_path: &str) -> Result<AppConfig, AppError> {
    AppConfig::load(config_path)
}
