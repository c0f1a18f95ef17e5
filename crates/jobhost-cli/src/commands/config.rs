//! Configuration management CLI commands.

use clap::{Args, Subcommand};

use crate::output::{self, OutputFormat};
use jobhost_core::error::AppError;

/// Arguments for config commands
#[derive(Debug, Args)]
pub struct ConfigArgs {
    /// Config subcommand
    #[command(subcommand)]
    pub command: ConfigCommand,
}

/// Config subcommands
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show the effective configuration (file merged with environment)
    Show,
    /// Validate configuration file
    Validate,
    /// Write the default configuration file
    Generate {
        /// Output file path
        #[arg(short, long, default_value = "config/generated.toml")]
        output: String,
    },
}

/// Execute config commands
pub async fn execute(
    args: &ConfigArgs,
    config_path: &str,
    format: OutputFormat,
) -> Result<(), AppError> {
    match &args.command {
        ConfigCommand::Show => {
            let config = super::load_config(config_path)?;
            output::print_item(&config, format);
        }
        ConfigCommand::Validate => {
            let config = super::load_config(config_path).and_then(|c| c.validate().map(|_| c));
            match config {
                Ok(config) => {
                    output::print_success(&format!("Configuration '{}' is valid", config_path));
                    output::print_kv("Instance", &config.scheduler.instance_name);
                    output::print_kv("Persistence", &config.scheduler.persistence_store.to_string());
                    output::print_kv("Shadow copy", &config.plugins.shadow_copy.to_string());
                    output::print_kv("Triggers", &config.triggers.len().to_string());
                }
                Err(e) => {
                    output::print_error(&format!("Configuration invalid: {}", e));
                    return Err(e);
                }
            }
        }
        ConfigCommand::Generate { output: out_path } => {
            let default_config = include_str!("../../../../config/default.toml");

            if let Some(parent) = std::path::Path::new(out_path).parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::write(out_path, default_config).await?;

            output::print_success(&format!("Default config written to '{}'", out_path));
        }
    }

    Ok(())
}
