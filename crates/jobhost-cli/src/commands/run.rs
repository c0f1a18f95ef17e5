//! One-shot plugin execution.

use std::sync::Arc;

use clap::Args;
use serde_json::Value;

use crate::output::{self, OutputFormat};
use jobhost_core::error::AppError;
use jobhost_core::events::BroadcastEventBus;
use jobhost_core::types::{JobDataMap, PLUGIN_PATH_KEY};
use jobhost_plugin::{PluginRunner, ProcessContextManager};

/// Arguments for `jobhost run`
#[derive(Debug, Args)]
pub struct RunArgs {
    /// Plugin module to execute
    pub plugin: String,

    /// Extra job data as KEY=VALUE; values that parse as JSON are kept typed
    #[arg(short = 'd', long = "data", value_parser = parse_key_value)]
    pub data: Vec<(String, String)>,
}

/// Runs the plugin once and prints the completion event.
pub async fn execute(args: &RunArgs, config_path: &str, format: OutputFormat) -> Result<(), AppError> {
    let config = super::load_config(config_path)?;
    let contexts = ProcessContextManager::from_config(&config.plugins)?;

    let bus = Arc::new(BroadcastEventBus::new(16));
    let mut events = bus.subscribe();
    let runner = PluginRunner::new(Arc::new(contexts), bus);

    let data = job_data(args);
    tokio::task::spawn_blocking(move || runner.execute(&data))
        .await
        .map_err(|e| AppError::internal(format!("Plugin run task failed: {e}")))??;

    match events.try_recv() {
        Ok(event) => {
            output::print_event(&event, format);
            if !event.success {
                return Err(AppError::plugin(format!("'{}' reported a failure", event.job_type)));
            }
        }
        Err(_) => output::print_warning("No completion event was published; see the log for the reason"),
    }
    Ok(())
}

fn job_data(args: &RunArgs) -> JobDataMap {
    let data = args.data.iter().fold(JobDataMap::new(), |data, (key, value)| {
        let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.clone()));
        data.with(key.as_str(), value)
    });
    // The positional path always wins over a `-d pluginPath=...` entry.
    data.with(PLUGIN_PATH_KEY, args.plugin.as_str())
}

fn parse_key_value(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => Ok((key.trim().to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got '{s}'")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_key_value() {
        assert_eq!(
            parse_key_value("region=eu-west").unwrap(),
            ("region".to_string(), "eu-west".to_string())
        );
        assert_eq!(parse_key_value("query=a=b").unwrap().1, "a=b");
        assert_eq!(parse_key_value("empty=").unwrap().1, "");
        assert!(parse_key_value("novalue").is_err());
        assert!(parse_key_value("=value").is_err());
    }

    #[test]
    fn test_job_data_keeps_plugin_path_last() {
        let args = RunArgs {
            plugin: "/opt/plugins/libreport.so".to_string(),
            data: vec![
                ("pluginPath".to_string(), "/elsewhere.so".to_string()),
                ("retries".to_string(), "3".to_string()),
                ("label".to_string(), "nightly".to_string()),
            ],
        };
        let data = job_data(&args);
        assert_eq!(data.plugin_path(), Some("/opt/plugins/libreport.so"));
        assert_eq!(data.get("retries"), Some(&Value::from(3)));
        assert_eq!(data.get_string("label"), Some("nightly"));
    }
}
