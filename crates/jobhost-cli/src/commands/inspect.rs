//! Lists what a plugin module exports, from inside a sandbox.

use std::path::{Path, PathBuf};

use clap::Args;
use serde::Serialize;
use tabled::Tabled;

use crate::output::{self, OutputFormat};
use jobhost_core::error::{AppError, AppResult};
use jobhost_plugin::context::IsolatedContextManager;
use jobhost_plugin::discovery::select_entry_type;
use jobhost_plugin::runner::{module_name, plugin_directory};
use jobhost_plugin::sandbox::ExportedType;
use jobhost_plugin::ProcessContextManager;

/// Arguments for `jobhost inspect`
#[derive(Debug, Args)]
pub struct InspectArgs {
    /// Plugin module to inspect
    pub plugin: String,
}

#[derive(Debug, Serialize, Tabled)]
struct TypeRow {
    #[tabled(rename = "Type")]
    name: String,
    #[tabled(rename = "Job")]
    conforming: bool,
}

/// Execute `jobhost inspect`
pub async fn execute(args: &InspectArgs, config_path: &str, format: OutputFormat) -> Result<(), AppError> {
    let path = PathBuf::from(&args.plugin);
    if !path.is_file() {
        return Err(AppError::not_found(format!("Plugin file '{}' does not exist", args.plugin)));
    }

    let path = std::path::absolute(&path)?;
    let config = super::load_config(config_path)?;
    let contexts = ProcessContextManager::from_config(&config.plugins)?;

    let types = tokio::task::spawn_blocking(move || exported_types(&contexts, &path))
        .await
        .map_err(|e| AppError::internal(format!("Inspect task failed: {e}")))??;

    let rows: Vec<TypeRow> = types
        .iter()
        .map(|t| TypeRow {
            name: t.name.clone(),
            conforming: t.conforming,
        })
        .collect();
    output::print_list(&rows, format);

    if format == OutputFormat::Table {
        match select_entry_type(&args.plugin, &types) {
            Ok(entry) => output::print_kv("Entry type", &entry),
            Err(reason) => output::print_warning(&reason.to_string()),
        }
    }
    Ok(())
}

fn exported_types(contexts: &ProcessContextManager, path: &Path) -> AppResult<Vec<ExportedType>> {
    let mut handle = contexts.create(&plugin_directory(path)?, &module_name(path))?;
    let types = match handle.context() {
        Some(context) => context.inspect(path).map_err(AppError::from),
        None => Err(AppError::sandbox(format!("Context '{}' is already destroyed", handle.name()))),
    };
    handle.destroy()?;
    types
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_module_is_not_found() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = dir.path().join("jobhost.toml");
        std::fs::write(&config, "").unwrap();

        let args = InspectArgs {
            plugin: dir.path().join("libgone.so").to_string_lossy().into_owned(),
        };
        let err = execute(&args, &config.to_string_lossy(), OutputFormat::Json)
            .await
            .unwrap_err();
        assert_eq!(err.kind, jobhost_core::error::ErrorKind::NotFound);
    }
}
