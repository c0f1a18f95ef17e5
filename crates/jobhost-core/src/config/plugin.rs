//! Plugin host configuration.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Name of the sandbox executable shipped next to the host binaries.
pub const SANDBOX_EXECUTABLE_NAME: &str = "jobhost-sandbox";

/// Settings for the isolated plugin execution host.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginConfig {
    /// Path to the sandbox executable. Defaults to `jobhost-sandbox`
    /// next to the running executable.
    #[serde(default)]
    pub sandbox_executable: Option<PathBuf>,
    /// Host base path; the first entry of every sandbox search path.
    /// Defaults to the directory of the running executable.
    #[serde(default)]
    pub base_path: Option<PathBuf>,
    /// Copy plugin modules into the context before loading them.
    #[serde(default = "default_true")]
    pub shadow_copy: bool,
    /// Root directory for per-context shadow copies.
    #[serde(default)]
    pub shadow_root: Option<PathBuf>,
    /// How long a sandbox may take to exit after `shutdown` before it is killed.
    #[serde(default = "default_shutdown_grace_ms")]
    pub shutdown_grace_ms: u64,
    /// Extra environment variables for sandbox processes.
    #[serde(default)]
    pub environment: BTreeMap<String, String>,
}

impl Default for PluginConfig {
    fn default() -> Self {
        Self {
            sandbox_executable: None,
            base_path: None,
            shadow_copy: true,
            shadow_root: None,
            shutdown_grace_ms: default_shutdown_grace_ms(),
            environment: BTreeMap::new(),
        }
    }
}

impl PluginConfig {
    /// Effective host base path.
    pub fn resolved_base_path(&self) -> Result<PathBuf, AppError> {
        match &self.base_path {
            Some(path) => Ok(path.clone()),
            None => current_exe_dir(),
        }
    }

    /// Effective sandbox executable path.
    pub fn resolved_sandbox_executable(&self) -> Result<PathBuf, AppError> {
        match &self.sandbox_executable {
            Some(path) => Ok(path.clone()),
            None => Ok(current_exe_dir()?.join(format!(
                "{}{}",
                SANDBOX_EXECUTABLE_NAME,
                std::env::consts::EXE_SUFFIX
            ))),
        }
    }

    /// Effective shadow copy root.
    pub fn resolved_shadow_root(&self) -> PathBuf {
        self.shadow_root
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("jobhost-shadow"))
    }
}

fn current_exe_dir() -> Result<PathBuf, AppError> {
    let exe = std::env::current_exe()?;
    exe.parent().map(|p| p.to_path_buf()).ok_or_else(|| {
        AppError::configuration(format!(
            "cannot determine directory of executable '{}'",
            exe.display()
        ))
    })
}

fn default_true() -> bool {
    true
}

fn default_shutdown_grace_ms() -> u64 {
    500
}
