//! Application configuration schemas.
//!
//! All configuration structs are deserialized from a TOML file via the
//! `config` crate, overlaid with `JOBHOST__*` environment variables.
//! Each sub-module represents a logical configuration section.

pub mod logging;
pub mod plugin;
pub mod scheduler;

use std::path::Path;

use serde::{Deserialize, Serialize};

pub use self::logging::{LogFormat, LoggingConfig};
pub use self::plugin::PluginConfig;
pub use self::scheduler::{PersistenceStoreType, SchedulerConfig};

use crate::error::AppError;
use crate::types::trigger::TriggerConfig;

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Scheduler instance settings.
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    /// Isolated plugin host settings.
    #[serde(default)]
    pub plugins: PluginConfig,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Triggers registered at startup.
    #[serde(default)]
    pub triggers: Vec<TriggerConfig>,
}

impl AppConfig {
    /// Load configuration from a TOML file (optional) and the environment.
    ///
    /// Environment variables use the `JOBHOST` prefix and `__` as the
    /// section separator, e.g. `JOBHOST__LOGGING__LEVEL=debug`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, AppError> {
        let config = config::Config::builder()
            .add_source(config::File::from(path.as_ref()).required(false))
            .add_source(
                config::Environment::with_prefix("JOBHOST")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| AppError::configuration(format!("Failed to build config: {e}")))?;

        config
            .try_deserialize()
            .map_err(|e| AppError::configuration(format!("Failed to deserialize config: {e}")))
    }

    /// Validate cross-section invariants.
    pub fn validate(&self) -> Result<(), AppError> {
        self.scheduler.validate()?;
        for trigger in &self.triggers {
            trigger.validate()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = AppConfig::load(dir.path().join("absent.toml")).expect("load");
        assert_eq!(config.scheduler, SchedulerConfig::default());
        assert!(config.plugins.shadow_copy);
        assert_eq!(config.logging.level, "info");
        assert!(config.triggers.is_empty());
    }

    #[test]
    fn test_load_from_toml() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("jobhost.toml");
        let mut file = std::fs::File::create(&path).expect("create");
        writeln!(
            file,
            r#"
[scheduler]
instance_name = "Nightly"
enable_audit_history = false

[plugins]
shadow_copy = false
shutdown_grace_ms = 50

[logging]
format = "pretty"

[[triggers]]
name = "hello-every-minute"
group = "demo"
job_name = "hello"
job_group = "demo"
cron = "0 * * * * *"

[triggers.data]
pluginPath = "plugins/libplugin_hello.so"
"#
        )
        .expect("write");

        let config = AppConfig::load(&path).expect("load");
        assert_eq!(config.scheduler.instance_name, "Nightly");
        assert_eq!(config.scheduler.instance_id, "instance_one");
        assert!(!config.scheduler.enable_audit_history);
        assert!(!config.plugins.shadow_copy);
        assert_eq!(config.plugins.shutdown_grace_ms, 50);
        assert_eq!(config.logging.format, LogFormat::Pretty);
        assert_eq!(config.triggers.len(), 1);

        let trigger = &config.triggers[0];
        assert_eq!(trigger.kind, "plugin");
        assert_eq!(
            trigger.data.plugin_path(),
            Some("plugins/libplugin_hello.so")
        );
        assert!(config.validate().is_ok());
    }
}
