//! Scheduler-wide settings.
//!
//! These used to live in a process-wide singleton with an
//! initialize/shutdown lifecycle; here they are a plain value that is
//! built once at startup and passed to whoever needs it.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Backend used to persist schedules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PersistenceStoreType {
    /// Schedules live in memory for the lifetime of the process.
    #[default]
    InMemory,
    /// Schedules are stored in PostgreSQL.
    Postgres,
}

impl fmt::Display for PersistenceStoreType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InMemory => write!(f, "in_memory"),
            Self::Postgres => write!(f, "postgres"),
        }
    }
}

/// Scheduler instance configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Logical scheduler name.
    #[serde(default = "default_instance_name")]
    pub instance_name: String,
    /// Identifier of this scheduler instance.
    #[serde(default = "default_instance_id")]
    pub instance_id: String,
    /// Where schedules are persisted.
    #[serde(default)]
    pub persistence_store: PersistenceStoreType,
    /// Table prefix used by database-backed stores.
    #[serde(default = "default_table_prefix")]
    pub table_prefix: String,
    /// Whether job data values are stored as string properties.
    #[serde(default)]
    pub use_properties: bool,
    /// Whether completion events are kept in the audit trail.
    #[serde(default = "default_true")]
    pub enable_audit_history: bool,
    /// Whether a status API should be self-hosted.
    #[serde(default = "default_true")]
    pub enable_web_api_self_host: bool,
    /// Base address of the status API.
    #[serde(default = "default_web_api_base_address")]
    pub web_api_base_address: String,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            instance_name: default_instance_name(),
            instance_id: default_instance_id(),
            persistence_store: PersistenceStoreType::default(),
            table_prefix: default_table_prefix(),
            use_properties: false,
            enable_audit_history: true,
            enable_web_api_self_host: true,
            web_api_base_address: default_web_api_base_address(),
        }
    }
}

impl SchedulerConfig {
    /// Build a configuration from the defaults with caller overrides applied.
    ///
    /// ```
    /// use jobhost_core::config::scheduler::SchedulerConfig;
    ///
    /// let config = SchedulerConfig::configure(|c| {
    ///     c.instance_name = "Nightly".to_string();
    ///     c.enable_audit_history = false;
    /// });
    /// assert_eq!(config.instance_id, "instance_one");
    /// ```
    pub fn configure(overrides: impl FnOnce(&mut Self)) -> Self {
        let mut config = Self::default();
        overrides(&mut config);
        config
    }

    /// Reject settings this build cannot honor.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.instance_name.trim().is_empty() {
            return Err(AppError::configuration(
                "scheduler.instance_name must not be empty",
            ));
        }
        if self.persistence_store != PersistenceStoreType::InMemory {
            return Err(AppError::configuration(format!(
                "persistence store '{}' is not available; only 'in_memory' is supported",
                self.persistence_store
            )));
        }
        Ok(())
    }
}

fn default_instance_name() -> String {
    "RScheduler".to_string()
}

fn default_instance_id() -> String {
    "instance_one".to_string()
}

fn default_table_prefix() -> String {
    "QRTZ_".to_string()
}

fn default_web_api_base_address() -> String {
    "http://localhost:5000/".to_string()
}

fn default_true() -> bool {
    true
}
