//! Trigger definitions: when a job fires and what it receives.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::job_data::JobDataMap;
use crate::error::AppError;

/// Job kind executed by the isolated plugin host.
pub const PLUGIN_JOB_KIND: &str = "plugin";

/// A cron trigger bound to one job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerConfig {
    /// Trigger name.
    pub name: String,
    /// Trigger group.
    #[serde(default = "default_group")]
    pub group: String,
    /// Name of the job this trigger fires.
    pub job_name: String,
    /// Group of the job this trigger fires.
    #[serde(default = "default_group")]
    pub job_group: String,
    /// Job kind used to pick a handler.
    #[serde(default = "default_kind")]
    pub kind: String,
    /// Six-field cron expression (seconds first).
    pub cron: String,
    /// Firings before this instant are skipped.
    #[serde(default)]
    pub start_at: Option<DateTime<Utc>>,
    /// Data handed to the job on every firing.
    #[serde(default)]
    pub data: JobDataMap,
}

impl TriggerConfig {
    /// Creates a plugin trigger with default groups.
    pub fn plugin(name: &str, cron: &str, plugin_path: &str) -> Self {
        Self {
            name: name.to_string(),
            group: default_group(),
            job_name: name.to_string(),
            job_group: default_group(),
            kind: default_kind(),
            cron: cron.to_string(),
            start_at: None,
            data: JobDataMap::new().with(super::job_data::PLUGIN_PATH_KEY, plugin_path),
        }
    }

    /// `group.name` of the trigger.
    pub fn key(&self) -> String {
        format!("{}.{}", self.group, self.name)
    }

    /// `group.name` of the job.
    pub fn job_key(&self) -> String {
        format!("{}.{}", self.job_group, self.job_name)
    }

    /// Whether a firing at `now` should run the job.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.start_at.is_none_or(|start| now >= start)
    }

    /// Basic shape checks; cron syntax is checked by the scheduler.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.name.trim().is_empty() || self.job_name.trim().is_empty() {
            return Err(AppError::validation(
                "trigger name and job name must not be empty",
            ));
        }
        if self.cron.split_whitespace().count() < 6 {
            return Err(AppError::validation(format!(
                "trigger '{}' cron expression '{}' needs at least six fields",
                self.key(),
                self.cron
            )));
        }
        Ok(())
    }
}

fn default_group() -> String {
    "DEFAULT".to_string()
}

fn default_kind() -> String {
    PLUGIN_JOB_KIND.to_string()
}
