//! Plugin job handler.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing;

use jobhost_core::error::AppError;
use jobhost_core::types::PLUGIN_JOB_KIND;
use jobhost_plugin::PluginRunner;

use crate::executor::{JobExecutionError, JobHandler, ScheduledJob};

/// Runs plugin-kind jobs in an isolated context.
///
/// The runner blocks, so every firing gets a thread from the blocking
/// pool and the scheduler's own tasks keep running.
#[derive(Debug)]
pub struct PluginJobHandler {
    /// Isolated plugin host
    runner: Arc<PluginRunner>,
}

impl PluginJobHandler {
    /// Create a new plugin job handler
    pub fn new(runner: Arc<PluginRunner>) -> Self {
        Self { runner }
    }
}

#[async_trait]
impl JobHandler for PluginJobHandler {
    fn job_type(&self) -> &str {
        PLUGIN_JOB_KIND
    }

    async fn execute(&self, job: &ScheduledJob) -> Result<Option<Value>, JobExecutionError> {
        let runner = Arc::clone(&self.runner);
        let data = job.data.clone();

        let result = tokio::task::spawn_blocking(move || runner.execute(&data))
            .await
            .map_err(|e| AppError::internal(format!("Plugin job task failed: {e}")))?;

        result.map_err(|e| {
            tracing::error!(job = %job.job_key, error = %e, "Plugin host fault");
            JobExecutionError::Permanent(e.to_string())
        })?;

        Ok(None)
    }
}
