//! Dispatches trigger firings to the handler registered for their kind.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing;
use uuid::Uuid;

use jobhost_core::error::AppError;
use jobhost_core::types::{JobDataMap, TriggerConfig};

/// One firing of a trigger, as handed to a job handler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduledJob {
    /// Unique id of this firing
    pub id: Uuid,
    /// `group.name` of the trigger that fired
    pub trigger_key: String,
    /// `group.name` of the job
    pub job_key: String,
    /// Job kind, used to pick the handler
    pub job_type: String,
    /// Job descriptor; handlers read it and never modify it
    pub data: JobDataMap,
    /// When the trigger fired
    pub fired_at: DateTime<Utc>,
}

impl ScheduledJob {
    /// Build the firing of `trigger` at `fired_at`
    pub fn from_trigger(trigger: &TriggerConfig, fired_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::now_v7(),
            trigger_key: trigger.key(),
            job_key: trigger.job_key(),
            job_type: trigger.kind.clone(),
            data: trigger.data.clone(),
            fired_at,
        }
    }
}

/// Runs firings of one job kind.
#[async_trait]
pub trait JobHandler: Send + Sync + std::fmt::Debug {
    /// Kind string this handler is registered under
    fn job_type(&self) -> &str;

    async fn execute(&self, job: &ScheduledJob) -> Result<Option<Value>, JobExecutionError>;
}

/// Why a firing did not complete
#[derive(Debug, thiserror::Error)]
pub enum JobExecutionError {
    /// Firing failed and running it again would fail the same way
    #[error("Permanent job failure: {0}")]
    Permanent(String),

    /// Firing failed but a later firing may succeed
    #[error("Transient job failure: {0}")]
    Transient(String),

    #[error("Internal error: {0}")]
    Internal(#[from] AppError),
}

/// Routes each firing to the handler for its kind.
#[derive(Debug, Default)]
pub struct JobExecutor {
    handlers: HashMap<String, Arc<dyn JobHandler>>,
}

impl JobExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` for its kind. A later registration for the same
    /// kind replaces the earlier one.
    pub fn register(&mut self, handler: Arc<dyn JobHandler>) {
        let job_type = handler.job_type().to_string();
        if self.handlers.insert(job_type.clone(), handler).is_some() {
            tracing::warn!(job_type = %job_type, "Replaced existing job handler");
        } else {
            tracing::info!(job_type = %job_type, "Registered job handler");
        }
    }

    /// Runs `job` on its handler. Unknown kinds are a permanent failure.
    pub async fn execute(&self, job: &ScheduledJob) -> Result<Option<Value>, JobExecutionError> {
        let Some(handler) = self.handlers.get(&job.job_type) else {
            return Err(JobExecutionError::Permanent(format!(
                "No handler registered for job type '{}'",
                job.job_type
            )));
        };

        tracing::info!(
            firing = %job.id,
            job = %job.job_key,
            trigger = %job.trigger_key,
            job_type = %job.job_type,
            "Executing job"
        );
        let started = Instant::now();
        let result = handler.execute(job).await;
        tracing::debug!(
            firing = %job.id,
            elapsed_ms = started.elapsed().as_millis() as u64,
            ok = result.is_ok(),
            "Job handler returned"
        );
        result
    }

    pub fn has_handler(&self, job_type: &str) -> bool {
        self.handlers.contains_key(job_type)
    }

    /// Registered kinds, sorted
    pub fn registered_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.handlers.keys().cloned().collect();
        types.sort();
        types
    }
}
