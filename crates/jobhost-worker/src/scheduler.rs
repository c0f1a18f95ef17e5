//! Cron scheduler that fires configured triggers.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::RwLock;
use tokio_cron_scheduler::{Job as CronJob, JobScheduler};
use tracing;
use uuid::Uuid;

use jobhost_core::error::AppError;
use jobhost_core::types::TriggerConfig;

use crate::executor::{JobExecutor, ScheduledJob};

/// Cron-based scheduler for trigger firings
pub struct CronScheduler {
    /// The underlying job scheduler
    scheduler: JobScheduler,
    /// Executor every firing is dispatched to
    executor: Arc<JobExecutor>,
    /// Scheduler job ids by trigger key
    scheduled: RwLock<HashMap<String, Uuid>>,
}

impl std::fmt::Debug for CronScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CronScheduler").finish()
    }
}

impl CronScheduler {
    /// Create a new cron scheduler
    pub async fn new(executor: Arc<JobExecutor>) -> Result<Self, AppError> {
        let scheduler = JobScheduler::new()
            .await
            .map_err(|e| AppError::scheduler(format!("Failed to create scheduler: {}", e)))?;

        Ok(Self {
            scheduler,
            executor,
            scheduled: RwLock::new(HashMap::new()),
        })
    }

    /// Register a trigger; returns the scheduler's id for it
    pub async fn schedule(&self, trigger: &TriggerConfig) -> Result<Uuid, AppError> {
        trigger.validate()?;
        let key = trigger.key();
        if self.scheduled.read().await.contains_key(&key) {
            return Err(AppError::validation(format!(
                "Trigger '{}' is already scheduled",
                key
            )));
        }

        let executor = Arc::clone(&self.executor);
        let trigger_ref = Arc::new(trigger.clone());
        let job = CronJob::new_async(trigger.cron.as_str(), move |_uuid, _lock| {
            let executor = Arc::clone(&executor);
            let trigger = Arc::clone(&trigger_ref);
            Box::pin(async move {
                let now = Utc::now();
                if !trigger.is_due(now) {
                    tracing::trace!("Trigger '{}' not yet due", trigger.key());
                    return;
                }
                let job = ScheduledJob::from_trigger(&trigger, now);
                match executor.execute(&job).await {
                    Ok(_) => tracing::debug!("Job '{}' finished", job.job_key),
                    Err(e) => tracing::error!("Job '{}' failed: {}", job.job_key, e),
                }
            })
        })
        .map_err(|e| {
            AppError::scheduler(format!("Failed to create schedule for '{}': {}", key, e))
        })?;

        let id = self.scheduler.add(job).await.map_err(|e| {
            AppError::scheduler(format!("Failed to add schedule for '{}': {}", key, e))
        })?;

        tracing::info!(
            "Registered: {} -> {} ({}, kind '{}')",
            key,
            trigger.job_key(),
            trigger.cron,
            trigger.kind
        );
        self.scheduled.write().await.insert(key, id);
        Ok(id)
    }

    /// Remove a trigger; returns whether it was scheduled
    pub async fn unschedule(&self, trigger_key: &str) -> Result<bool, AppError> {
        let Some(id) = self.scheduled.write().await.remove(trigger_key) else {
            return Ok(false);
        };
        self.scheduler.remove(&id).await.map_err(|e| {
            AppError::scheduler(format!("Failed to remove schedule '{}': {}", trigger_key, e))
        })?;

        tracing::info!("Unregistered: {}", trigger_key);
        Ok(true)
    }

    /// Keys of all scheduled triggers
    pub async fn scheduled_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.scheduled.read().await.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Start the scheduler
    pub async fn start(&self) -> Result<(), AppError> {
        self.scheduler
            .start()
            .await
            .map_err(|e| AppError::scheduler(format!("Failed to start scheduler: {}", e)))?;

        tracing::info!("Cron scheduler started");
        Ok(())
    }

    /// Shutdown the scheduler
    pub async fn shutdown(&self) -> Result<(), AppError> {
        let mut scheduler = self.scheduler.clone();
        scheduler
            .shutdown()
            .await
            .map_err(|e| AppError::scheduler(format!("Failed to shutdown scheduler: {}", e)))?;

        tracing::info!("Cron scheduler shut down");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::{JobExecutionError, JobHandler};
    use async_trait::async_trait;
    use serde_json::Value;
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Debug, Default)]
    struct RecordingHandler {
        fired: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl JobHandler for RecordingHandler {
        fn job_type(&self) -> &str {
            "recording"
        }

        async fn execute(&self, job: &ScheduledJob) -> Result<Option<Value>, JobExecutionError> {
            self.fired.lock().unwrap().push(job.trigger_key.clone());
            Ok(None)
        }
    }

    fn trigger(name: &str) -> TriggerConfig {
        let mut trigger = TriggerConfig::plugin(name, "* * * * * *", "/p/lib.so");
        trigger.kind = "recording".to_string();
        trigger
    }

    async fn scheduler() -> (CronScheduler, Arc<RecordingHandler>) {
        let handler = Arc::new(RecordingHandler::default());
        let mut executor = JobExecutor::new();
        executor.register(handler.clone());
        let scheduler = CronScheduler::new(Arc::new(executor)).await.unwrap();
        (scheduler, handler)
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_schedule_and_unschedule() {
        let (scheduler, _) = scheduler().await;
        scheduler.schedule(&trigger("b")).await.unwrap();
        scheduler.schedule(&trigger("a")).await.unwrap();

        let duplicate = scheduler.schedule(&trigger("a")).await.unwrap_err();
        assert!(duplicate.message.contains("already scheduled"));
        assert_eq!(scheduler.scheduled_keys().await, vec!["DEFAULT.a", "DEFAULT.b"]);

        assert!(scheduler.unschedule("DEFAULT.a").await.unwrap());
        assert!(!scheduler.unschedule("DEFAULT.a").await.unwrap());
        assert_eq!(scheduler.scheduled_keys().await, vec!["DEFAULT.b"]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_invalid_cron_is_rejected() {
        let (scheduler, _) = scheduler().await;
        let mut bad = trigger("bad");
        bad.cron = "* * *".to_string();
        assert!(scheduler.schedule(&bad).await.is_err());
        assert!(scheduler.scheduled_keys().await.is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_firing_honors_start_time() {
        let (scheduler, handler) = scheduler().await;
        scheduler.schedule(&trigger("now")).await.unwrap();
        let mut later = trigger("later");
        later.start_at = Some(Utc::now() + chrono::Duration::hours(1));
        scheduler.schedule(&later).await.unwrap();

        scheduler.start().await.unwrap();
        tokio::time::sleep(Duration::from_millis(2500)).await;
        scheduler.shutdown().await.unwrap();

        let fired = handler.fired.lock().unwrap().clone();
        assert!(!fired.is_empty(), "every-second trigger should have fired");
        assert!(fired.iter().all(|key| key == "DEFAULT.now"));
    }
}
