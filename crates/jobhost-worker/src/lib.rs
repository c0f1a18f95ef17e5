//! Trigger firing and job dispatch for JobHost.
//!
//! This crate provides:
//! - A cron scheduler that fires configured triggers
//! - A job executor that dispatches firings to the handler for their kind
//! - The plugin job handler backed by the isolated plugin host

pub mod executor;
pub mod jobs;
pub mod scheduler;

pub use executor::{JobExecutionError, JobExecutor, JobHandler, ScheduledJob};
pub use jobs::plugin::PluginJobHandler;
pub use scheduler::CronScheduler;
