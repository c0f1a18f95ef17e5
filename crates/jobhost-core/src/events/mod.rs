//! Completion events and the event bus they are published on.
//!
//! Every plugin invocation that resolves an entry type ends with exactly
//! one [`CompletionEvent`] handed to an [`EventBus`]. Once published the
//! event belongs to the bus.

pub mod audit;
pub mod bus;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;

pub use audit::{AuditTrail, AuditedEventBus};
pub use bus::BroadcastEventBus;

/// Message describing the outcome of one job execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionEvent {
    /// Unique event ID, freshly generated per event.
    pub id: Uuid,
    /// Whether the job completed without a fault.
    pub success: bool,
    /// When the outcome was recorded.
    pub timestamp: DateTime<Utc>,
    /// Fully qualified name of the executed entry type.
    #[serde(rename = "type")]
    pub job_type: String,
}

impl CompletionEvent {
    /// Create an event with a new ID.
    pub fn new(success: bool, timestamp: DateTime<Utc>, job_type: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            success,
            timestamp,
            job_type: job_type.into(),
        }
    }
}

/// Capability to publish completion events.
///
/// Implementations must be callable from many threads at once; publishing
/// is synchronous and fire-and-forget from the caller's perspective.
pub trait EventBus: Send + Sync + std::fmt::Debug {
    /// Publish an event. Delivery guarantees belong to the bus.
    fn publish(&self, event: CompletionEvent) -> Result<(), AppError>;
}
