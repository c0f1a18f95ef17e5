//! Publishes execution outcomes.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, error};

use jobhost_core::events::{CompletionEvent, EventBus};

/// Outcome of one plugin invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionOutcome {
    /// Whether the entry operation completed without a fault.
    pub success: bool,
    /// Resolved entry type name.
    pub plugin_type_name: String,
    /// When the outcome was recorded.
    pub timestamp: DateTime<Utc>,
}

impl ExecutionOutcome {
    /// Outcome stamped with the current time.
    pub fn now(success: bool, plugin_type_name: impl Into<String>) -> Self {
        Self {
            success,
            plugin_type_name: plugin_type_name.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Turns outcomes into completion events on the bus.
#[derive(Debug, Clone)]
pub struct ResultReporter {
    bus: Arc<dyn EventBus>,
}

impl ResultReporter {
    /// Creates a reporter publishing on `bus`.
    pub fn new(bus: Arc<dyn EventBus>) -> Self {
        Self { bus }
    }

    /// Publishes one event for `outcome`.
    ///
    /// Publish failures are logged and dropped; the bus owns delivery.
    pub fn report(&self, outcome: ExecutionOutcome) {
        let event = CompletionEvent::new(outcome.success, outcome.timestamp, outcome.plugin_type_name);
        let id = event.id;
        match self.bus.publish(event) {
            Ok(()) => debug!(event_id = %id, success = outcome.success, "Completion event published"),
            Err(e) => error!(event_id = %id, error = %e, "Failed to publish completion event"),
        }
    }
}
