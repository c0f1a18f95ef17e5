//! In-memory event bus for single-node deployments.

use tokio::sync::broadcast;

use super::{CompletionEvent, EventBus};
use crate::error::AppError;

/// Broadcast-backed event bus.
///
/// Publishing never blocks. Subscribers that fall behind by more than the
/// buffer size lose the oldest events.
#[derive(Debug, Clone)]
pub struct BroadcastEventBus {
    /// Broadcast sender shared by all publishers
    sender: broadcast::Sender<CompletionEvent>,
}

impl BroadcastEventBus {
    /// Create a bus with the given per-subscriber buffer size
    pub fn new(buffer_size: usize) -> Self {
        let (sender, _) = broadcast::channel(buffer_size.max(1));
        Self { sender }
    }

    /// Subscribe to events published from now on
    pub fn subscribe(&self) -> broadcast::Receiver<CompletionEvent> {
        self.sender.subscribe()
    }

    /// Number of live subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for BroadcastEventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

impl EventBus for BroadcastEventBus {
    fn publish(&self, event: CompletionEvent) -> Result<(), AppError> {
        let id = event.id;
        match self.sender.send(event) {
            Ok(delivered) => {
                tracing::debug!(event_id = %id, subscribers = delivered, "Completion event published");
            }
            Err(_) => {
                tracing::debug!(event_id = %id, "Completion event published with no subscribers");
            }
        }
        Ok(())
    }
}
