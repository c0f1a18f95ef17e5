//! Audit history of published completion events.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use super::{CompletionEvent, EventBus};
use crate::error::AppError;

/// Bounded record of the most recent completion events.
#[derive(Debug)]
pub struct AuditTrail {
    entries: Mutex<VecDeque<CompletionEvent>>,
    capacity: usize,
}

impl AuditTrail {
    /// Create a trail holding at most `capacity` events.
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity.min(1024))),
            capacity: capacity.max(1),
        }
    }

    /// Append an event, evicting the oldest when full.
    pub fn record(&self, event: &CompletionEvent) {
        let mut entries = self.entries.lock().unwrap_or_else(|p| p.into_inner());
        if entries.len() == self.capacity {
            entries.pop_front();
        }
        entries.push_back(event.clone());
    }

    /// Snapshot, oldest first.
    pub fn entries(&self) -> Vec<CompletionEvent> {
        let entries = self.entries.lock().unwrap_or_else(|p| p.into_inner());
        entries.iter().cloned().collect()
    }

    /// Number of failed executions currently in the trail.
    pub fn failure_count(&self) -> usize {
        let entries = self.entries.lock().unwrap_or_else(|p| p.into_inner());
        entries.iter().filter(|e| !e.success).count()
    }
}

/// Event bus decorator that records every event before forwarding it.
#[derive(Debug)]
pub struct AuditedEventBus {
    inner: Arc<dyn EventBus>,
    trail: Arc<AuditTrail>,
}

impl AuditedEventBus {
    /// Wrap `inner`, recording into `trail`.
    pub fn new(inner: Arc<dyn EventBus>, trail: Arc<AuditTrail>) -> Self {
        Self { inner, trail }
    }
}

impl EventBus for AuditedEventBus {
    fn publish(&self, event: CompletionEvent) -> Result<(), AppError> {
        self.trail.record(&event);
        self.inner.publish(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::BroadcastEventBus;
    use chrono::Utc;

    #[test]
    fn test_trail_evicts_oldest() {
        let trail = AuditTrail::new(2);
        let now = Utc::now();
        let a = CompletionEvent::new(true, now, "A");
        let b = CompletionEvent::new(false, now, "B");
        let c = CompletionEvent::new(true, now, "C");
        trail.record(&a);
        trail.record(&b);
        trail.record(&c);

        let names: Vec<_> = trail.entries().into_iter().map(|e| e.job_type).collect();
        assert_eq!(names, vec!["B", "C"]);
        assert_eq!(trail.failure_count(), 1);
    }

    #[test]
    fn test_audited_bus_records_and_forwards() {
        let inner = BroadcastEventBus::new(4);
        let mut rx = inner.subscribe();
        let trail = Arc::new(AuditTrail::new(10));
        let bus = AuditedEventBus::new(Arc::new(inner), Arc::clone(&trail));

        let event = CompletionEvent::new(true, Utc::now(), "x::Y");
        bus.publish(event.clone()).unwrap();

        assert_eq!(trail.entries(), vec![event.clone()]);
        assert_eq!(rx.try_recv().unwrap(), event);
    }
}
