//! Event sinks
//!
//! The coordinator and loop never log scheduler events directly; they hand each
//! `EventRecord` to an injected `EventSink`.

use std::sync::Mutex;

use crate::domain::EventRecord;

pub trait EventSink: Send + Sync {
    fn record(&self, event: EventRecord);
}

/// Forwards events to `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl EventSink for LogSink {
    fn record(&self, event: EventRecord) {
        let target = event.target.as_deref().unwrap_or("-");
        let batch_id = event.batch_id.as_deref().unwrap_or("-");
        if event.event_type.ends_with("missed") || event.event_type.ends_with("abandoned") {
            tracing::warn!(
                event_type = %event.event_type,
                target_host = target,
                batch_id,
                payload = %event.payload,
                "Scheduler event"
            );
        } else {
            tracing::info!(
                event_type = %event.event_type,
                target_host = target,
                batch_id,
                payload = %event.payload,
                "Scheduler event"
            );
        }
    }
}

/// Collects events in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<EventRecord>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of everything recorded so far
    pub fn events(&self) -> Vec<EventRecord> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    /// Recorded events of one type
    pub fn of_type(&self, event_type: &str) -> Vec<EventRecord> {
        self.events()
            .into_iter()
            .filter(|e| e.event_type == event_type)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.events.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl EventSink for MemorySink {
    fn record(&self, event: EventRecord) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::event_types;

    #[test]
    fn test_memory_sink_collects_in_order() {
        let sink = MemorySink::new();
        assert!(sink.is_empty());

        sink.record(EventRecord::batch_scheduled("n00dles", "batch-1", "hack", 42));
        sink.record(EventRecord::batch_abandoned("n00dles", "batch-1", "refused"));

        let events = sink.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event_type, event_types::BATCH_SCHEDULED);
        assert_eq!(sink.of_type(event_types::BATCH_ABANDONED).len(), 1);
    }

    #[test]
    fn test_log_sink_accepts_events() {
        let sink = LogSink;
        sink.record(EventRecord::loop_started(&["n00dles".to_string()]));
        sink.record(EventRecord::deadline_missed("n00dles", "too late"));
    }
}
