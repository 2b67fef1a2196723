//! EventSink 実装
//!
//! - **NoopEventSink**: 何もしない（デフォルト）
//! - **MemoryEventSink**: メモリに溜める（テスト・CLI のレポート用）
//! - **TracingEventSink**: tracing の debug ログとして出す

use std::sync::{Mutex, PoisonError};

use crate::domain::{DomainEvent, TaskKey};
use crate::ports::EventSink;

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopEventSink;

impl EventSink for NoopEventSink {
    fn emit(&self, _event: DomainEvent) {}
}

#[derive(Debug, Default)]
pub struct MemoryEventSink {
    events: Mutex<Vec<DomainEvent>>,
}

impl MemoryEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything emitted so far, in order.
    pub fn events(&self) -> Vec<DomainEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn events_for(&self, key: &TaskKey) -> Vec<DomainEvent> {
        self.events()
            .into_iter()
            .filter(|e| e.key() == key)
            .collect()
    }

    pub fn count(&self, name: &str) -> usize {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|e| e.name() == name)
            .count()
    }
}

impl EventSink for MemoryEventSink {
    fn emit(&self, event: DomainEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn emit(&self, event: DomainEvent) {
        tracing::debug!(event = event.name(), task = %event.key(), ?event, "domain event");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_sink_keeps_order_and_filters() {
        let sink = MemoryEventSink::new();
        let a = TaskKey::new("app1", "a");
        let b = TaskKey::new("app1", "b");

        sink.emit(DomainEvent::OptionsUpdated { key: a.clone() });
        sink.emit(DomainEvent::OptionsUpdated { key: b.clone() });
        sink.emit(DomainEvent::OptionsUpdated { key: a.clone() });

        assert_eq!(sink.events().len(), 3);
        assert_eq!(sink.events_for(&a).len(), 2);
        assert_eq!(sink.count("options_updated"), 3);
        assert_eq!(sink.events()[1].key(), &b);
    }
}
