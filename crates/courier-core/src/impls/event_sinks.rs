//! EventSink implementations.

use std::sync::Mutex;

use crate::domain::events::{ProgressEvent, ProgressPhase};
use crate::ports::EventSink;

/// Writes progress events as structured log lines.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn emit(&self, event: ProgressEvent) {
        let percent = event.percent();
        match &event.phase {
            ProgressPhase::Started => tracing::info!(
                batch_id = %event.batch_id,
                kind = %event.kind,
                total = event.total,
                "batch started"
            ),
            ProgressPhase::Progress => tracing::info!(
                batch_id = %event.batch_id,
                kind = %event.kind,
                processed = event.processed,
                total = event.total,
                percent,
                "batch progress"
            ),
            ProgressPhase::Completed { success: true, .. } => tracing::info!(
                batch_id = %event.batch_id,
                kind = %event.kind,
                processed = event.processed,
                total = event.total,
                "batch completed"
            ),
            ProgressPhase::Completed { success: false, error } => tracing::error!(
                batch_id = %event.batch_id,
                kind = %event.kind,
                processed = event.processed,
                total = event.total,
                error = error.as_deref().unwrap_or("unknown"),
                "batch failed"
            ),
        }
    }
}

/// Keeps every event in memory.
#[derive(Debug, Default)]
pub struct MemoryEventSink {
    events: Mutex<Vec<ProgressEvent>>,
}

impl MemoryEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }
}

impl EventSink for MemoryEventSink {
    fn emit(&self, event: ProgressEvent) {
        self.events
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(event);
    }
}
