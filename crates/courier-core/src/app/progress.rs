//! ProgressTracker - registry of in-flight batch operations.
//!
//! Observability only: nothing in the pipeline reads progress to make a
//! decision. The contract is the event shape (start, progress, complete with
//! counts) and the throttle: at most one event per `min_emit_interval` per
//! batch, except completion, which is always emitted.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;

use crate::domain::events::{BatchKind, ProgressEvent, ProgressPhase};
use crate::domain::ids::BatchId;
use crate::ports::{Clock, EventSink, IdGenerator};

pub const DEFAULT_MIN_EMIT_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy)]
pub struct ProgressConfig {
    pub min_emit_interval: Duration,
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            min_emit_interval: DEFAULT_MIN_EMIT_INTERVAL,
        }
    }
}

struct BatchState {
    kind: BatchKind,
    total: usize,
    processed: usize,
    last_emit: Instant,
}

/// Point-in-time view of one in-flight batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchSnapshot {
    pub batch_id: BatchId,
    pub kind: BatchKind,
    pub total: usize,
    pub processed: usize,
}

pub struct ProgressTracker {
    config: ProgressConfig,
    sink: Arc<dyn EventSink>,
    ids: Arc<dyn IdGenerator>,
    clock: Arc<dyn Clock>,
    batches: Mutex<HashMap<BatchId, BatchState>>,
}

impl ProgressTracker {
    pub fn new(
        config: ProgressConfig,
        sink: Arc<dyn EventSink>,
        ids: Arc<dyn IdGenerator>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            config,
            sink,
            ids,
            clock,
            batches: Mutex::new(HashMap::new()),
        }
    }

    pub fn start_batch(&self, kind: BatchKind, total: usize) -> BatchId {
        let batch_id = self.ids.generate_batch_id();
        let state = BatchState {
            kind,
            total,
            processed: 0,
            last_emit: Instant::now(),
        };

        let mut batches = self.lock();
        self.emit(batch_id, &state, ProgressPhase::Started);
        batches.insert(batch_id, state);
        batch_id
    }

    /// Add `delta` processed items.
    pub fn update(&self, batch_id: BatchId, delta: usize) {
        self.advance(batch_id, |processed| processed.saturating_add(delta));
    }

    /// Set the absolute processed count.
    pub fn bulk_update(&self, batch_id: BatchId, processed: usize) {
        self.advance(batch_id, |_| processed);
    }

    /// Finish a batch. The completion event bypasses the throttle. Completing
    /// an unknown or already completed batch is a no-op.
    pub fn complete(&self, batch_id: BatchId, success: bool, error: Option<String>) {
        let mut batches = self.lock();
        let Some(state) = batches.remove(&batch_id) else {
            return;
        };
        self.emit(batch_id, &state, ProgressPhase::Completed { success, error });
    }

    pub fn snapshot(&self, batch_id: BatchId) -> Option<BatchSnapshot> {
        self.lock().get(&batch_id).map(|state| snapshot(batch_id, state))
    }

    /// All batches started and not yet completed.
    pub fn in_flight(&self) -> Vec<BatchSnapshot> {
        let mut out: Vec<_> = self
            .lock()
            .iter()
            .map(|(id, state)| snapshot(*id, state))
            .collect();
        out.sort_by_key(|s| s.batch_id);
        out
    }

    fn advance(&self, batch_id: BatchId, next: impl FnOnce(usize) -> usize) {
        let mut batches = self.lock();
        let Some(state) = batches.get_mut(&batch_id) else {
            return;
        };
        state.processed = next(state.processed);

        let now = Instant::now();
        if now.duration_since(state.last_emit) >= self.config.min_emit_interval {
            state.last_emit = now;
            self.emit(batch_id, state, ProgressPhase::Progress);
        }
    }

    fn emit(&self, batch_id: BatchId, state: &BatchState, phase: ProgressPhase) {
        self.sink.emit(ProgressEvent {
            batch_id,
            kind: state.kind,
            total: state.total,
            processed: state.processed,
            phase,
            at: self.clock.now(),
        });
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<BatchId, BatchState>> {
        self.batches.lock().unwrap_or_else(|p| p.into_inner())
    }
}

fn snapshot(batch_id: BatchId, state: &BatchState) -> BatchSnapshot {
    BatchSnapshot {
        batch_id,
        kind: state.kind,
        total: state.total,
        processed: state.processed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::impls::MemoryEventSink;
    use crate::ports::{SystemClock, UlidGenerator};

    fn tracker() -> (ProgressTracker, Arc<MemoryEventSink>) {
        let sink = Arc::new(MemoryEventSink::new());
        let tracker = ProgressTracker::new(
            ProgressConfig::default(),
            sink.clone(),
            Arc::new(UlidGenerator::new(SystemClock)),
            Arc::new(SystemClock),
        );
        (tracker, sink)
    }

    fn phases(sink: &MemoryEventSink) -> Vec<ProgressPhase> {
        sink.events().into_iter().map(|e| e.phase).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn updates_are_throttled_to_one_per_interval() {
        let (tracker, sink) = tracker();
        let id = tracker.start_batch(BatchKind::Receipts, 100);

        for _ in 0..10 {
            tracker.update(id, 1);
        }
        assert_eq!(phases(&sink), vec![ProgressPhase::Started]);

        tokio::time::advance(Duration::from_millis(1_000)).await;
        tracker.update(id, 1);
        tracker.update(id, 1);

        let events = sink.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].phase, ProgressPhase::Progress);
        assert_eq!(events[1].processed, 11);
        assert_eq!(tracker.snapshot(id).unwrap().processed, 12);
    }

    #[tokio::test(start_paused = true)]
    async fn completion_is_always_emitted() {
        let (tracker, sink) = tracker();
        let id = tracker.start_batch(BatchKind::Messages, 3);
        tracker.bulk_update(id, 3);
        tracker.complete(id, false, Some("store down".into()));

        let events = sink.events();
        assert_eq!(events.len(), 2);
        let last = events.last().unwrap();
        assert!(last.is_completion());
        assert_eq!(last.processed, 3);
        assert_eq!(
            last.phase,
            ProgressPhase::Completed {
                success: false,
                error: Some("store down".into())
            }
        );
    }

    #[tokio::test]
    async fn completed_batches_leave_the_registry() {
        let (tracker, sink) = tracker();
        let a = tracker.start_batch(BatchKind::Receipts, 1);
        let b = tracker.start_batch(BatchKind::Campaign, 2);
        assert_eq!(tracker.in_flight().len(), 2);

        tracker.complete(a, true, None);
        tracker.complete(a, true, None);
        tracker.update(a, 1);

        let in_flight = tracker.in_flight();
        assert_eq!(in_flight.len(), 1);
        assert_eq!(in_flight[0].batch_id, b);
        assert_eq!(sink.events().iter().filter(|e| e.is_completion()).count(), 1);
    }
}
