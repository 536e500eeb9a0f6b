//! EventSink port - progress event output.

use crate::domain::events::ProgressEvent;

/// EventSink records progress events.
///
/// # Implementations
/// - `TracingEventSink`: structured log lines (default)
/// - `MemoryEventSink`: collects events for assertions
///
/// Emission is synchronous and must not block: the tracker calls it while
/// holding its own lock.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: ProgressEvent);
}
