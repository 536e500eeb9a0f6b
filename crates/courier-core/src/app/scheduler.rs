//! Scheduler - per-topic drain loops.
//!
//! Each registered topic gets its own background task:
//! `IDLE -> DRAINING -> DISPATCHING -> IDLE` once per tick, no backoff.
//!
//! Delivery into dispatch is at-most-once. A drained batch whose dispatch
//! fails is retried once, immediately and with the same items, then logged
//! and dropped; it is never pushed back onto the queue.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::app::dispatch::{DispatchReport, DispatcherRegistry, TopicDispatcher};
use crate::app::progress::ProgressTracker;
use crate::domain::ids::BatchId;
use crate::domain::topic::Topic;
use crate::ports::WorkQueue;

pub const DEFAULT_BATCH_SIZE: usize = 50;
pub const DEFAULT_TICK: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Upper bound on items drained per tick (and on in-batch fan-out).
    pub batch_size: usize,
    pub tick: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            tick: DEFAULT_TICK,
        }
    }
}

/// What one drain of one topic did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// Nothing to drain (or no dispatcher for the topic).
    Idle,
    Dispatched {
        batch_id: BatchId,
        report: DispatchReport,
    },
    /// The batch was drained and then dropped after its retry failed, or the
    /// queue itself could not be read.
    Failed {
        batch_id: Option<BatchId>,
        items: usize,
        error: String,
    },
}

impl TickOutcome {
    pub fn is_idle(&self) -> bool {
        matches!(self, TickOutcome::Idle)
    }
}

pub struct Scheduler {
    queue: Arc<dyn WorkQueue>,
    registry: DispatcherRegistry,
    progress: Arc<ProgressTracker>,
    config: SchedulerConfig,
}

impl Scheduler {
    pub fn new(
        queue: Arc<dyn WorkQueue>,
        registry: DispatcherRegistry,
        progress: Arc<ProgressTracker>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            queue,
            registry,
            progress,
            config,
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Drain and dispatch at most one batch of `topic`.
    pub async fn drain_once(&self, topic: Topic) -> TickOutcome {
        let Some(dispatcher) = self.registry.get(topic) else {
            warn!(%topic, "no dispatcher registered");
            return TickOutcome::Idle;
        };

        let items = match self.queue.dequeue_batch(topic, self.config.batch_size).await {
            Ok(items) => items,
            Err(e) => {
                error!(%topic, error = %e, "dequeue failed");
                return TickOutcome::Failed {
                    batch_id: None,
                    items: 0,
                    error: e.to_string(),
                };
            }
        };
        if items.is_empty() {
            return TickOutcome::Idle;
        }

        let count = items.len();
        let batch_id = self.progress.start_batch(topic.batch_kind(), count);
        debug!(%topic, %batch_id, items = count, "batch drained");

        let items = Arc::new(items);
        let mut result = run_dispatch(dispatcher.clone(), batch_id, items.clone()).await;
        if let Err(e) = &result {
            warn!(%topic, %batch_id, items = count, error = %e, "dispatch failed, retrying once");
            result = run_dispatch(dispatcher, batch_id, items).await;
        }

        match result {
            Ok(report) => {
                self.progress.bulk_update(batch_id, report.total());
                self.progress.complete(batch_id, true, None);
                TickOutcome::Dispatched { batch_id, report }
            }
            Err(e) => {
                // 取り出したアイテムはキューに戻さない
                error!(%topic, %batch_id, items = count, error = %e, "batch dropped after retry");
                self.progress.complete(batch_id, false, Some(e.clone()));
                TickOutcome::Failed {
                    batch_id: Some(batch_id),
                    items: count,
                    error: e,
                }
            }
        }
    }

    /// Drain every registered topic until a full pass finds nothing.
    /// Returns the number of batches handled.
    pub async fn drain_until_idle(&self) -> usize {
        let mut handled = 0;
        loop {
            let mut progressed = false;
            for topic in self.registry.topics() {
                if !self.drain_once(topic).await.is_idle() {
                    handled += 1;
                    progressed = true;
                }
            }
            if !progressed {
                return handled;
            }
        }
    }

    /// Start one loop per registered topic.
    pub fn spawn(self: Arc<Self>) -> SchedulerHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let joins = self
            .registry
            .topics()
            .into_iter()
            .map(|topic| {
                let scheduler = Arc::clone(&self);
                let mut rx = shutdown_rx.clone();
                tokio::spawn(async move {
                    topic_loop(scheduler, topic, &mut rx).await;
                })
            })
            .collect();

        info!(
            batch_size = self.config.batch_size,
            tick_ms = self.config.tick.as_millis() as u64,
            "scheduler started"
        );
        SchedulerHandle { shutdown_tx, joins }
    }
}

/// Runs the dispatch on its own task so a panicking dispatcher fails the
/// batch instead of the loop.
async fn run_dispatch(
    dispatcher: Arc<dyn TopicDispatcher>,
    batch_id: BatchId,
    items: Arc<Vec<String>>,
) -> Result<DispatchReport, String> {
    let task = tokio::spawn(async move { dispatcher.dispatch(batch_id, &items).await });
    match task.await {
        Ok(Ok(report)) => Ok(report),
        Ok(Err(e)) => Err(e.to_string()),
        Err(join) => Err(format!("dispatcher aborted: {join}")),
    }
}

async fn topic_loop(scheduler: Arc<Scheduler>, topic: Topic, shutdown_rx: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown_rx.borrow() {
            break;
        }

        tokio::select! {
            changed = shutdown_rx.changed() => {
                // sender dropped
                if changed.is_err() {
                    break;
                }
                continue;
            }
            _ = tokio::time::sleep(scheduler.config.tick) => {}
        }

        // in-flight batch is never interrupted; shutdown is checked between batches
        scheduler.drain_once(topic).await;
    }
    info!(%topic, "scheduler loop stopped");
}

/// Handle to the running loops.
/// - `request_shutdown()` stops the loops after their current batch
/// - `shutdown_and_join()` also waits for them
pub struct SchedulerHandle {
    shutdown_tx: watch::Sender<bool>,
    joins: Vec<JoinHandle<()>>,
}

impl SchedulerHandle {
    pub fn request_shutdown(&self) {
        // ignore send error: loops may already be gone
        let _ = self.shutdown_tx.send(true);
    }

    pub async fn shutdown_and_join(self) {
        self.request_shutdown();
        for join in self.joins {
            let _ = join.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::progress::ProgressConfig;
    use crate::domain::errors::{DispatchError, StoreError};
    use crate::domain::events::ProgressPhase;
    use crate::impls::{InMemoryWorkQueue, MemoryEventSink};
    use crate::ports::{SystemClock, UlidGenerator};
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Records every batch; fails the first `failures` calls; panics on "boom".
    #[derive(Default)]
    struct ScriptedDispatcher {
        failures: usize,
        calls: AtomicUsize,
        seen: Mutex<Vec<Vec<String>>>,
    }

    impl ScriptedDispatcher {
        fn failing(failures: usize) -> Self {
            Self {
                failures,
                ..Self::default()
            }
        }
    }

    #[async_trait]
    impl TopicDispatcher for ScriptedDispatcher {
        fn topic(&self) -> Topic {
            Topic::Receipts
        }

        async fn dispatch(&self, _: BatchId, items: &[String]) -> Result<DispatchReport, DispatchError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen.lock().unwrap().push(items.to_vec());
            if items.iter().any(|i| i == "boom") {
                panic!("boom");
            }
            if call < self.failures {
                return Err(StoreError::Unavailable("flaky".into()).into());
            }
            Ok(DispatchReport {
                processed: items.len(),
                skipped: 0,
            })
        }
    }

    fn scheduler(
        dispatcher: Arc<ScriptedDispatcher>,
        batch_size: usize,
    ) -> (Arc<Scheduler>, Arc<InMemoryWorkQueue>, Arc<MemoryEventSink>) {
        let queue = Arc::new(InMemoryWorkQueue::new());
        let events = Arc::new(MemoryEventSink::new());
        let progress = Arc::new(ProgressTracker::new(
            ProgressConfig::default(),
            events.clone(),
            Arc::new(UlidGenerator::new(SystemClock)),
            Arc::new(SystemClock),
        ));
        let mut registry = DispatcherRegistry::new();
        registry.register(dispatcher).unwrap();

        let config = SchedulerConfig {
            batch_size,
            ..SchedulerConfig::default()
        };
        (
            Arc::new(Scheduler::new(queue.clone(), registry, progress, config)),
            queue,
            events,
        )
    }

    async fn fill(queue: &InMemoryWorkQueue, n: usize) {
        for i in 0..n {
            queue.enqueue(Topic::Receipts, format!("r{i}")).await.unwrap();
        }
    }

    #[tokio::test]
    async fn drains_at_most_batch_size_in_fifo_order() {
        let dispatcher = Arc::new(ScriptedDispatcher::default());
        let (scheduler, queue, _) = scheduler(dispatcher.clone(), 3);
        fill(&queue, 5).await;

        let outcome = scheduler.drain_once(Topic::Receipts).await;
        assert!(matches!(
            outcome,
            TickOutcome::Dispatched { report: DispatchReport { processed: 3, skipped: 0 }, .. }
        ));
        assert_eq!(dispatcher.seen.lock().unwrap()[0], vec!["r0", "r1", "r2"]);
        assert_eq!(queue.len(Topic::Receipts).await.unwrap(), 2);

        assert!(scheduler.drain_once(Topic::MessageBatches).await.is_idle());
    }

    #[tokio::test]
    async fn failed_dispatch_is_retried_once_with_the_same_items() {
        let dispatcher = Arc::new(ScriptedDispatcher::failing(1));
        let (scheduler, queue, _) = scheduler(dispatcher.clone(), 10);
        fill(&queue, 2).await;

        let outcome = scheduler.drain_once(Topic::Receipts).await;
        assert!(matches!(outcome, TickOutcome::Dispatched { .. }));

        let seen = dispatcher.seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0], seen[1]);
    }

    #[tokio::test]
    async fn batch_failing_twice_is_dropped_not_requeued() {
        let dispatcher = Arc::new(ScriptedDispatcher::failing(usize::MAX));
        let (scheduler, queue, events) = scheduler(dispatcher.clone(), 10);
        fill(&queue, 4).await;

        let outcome = scheduler.drain_once(Topic::Receipts).await;
        assert!(matches!(outcome, TickOutcome::Failed { items: 4, batch_id: Some(_), .. }));
        assert_eq!(dispatcher.calls.load(Ordering::SeqCst), 2);
        assert_eq!(queue.len(Topic::Receipts).await.unwrap(), 0);

        let last = events.events().pop().unwrap();
        assert!(last.is_completion());
        assert!(matches!(
            last.phase,
            ProgressPhase::Completed { success: false, .. }
        ));
    }

    #[tokio::test]
    async fn panicking_dispatcher_fails_the_batch_only() {
        let dispatcher = Arc::new(ScriptedDispatcher::default());
        let (scheduler, queue, _) = scheduler(dispatcher.clone(), 1);
        queue.enqueue(Topic::Receipts, "boom".into()).await.unwrap();
        queue.enqueue(Topic::Receipts, "fine".into()).await.unwrap();

        assert!(matches!(
            scheduler.drain_once(Topic::Receipts).await,
            TickOutcome::Failed { items: 1, .. }
        ));
        assert!(matches!(
            scheduler.drain_once(Topic::Receipts).await,
            TickOutcome::Dispatched { .. }
        ));
    }

    #[tokio::test]
    async fn drain_until_idle_empties_the_queue() {
        let dispatcher = Arc::new(ScriptedDispatcher::default());
        let (scheduler, queue, _) = scheduler(dispatcher.clone(), 2);
        fill(&queue, 5).await;

        assert_eq!(scheduler.drain_until_idle().await, 3);
        assert_eq!(queue.len(Topic::Receipts).await.unwrap(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn loop_drains_on_each_tick_until_shutdown() {
        let dispatcher = Arc::new(ScriptedDispatcher::default());
        let (scheduler, queue, _) = scheduler(dispatcher.clone(), 2);
        fill(&queue, 3).await;

        let handle = scheduler.clone().spawn();

        tokio::time::sleep(Duration::from_millis(5_100)).await;
        assert_eq!(queue.len(Topic::Receipts).await.unwrap(), 1);

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(queue.len(Topic::Receipts).await.unwrap(), 0);

        handle.shutdown_and_join().await;

        // stopped loops leave new work alone
        fill(&queue, 1).await;
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(queue.len(Topic::Receipts).await.unwrap(), 1);
        assert_eq!(dispatcher.calls.load(Ordering::SeqCst), 2);
    }
}
