//! VendorClient - simulated send vendor with a micro-batching receipt buffer.
//!
//! `send` answers immediately with the decided status and appends a receipt
//! to the buffer. The buffer is flushed to the `ReceiptSink` when it reaches
//! `batch_capacity` or `idle_flush` after its first unflushed receipt,
//! whichever comes first.
//!
//! # Buffer rules
//! - the buffer lock is never held across an await
//! - a flush takes the whole buffer in one locked step, so a receipt lands in
//!   exactly one flush
//! - every take bumps `generation`; an idle timer armed for an older
//!   generation finds nothing to do
//! - a non-empty take counts as in flight until its statistics are written;
//!   `reset_stats` waits for the count to reach zero

use std::collections::{BTreeMap, HashMap};
use std::mem;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::Notify;
use tracing::{debug, error, warn};

use crate::app::progress::ProgressTracker;
use crate::domain::errors::VendorError;
use crate::domain::events::BatchKind;
use crate::domain::ids::SendId;
use crate::domain::message::SendRequest;
use crate::domain::receipt::{DeliveryReceipt, DeliveryStatus};
use crate::impls::WeightedRandomOutcome;
use crate::ports::{Clock, DeliveryOutcome, ReceiptSink};

pub const DEFAULT_SUCCESS_PROBABILITY: f64 = 0.9;
pub const DEFAULT_BATCH_CAPACITY: usize = 50;
pub const DEFAULT_IDLE_FLUSH: Duration = Duration::from_secs(1);
pub const DEFAULT_SEND_LATENCY: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VendorConfig {
    pub success_probability: f64,
    pub batch_capacity: usize,
    pub idle_flush: Duration,
    /// Simulated network latency per send. Zero disables the sleep.
    pub send_latency: Duration,
    pub seed: Option<u64>,
}

impl Default for VendorConfig {
    fn default() -> Self {
        Self {
            success_probability: DEFAULT_SUCCESS_PROBABILITY,
            batch_capacity: DEFAULT_BATCH_CAPACITY,
            idle_flush: DEFAULT_IDLE_FLUSH,
            send_latency: DEFAULT_SEND_LATENCY,
            seed: None,
        }
    }
}

impl VendorConfig {
    /// The weighted outcome strategy this config describes.
    pub fn outcome(&self) -> WeightedRandomOutcome {
        match self.seed {
            Some(seed) => WeightedRandomOutcome::seeded(self.success_probability, seed),
            None => WeightedRandomOutcome::new(self.success_probability),
        }
    }
}

/// Synchronous answer to one send.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendAck {
    pub status: DeliveryStatus,
    pub customer_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub send_id: Option<SendId>,
}

/// Per-campaign counters, updated on every flush.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CampaignStats {
    pub total: u64,
    pub batches: u64,
    pub sent: u64,
    pub failed: u64,
}

#[derive(Default)]
struct BufferState {
    pending: Vec<DeliveryReceipt>,
    generation: u64,
    timer_armed: bool,
    in_flight: usize,
}

impl BufferState {
    fn take(&mut self) -> Vec<DeliveryReceipt> {
        self.generation = self.generation.wrapping_add(1);
        self.timer_armed = false;
        if !self.pending.is_empty() {
            self.in_flight += 1;
        }
        mem::take(&mut self.pending)
    }
}

struct Inner {
    config: VendorConfig,
    outcome: Arc<dyn DeliveryOutcome>,
    sink: Arc<dyn ReceiptSink>,
    clock: Arc<dyn Clock>,
    progress: Option<Arc<ProgressTracker>>,
    buffer: Mutex<BufferState>,
    stats: Mutex<HashMap<String, CampaignStats>>,
    flights_done: Notify,
}

/// Cheap to clone; clones share the buffer and the statistics.
#[derive(Clone)]
pub struct VendorClient {
    inner: Arc<Inner>,
}

impl VendorClient {
    pub fn new(
        config: VendorConfig,
        outcome: Arc<dyn DeliveryOutcome>,
        sink: Arc<dyn ReceiptSink>,
        clock: Arc<dyn Clock>,
        progress: Option<Arc<ProgressTracker>>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                outcome,
                sink,
                clock,
                progress,
                buffer: Mutex::new(BufferState::default()),
                stats: Mutex::new(HashMap::new()),
                flights_done: Notify::new(),
            }),
        }
    }

    pub fn config(&self) -> &VendorConfig {
        &self.inner.config
    }

    pub async fn send(&self, request: SendRequest) -> SendAck {
        let status = self.inner.outcome.decide(&request);

        let latency = self.inner.config.send_latency;
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        let ack = SendAck {
            status: status.clone(),
            customer_id: request.customer_id.clone(),
            send_id: request.send_id,
        };
        self.buffer_receipt(DeliveryReceipt {
            customer_id: request.customer_id,
            message: request.message,
            status,
            timestamp: self.inner.clock.now(),
            campaign_id: request.campaign_id,
            image_url: None,
            send_id: request.send_id,
        })
        .await;
        ack
    }

    /// Flush whatever is buffered right now. Returns the number of receipts
    /// delivered (0 for an empty buffer).
    pub async fn flush_now(&self) -> Result<usize, VendorError> {
        let receipts = self.lock_buffer().take();
        if receipts.is_empty() {
            return Ok(0);
        }
        self.deliver(receipts).await
    }

    /// Flush the buffer, wait for flushes already under way, then start
    /// statistics from zero.
    ///
    /// Called when a new campaign run starts, so receipts of the previous run
    /// are attributed before the counters are dropped.
    pub async fn reset_stats(&self) -> Result<usize, VendorError> {
        let flushed = self.flush_now().await;
        self.wait_for_flights().await;
        self.lock_stats().clear();
        flushed
    }

    async fn wait_for_flights(&self) {
        loop {
            let notified = self.inner.flights_done.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.lock_buffer().in_flight == 0 {
                return;
            }
            notified.await;
        }
    }

    pub fn campaign_stats(&self, campaign_id: &str) -> Option<CampaignStats> {
        self.lock_stats().get(campaign_id).copied()
    }

    pub fn all_stats(&self) -> BTreeMap<String, CampaignStats> {
        self.lock_stats()
            .iter()
            .map(|(id, stats)| (id.clone(), *stats))
            .collect()
    }

    /// Receipts waiting for the next flush.
    pub fn buffered(&self) -> usize {
        self.lock_buffer().pending.len()
    }

    async fn buffer_receipt(&self, receipt: DeliveryReceipt) {
        let full = {
            let mut buffer = self.lock_buffer();
            buffer.pending.push(receipt);

            if buffer.pending.len() >= self.inner.config.batch_capacity {
                Some(buffer.take())
            } else {
                if !buffer.timer_armed {
                    buffer.timer_armed = true;
                    self.arm_idle_timer(buffer.generation);
                }
                None
            }
        };

        if let Some(receipts) = full {
            // failures are already counted and logged in deliver
            let _ = self.deliver(receipts).await;
        }
    }

    fn arm_idle_timer(&self, generation: u64) {
        let client = self.clone();
        let idle = self.inner.config.idle_flush;

        tokio::spawn(async move {
            tokio::time::sleep(idle).await;

            let receipts = {
                let mut buffer = client.lock_buffer();
                if buffer.generation != generation || buffer.pending.is_empty() {
                    return;
                }
                buffer.take()
            };
            let _ = client.deliver(receipts).await;
        });
    }

    /// Sends one taken batch. The caller's `take` registered it as in flight.
    async fn deliver(&self, receipts: Vec<DeliveryReceipt>) -> Result<usize, VendorError> {
        let flight = Flight(self);
        let count = receipts.len();
        let tally = tally(&receipts);
        let batch_id = self
            .inner
            .progress
            .as_ref()
            .map(|p| (p, p.start_batch(BatchKind::ReceiptFlush, count)));

        let result = self.inner.sink.deliver(receipts).await;

        {
            let mut stats = self.lock_stats();
            for (campaign_id, delta) in &tally {
                let entry = stats.entry(campaign_id.clone()).or_default();
                entry.total += delta.total;
                entry.batches += 1;
                if result.is_ok() {
                    entry.sent += delta.sent;
                    entry.failed += delta.failed;
                } else {
                    entry.failed += delta.total;
                }
            }
        }
        drop(flight);

        match &result {
            Ok(()) => debug!(receipts = count, "receipt buffer flushed"),
            Err(e) => error!(
                receipts = count,
                error = %e,
                "receipt flush failed, receipts counted as failed"
            ),
        }

        if let Some((progress, batch_id)) = batch_id {
            progress.bulk_update(batch_id, count);
            progress.complete(
                batch_id,
                result.is_ok(),
                result.as_ref().err().map(ToString::to_string),
            );
        }

        result.map(|()| count)
    }

    fn lock_buffer(&self) -> MutexGuard<'_, BufferState> {
        self.inner.buffer.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn lock_stats(&self) -> MutexGuard<'_, HashMap<String, CampaignStats>> {
        self.inner.stats.lock().unwrap_or_else(|p| p.into_inner())
    }
}

/// Marks one taken batch as landed, also when the delivering future is dropped.
struct Flight<'a>(&'a VendorClient);

impl Drop for Flight<'_> {
    fn drop(&mut self) {
        {
            let mut buffer = self.0.lock_buffer();
            buffer.in_flight = buffer.in_flight.saturating_sub(1);
        }
        self.0.inner.flights_done.notify_waiters();
    }
}

/// Per-campaign counts in one flush. Receipts without a campaign are not
/// tracked.
fn tally(receipts: &[DeliveryReceipt]) -> HashMap<String, CampaignStats> {
    let mut out: HashMap<String, CampaignStats> = HashMap::new();
    for receipt in receipts {
        let Some(campaign_id) = &receipt.campaign_id else {
            continue;
        };
        let entry = out.entry(campaign_id.clone()).or_default();
        entry.total += 1;
        if receipt.status.is_success() {
            entry.sent += 1;
        } else if receipt.status.is_failure() {
            entry.failed += 1;
        } else {
            warn!(status = %receipt.status.as_str(), "receipt with non-terminal status");
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::customer::Channel;
    use crate::impls::FixedOutcome;
    use crate::ports::{ManualClock, SystemClock};
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};

    #[derive(Default)]
    struct RecordingSink {
        flushes: Mutex<Vec<Vec<DeliveryReceipt>>>,
        fail: bool,
    }

    impl RecordingSink {
        fn failing() -> Self {
            Self {
                fail: true,
                ..Self::default()
            }
        }

        fn sizes(&self) -> Vec<usize> {
            self.flushes.lock().unwrap().iter().map(Vec::len).collect()
        }
    }

    #[async_trait]
    impl ReceiptSink for RecordingSink {
        async fn deliver(&self, receipts: Vec<DeliveryReceipt>) -> Result<(), VendorError> {
            self.flushes.lock().unwrap().push(receipts);
            if self.fail {
                return Err(VendorError::Rejected { status: 503 });
            }
            Ok(())
        }
    }

    /// Takes `delay` before accepting a flush.
    struct SlowSink {
        delay: Duration,
        inner: RecordingSink,
    }

    #[async_trait]
    impl ReceiptSink for SlowSink {
        async fn deliver(&self, receipts: Vec<DeliveryReceipt>) -> Result<(), VendorError> {
            tokio::time::sleep(self.delay).await;
            self.inner.deliver(receipts).await
        }
    }

    fn client_with(sink: Arc<dyn ReceiptSink>, status: DeliveryStatus, clock: Arc<dyn Clock>) -> VendorClient {
        let config = VendorConfig {
            send_latency: Duration::ZERO,
            ..VendorConfig::default()
        };
        VendorClient::new(config, Arc::new(FixedOutcome(status)), sink, clock, None)
    }

    fn client(sink: Arc<RecordingSink>, status: DeliveryStatus) -> VendorClient {
        client_with(sink, status, Arc::new(SystemClock))
    }

    fn request(i: usize) -> SendRequest {
        SendRequest::new(format!("c{i}"), "hello", Channel::Email)
            .with_campaign(Some("camp-1".into()))
    }

    #[tokio::test(start_paused = true)]
    async fn full_buffer_flushes_exactly_once() {
        let sink = Arc::new(RecordingSink::default());
        let client = client(sink.clone(), DeliveryStatus::Sent);

        for i in 0..50 {
            client.send(request(i)).await;
        }
        assert_eq!(sink.sizes(), vec![50]);
        assert_eq!(client.buffered(), 0);

        // the idle timer armed by the first send must not flush again
        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(sink.sizes(), vec![50]);
    }

    #[tokio::test(start_paused = true)]
    async fn idle_timeout_flushes_partial_buffer() {
        let sink = Arc::new(RecordingSink::default());
        let client = client(sink.clone(), DeliveryStatus::Sent);

        for i in 0..10 {
            client.send(request(i)).await;
        }
        assert!(sink.sizes().is_empty());

        tokio::time::sleep(Duration::from_millis(1_100)).await;
        tokio::task::yield_now().await;
        assert_eq!(sink.sizes(), vec![10]);
        assert_eq!(client.buffered(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn idle_timeout_counts_from_first_unflushed_receipt() {
        let sink = Arc::new(RecordingSink::default());
        let client = client(sink.clone(), DeliveryStatus::Sent);

        client.send(request(0)).await;
        tokio::time::sleep(Duration::from_millis(600)).await;
        client.send(request(1)).await;
        tokio::time::sleep(Duration::from_millis(500)).await;
        tokio::task::yield_now().await;

        assert_eq!(sink.sizes(), vec![2]);
    }

    #[tokio::test(start_paused = true)]
    async fn ack_carries_decided_status_and_send_id() {
        let sink = Arc::new(RecordingSink::default());
        let client = client(sink.clone(), DeliveryStatus::Failed);

        let mut req = request(7);
        let send_id = SendId::from_ulid(ulid::Ulid::new());
        req.send_id = Some(send_id);

        let ack = client.send(req).await;
        assert_eq!(ack.status, DeliveryStatus::Failed);
        assert_eq!(ack.customer_id, "c7");
        assert_eq!(ack.send_id, Some(send_id));

        client.flush_now().await.unwrap();
        let flushes = sink.flushes.lock().unwrap();
        assert_eq!(flushes[0][0].send_id, Some(send_id));
        assert_eq!(flushes[0][0].campaign_id.as_deref(), Some("camp-1"));
    }

    #[tokio::test(start_paused = true)]
    async fn failed_flush_counts_receipts_as_failed() {
        let sink = Arc::new(RecordingSink::failing());
        let client = client(sink.clone(), DeliveryStatus::Sent);

        for i in 0..3 {
            client.send(request(i)).await;
        }
        let err = client.flush_now().await.unwrap_err();
        assert_eq!(err, VendorError::Rejected { status: 503 });

        let stats = client.campaign_stats("camp-1").unwrap();
        assert_eq!(
            stats,
            CampaignStats {
                total: 3,
                batches: 1,
                sent: 0,
                failed: 3
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn reset_stats_flushes_then_clears() {
        let sink = Arc::new(RecordingSink::default());
        let client = client(sink.clone(), DeliveryStatus::Sent);

        client.send(request(0)).await;
        client.send(request(1)).await;

        assert_eq!(client.reset_stats().await.unwrap(), 2);
        assert_eq!(sink.sizes(), vec![2]);
        assert!(client.all_stats().is_empty());
        assert_eq!(client.flush_now().await.unwrap(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn reset_waits_for_a_flush_already_in_flight() {
        let sink = Arc::new(SlowSink {
            delay: Duration::from_millis(300),
            inner: RecordingSink::default(),
        });
        let client = client_with(sink.clone(), DeliveryStatus::Sent, Arc::new(SystemClock));

        client
            .send(SendRequest::new("c1", "hello", Channel::Email).with_campaign(Some("old-camp".into())))
            .await;
        // idle flush has taken the buffer and is waiting on the sink
        tokio::time::sleep(Duration::from_millis(1_100)).await;
        assert_eq!(client.buffered(), 0);
        assert!(sink.inner.sizes().is_empty());

        assert_eq!(client.reset_stats().await.unwrap(), 0);
        assert_eq!(sink.inner.sizes(), vec![1]);
        assert!(client.all_stats().is_empty());

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(client.all_stats().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn receipts_are_stamped_with_clock_time() {
        let sink = Arc::new(RecordingSink::default());
        let start = Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap();
        let clock = Arc::new(ManualClock::new(start));
        let client = client_with(sink.clone(), DeliveryStatus::Sent, clock.clone());

        client.send(request(0)).await;
        clock.advance(chrono::Duration::seconds(5));
        client.send(request(1)).await;
        client.flush_now().await.unwrap();

        let flushes = sink.flushes.lock().unwrap();
        let stamps: Vec<_> = flushes[0].iter().map(|r| r.timestamp).collect();
        assert_eq!(stamps, vec![start, start + chrono::Duration::seconds(5)]);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_sends_lose_no_receipts() {
        let sink = Arc::new(RecordingSink::default());
        let client = client(sink.clone(), DeliveryStatus::Sent);

        let sends = (0..120).map(|i| {
            let client = client.clone();
            async move { client.send(request(i)).await }
        });
        futures::future::join_all(sends).await;
        client.flush_now().await.unwrap();

        let sizes = sink.sizes();
        assert_eq!(sizes.iter().sum::<usize>(), 120);
        assert!(sizes.iter().all(|&n| n <= 50));

        let mut ids: Vec<String> = sink
            .flushes
            .lock()
            .unwrap()
            .iter()
            .flatten()
            .map(|r| r.customer_id.clone())
            .collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 120);
    }
}
