//! MessageBatchDispatcher - turns queued jobs into pending log entries.

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use tracing::{debug, info, warn};

use super::{DispatchReport, TopicDispatcher};
use crate::app::audience::AudienceResolver;
use crate::app::vendor::VendorClient;
use crate::domain::errors::{DispatchError, PipelineError};
use crate::domain::ids::BatchId;
use crate::domain::log_entry::CommunicationLogEntry;
use crate::domain::message::MessageBatchJob;
use crate::domain::topic::Topic;
use crate::ports::work_queue::decode;
use crate::ports::{Clock, CommunicationLogStore, IdGenerator};

/// Handles the message-batch topic.
///
/// Jobs of one drained batch run concurrently. Each job resolves its
/// audience, then writes one pending entry per member in a single insert. A
/// job that fails is logged and skipped; its siblings still complete.
///
/// With a vendor attached, the written entries are also handed to the vendor
/// in chunks, so their receipts come back through ingress.
pub struct MessageBatchDispatcher {
    resolver: Arc<AudienceResolver>,
    logs: Arc<dyn CommunicationLogStore>,
    ids: Arc<dyn IdGenerator>,
    clock: Arc<dyn Clock>,
    handoff: Option<(VendorClient, usize)>,
}

impl MessageBatchDispatcher {
    pub fn new(
        resolver: Arc<AudienceResolver>,
        logs: Arc<dyn CommunicationLogStore>,
        ids: Arc<dyn IdGenerator>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            resolver,
            logs,
            ids,
            clock,
            handoff: None,
        }
    }

    pub fn with_handoff(mut self, vendor: VendorClient, chunk_size: usize) -> Self {
        self.handoff = Some((vendor, chunk_size.max(1)));
        self
    }

    /// Returns the number of entries written.
    async fn run_job(&self, batch_id: BatchId, job: &MessageBatchJob) -> Result<usize, PipelineError> {
        let resolution = self.resolver.resolve(&job.audience_filter).await?;
        if resolution.degraded {
            warn!(%batch_id, segment_id = %job.segment_id, "job resolved with degraded filter");
        }
        if resolution.members.is_empty() {
            info!(%batch_id, segment_id = %job.segment_id, "job matched no customers");
            return Ok(0);
        }

        let now = self.clock.now();
        let entries: Vec<_> = resolution
            .members
            .iter()
            .map(|member| {
                CommunicationLogEntry::pending(
                    self.ids.generate_send_id(),
                    member,
                    job.segment_id.clone(),
                    job.campaign_id.clone(),
                    job.message_content.clone(),
                    now,
                )
            })
            .collect();
        let written = entries.len();
        let requests: Vec<_> = entries.iter().map(CommunicationLogEntry::send_request).collect();

        self.logs.insert_many(entries).await?;
        info!(
            %batch_id,
            segment_id = %job.segment_id,
            campaign_id = job.campaign_id.as_deref().unwrap_or("-"),
            entries = written,
            "pending entries written"
        );

        if let Some((vendor, chunk_size)) = &self.handoff {
            for chunk in requests.chunks(*chunk_size) {
                join_all(chunk.iter().cloned().map(|req| vendor.send(req))).await;
            }
            debug!(%batch_id, segment_id = %job.segment_id, sends = written, "handed off to vendor");
        }

        Ok(written)
    }
}

#[async_trait]
impl TopicDispatcher for MessageBatchDispatcher {
    fn topic(&self) -> Topic {
        Topic::MessageBatches
    }

    async fn dispatch(&self, batch_id: BatchId, items: &[String]) -> Result<DispatchReport, DispatchError> {
        let mut report = DispatchReport::default();

        let mut jobs = Vec::with_capacity(items.len());
        for raw in items {
            match decode::<MessageBatchJob>(raw) {
                Ok(job) => jobs.push(job),
                Err(e) => {
                    warn!(%batch_id, error = %e, "skipping undecodable message job");
                    report.skipped += 1;
                }
            }
        }

        let results = join_all(jobs.iter().map(|job| self.run_job(batch_id, job))).await;
        for (job, result) in jobs.iter().zip(results) {
            match result {
                Ok(_) => report.processed += 1,
                Err(e) => {
                    warn!(
                        %batch_id,
                        segment_id = %job.segment_id,
                        error = %e,
                        "message job failed, skipping"
                    );
                    report.skipped += 1;
                }
            }
        }

        Ok(report)
    }
}
