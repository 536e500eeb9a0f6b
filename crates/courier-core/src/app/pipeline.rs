//! Pipeline - the wired service object.
//!
//! Built once by `PipelineBuilder` and shared (behind an `Arc`) by the HTTP
//! surface and the scheduler loops. Holds no global state.

use std::sync::Arc;

use tracing::info;

use crate::app::audience::{AudienceCount, AudienceResolver};
use crate::app::campaign::{CampaignRequest, CampaignRunner, CampaignSummary};
use crate::app::ingress::ReceiptIngress;
use crate::app::progress::ProgressTracker;
use crate::app::scheduler::{Scheduler, SchedulerHandle};
use crate::app::status::PipelineStatus;
use crate::app::vendor::VendorClient;
use crate::domain::customer::CustomerOperation;
use crate::domain::errors::PipelineError;
use crate::domain::message::MessageBatchJob;
use crate::domain::predicate::Predicate;
use crate::domain::rule::Rule;
use crate::domain::topic::Topic;
use crate::filter::translate;
use crate::ports::work_queue::push;
use crate::ports::{CampaignStore, CommunicationLogStore, CustomerStore, WorkQueue};

pub struct Pipeline {
    pub(crate) queue: Arc<dyn WorkQueue>,
    pub(crate) customers: Arc<dyn CustomerStore>,
    pub(crate) logs: Arc<dyn CommunicationLogStore>,
    pub(crate) campaigns: Arc<dyn CampaignStore>,
    pub(crate) resolver: Arc<AudienceResolver>,
    pub(crate) vendor: VendorClient,
    pub(crate) ingress: Arc<ReceiptIngress>,
    pub(crate) scheduler: Arc<Scheduler>,
    pub(crate) progress: Arc<ProgressTracker>,
    pub(crate) runner: CampaignRunner,
}

impl Pipeline {
    /// Queue a message batch job. Fire-and-forget: delivery is not confirmed.
    pub async fn submit_job(&self, job: &MessageBatchJob) -> Result<(), PipelineError> {
        push(self.queue.as_ref(), Topic::MessageBatches, job).await?;
        info!(
            segment_id = %job.segment_id,
            campaign_id = job.campaign_id.as_deref().unwrap_or("-"),
            "message job queued"
        );
        Ok(())
    }

    /// Translate a rule list and queue the resulting job.
    ///
    /// Malformed rules fail here, before anything is queued.
    pub async fn submit_segment(
        &self,
        segment_id: &str,
        message: &str,
        rules: &[Rule],
        campaign_id: Option<String>,
    ) -> Result<Predicate, PipelineError> {
        let predicate = translate(rules)?;
        let mut job = MessageBatchJob::new(segment_id, message, predicate.clone());
        job.campaign_id = campaign_id;
        self.submit_job(&job).await?;
        Ok(predicate)
    }

    pub async fn submit_customer_operation(&self, op: &CustomerOperation) -> Result<(), PipelineError> {
        push(self.queue.as_ref(), Topic::CustomerOperations, op).await?;
        Ok(())
    }

    /// Audience size for a rule list, without queueing anything.
    pub async fn preview(&self, rules: &[Rule]) -> Result<AudienceCount, PipelineError> {
        let predicate = translate(rules)?;
        Ok(self.resolver.count(&predicate).await?)
    }

    pub async fn run_campaign(&self, request: CampaignRequest) -> Result<CampaignSummary, PipelineError> {
        self.runner.run(request).await
    }

    pub async fn status(&self) -> Result<PipelineStatus, PipelineError> {
        Ok(PipelineStatus::collect(self.queue.as_ref(), &self.progress, &self.vendor).await?)
    }

    /// Start the per-topic scheduler loops.
    pub fn start(&self) -> SchedulerHandle {
        Arc::clone(&self.scheduler).spawn()
    }

    /// Flush the vendor buffer and drain every topic until nothing is left.
    /// Returns the number of batches dispatched.
    pub async fn settle(&self) -> Result<usize, PipelineError> {
        let mut batches = 0;
        loop {
            self.vendor.flush_now().await?;
            let handled = self.scheduler.drain_until_idle().await;
            batches += handled;
            if handled == 0 && self.vendor.buffered() == 0 {
                return Ok(batches);
            }
        }
    }

    pub fn ingress(&self) -> &Arc<ReceiptIngress> {
        &self.ingress
    }

    pub fn scheduler(&self) -> &Arc<Scheduler> {
        &self.scheduler
    }

    pub fn vendor(&self) -> &VendorClient {
        &self.vendor
    }

    pub fn progress(&self) -> &Arc<ProgressTracker> {
        &self.progress
    }

    pub fn customers(&self) -> &Arc<dyn CustomerStore> {
        &self.customers
    }

    pub fn logs(&self) -> &Arc<dyn CommunicationLogStore> {
        &self.logs
    }

    pub fn campaigns(&self) -> &Arc<dyn CampaignStore> {
        &self.campaigns
    }
}
