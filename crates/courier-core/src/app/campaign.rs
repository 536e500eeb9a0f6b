//! CampaignRunner - synchronous "send this message to this segment now".
//!
//! Unlike a queued `MessageBatchJob`, a campaign run creates its campaign
//! record and log entries up front and sends immediately, in paced chunks.
//! The campaign's stored counters still only move when receipts are
//! reconciled.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::app::audience::AudienceResolver;
use crate::app::progress::ProgressTracker;
use crate::app::vendor::VendorClient;
use crate::domain::campaign::Campaign;
use crate::domain::errors::PipelineError;
use crate::domain::events::BatchKind;
use crate::domain::log_entry::CommunicationLogEntry;
use crate::domain::predicate::Predicate;
use crate::ports::{CampaignStore, Clock, CommunicationLogStore, IdGenerator};

pub const DEFAULT_CHUNK_SIZE: usize = 50;
pub const DEFAULT_CHUNK_PAUSE: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CampaignConfig {
    pub chunk_size: usize,
    /// Pause between chunks so the receipt flush and ingest path keeps up.
    pub chunk_pause: Duration,
}

impl Default for CampaignConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_pause: DEFAULT_CHUNK_PAUSE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CampaignRequest {
    #[serde(rename = "userId")]
    pub owner_id: String,
    pub name: String,
    #[serde(default)]
    pub tag: String,
    pub segment_id: String,
    pub message: String,
    pub audience_filter: Predicate,
    /// Generated when absent.
    #[serde(default)]
    pub campaign_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CampaignSummary {
    pub campaign_id: String,
    pub audience_size: usize,
    /// Synchronous vendor answers; receipts decide the stored counters.
    pub sent: usize,
    pub failed: usize,
    pub degraded: bool,
}

pub struct CampaignRunner {
    resolver: Arc<AudienceResolver>,
    campaigns: Arc<dyn CampaignStore>,
    logs: Arc<dyn CommunicationLogStore>,
    vendor: VendorClient,
    ids: Arc<dyn IdGenerator>,
    clock: Arc<dyn Clock>,
    progress: Arc<ProgressTracker>,
    config: CampaignConfig,
}

impl CampaignRunner {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        resolver: Arc<AudienceResolver>,
        campaigns: Arc<dyn CampaignStore>,
        logs: Arc<dyn CommunicationLogStore>,
        vendor: VendorClient,
        ids: Arc<dyn IdGenerator>,
        clock: Arc<dyn Clock>,
        progress: Arc<ProgressTracker>,
        config: CampaignConfig,
    ) -> Self {
        Self {
            resolver,
            campaigns,
            logs,
            vendor,
            ids,
            clock,
            progress,
            config,
        }
    }

    pub async fn run(&self, request: CampaignRequest) -> Result<CampaignSummary, PipelineError> {
        let resolution = self.resolver.resolve(&request.audience_filter).await?;
        let members = resolution.members;

        let campaign_id = request
            .campaign_id
            .clone()
            .unwrap_or_else(|| self.ids.generate_campaign_id().to_string());
        let now = self.clock.now();

        self.campaigns
            .create(Campaign {
                id: campaign_id.clone(),
                owner_id: request.owner_id.clone(),
                name: request.name.clone(),
                audience_size: members.len(),
                sent_count: 0,
                failed_count: 0,
                tag: request.tag.clone(),
                created_at: now,
                customers: members.iter().map(|m| m.customer_id.clone()).collect(),
            })
            .await?;

        let entries: Vec<_> = members
            .iter()
            .map(|member| {
                CommunicationLogEntry::pending(
                    self.ids.generate_send_id(),
                    member,
                    request.segment_id.clone(),
                    Some(campaign_id.clone()),
                    request.message.clone(),
                    now,
                )
            })
            .collect();
        let requests: Vec<_> = entries.iter().map(CommunicationLogEntry::send_request).collect();
        if !entries.is_empty() {
            self.logs.insert_many(entries).await?;
        }

        // previous run's receipts go out before the counters restart
        if let Err(e) = self.vendor.reset_stats().await {
            warn!(campaign_id = %campaign_id, error = %e, "flush before campaign failed");
        }

        info!(
            campaign_id = %campaign_id,
            segment_id = %request.segment_id,
            audience = requests.len(),
            degraded = resolution.degraded,
            "campaign started"
        );

        let batch_id = self.progress.start_batch(BatchKind::Campaign, requests.len());
        let (mut sent, mut failed) = (0, 0);
        let chunk_size = self.config.chunk_size.max(1);
        let chunks = requests.chunks(chunk_size).count();

        for (index, chunk) in requests.chunks(chunk_size).enumerate() {
            let acks = join_all(chunk.iter().cloned().map(|req| self.vendor.send(req))).await;
            for ack in &acks {
                if ack.status.is_success() {
                    sent += 1;
                } else {
                    failed += 1;
                }
            }
            self.progress.update(batch_id, acks.len());

            if index + 1 < chunks && !self.config.chunk_pause.is_zero() {
                tokio::time::sleep(self.config.chunk_pause).await;
            }
        }

        let flushed = self.vendor.flush_now().await;
        if let Err(e) = &flushed {
            warn!(campaign_id = %campaign_id, error = %e, "final receipt flush failed");
        }
        self.progress.complete(
            batch_id,
            flushed.is_ok(),
            flushed.as_ref().err().map(ToString::to_string),
        );

        info!(campaign_id = %campaign_id, sent, failed, "campaign sends finished");
        Ok(CampaignSummary {
            campaign_id,
            audience_size: requests.len(),
            sent,
            failed,
            degraded: resolution.degraded,
        })
    }
}
