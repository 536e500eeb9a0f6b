//! ReceiptDispatcher - reconciles drained receipts onto the communication log.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use super::{DispatchReport, TopicDispatcher};
use crate::domain::errors::DispatchError;
use crate::domain::ids::BatchId;
use crate::domain::receipt::DeliveryReceipt;
use crate::domain::topic::Topic;
use crate::ports::work_queue::decode;
use crate::ports::{CampaignStore, CommunicationLogStore};

/// Applies a whole drained batch in one `apply_receipts` call, then advances
/// campaign counters by the newly terminal outcomes.
///
/// Counter updates come after the log write has committed. A failure there is
/// logged only and does not fail the batch.
pub struct ReceiptDispatcher {
    logs: Arc<dyn CommunicationLogStore>,
    campaigns: Arc<dyn CampaignStore>,
}

impl ReceiptDispatcher {
    pub fn new(logs: Arc<dyn CommunicationLogStore>, campaigns: Arc<dyn CampaignStore>) -> Self {
        Self { logs, campaigns }
    }
}

#[async_trait]
impl TopicDispatcher for ReceiptDispatcher {
    fn topic(&self) -> Topic {
        Topic::Receipts
    }

    async fn dispatch(&self, batch_id: BatchId, items: &[String]) -> Result<DispatchReport, DispatchError> {
        let mut skipped = 0;
        let mut receipts = Vec::with_capacity(items.len());
        for raw in items {
            match decode::<DeliveryReceipt>(raw) {
                Ok(receipt) => receipts.push(receipt),
                Err(e) => {
                    warn!(%batch_id, error = %e, "skipping undecodable receipt");
                    skipped += 1;
                }
            }
        }
        if receipts.is_empty() {
            return Ok(DispatchReport { processed: 0, skipped });
        }

        let report = self.logs.apply_receipts(&receipts).await?;
        info!(
            %batch_id,
            receipts = receipts.len(),
            matched = report.matched,
            modified = report.modified,
            unmatched = report.unmatched,
            "receipts reconciled"
        );

        for (campaign_id, counts) in &report.outcomes {
            if let Err(e) = self.campaigns.record_outcomes(campaign_id, *counts).await {
                warn!(
                    %batch_id,
                    campaign_id = %campaign_id,
                    sent = counts.sent,
                    failed = counts.failed,
                    error = %e,
                    "campaign counters not updated"
                );
            }
        }

        Ok(DispatchReport {
            processed: report.matched,
            skipped: skipped + report.unmatched,
        })
    }
}
