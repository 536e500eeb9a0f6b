//! Status - point-in-time view of the pipeline.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::app::progress::{BatchSnapshot, ProgressTracker};
use crate::app::vendor::{CampaignStats, VendorClient};
use crate::domain::errors::QueueError;
use crate::domain::topic::Topic;
use crate::ports::WorkQueue;

/// Queue depths, in-flight batches and the vendor's buffer/statistics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineStatus {
    /// Depth per topic, keyed by the topic's list key.
    pub queues: BTreeMap<String, usize>,
    pub in_flight: Vec<BatchSnapshot>,
    pub buffered_receipts: usize,
    pub vendor_stats: BTreeMap<String, CampaignStats>,
}

impl PipelineStatus {
    pub async fn collect(
        queue: &dyn WorkQueue,
        progress: &ProgressTracker,
        vendor: &VendorClient,
    ) -> Result<Self, QueueError> {
        let mut queues = BTreeMap::new();
        for topic in Topic::ALL {
            queues.insert(topic.key().to_string(), queue.len(topic).await?);
        }

        Ok(Self {
            queues,
            in_flight: progress.in_flight(),
            buffered_receipts: vendor.buffered(),
            vendor_stats: vendor.all_stats(),
        })
    }

    pub fn total_queued(&self) -> usize {
        self.queues.values().sum()
    }

    /// Nothing queued, nothing running, nothing buffered.
    pub fn is_quiescent(&self) -> bool {
        self.total_queued() == 0 && self.in_flight.is_empty() && self.buffered_receipts == 0
    }
}
