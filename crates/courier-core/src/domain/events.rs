//! Progress events emitted by the progress tracker.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::BatchId;

/// What a tracked batch is processing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchKind {
    Messages,
    Receipts,
    CustomerOperations,
    ReceiptIngress,
    ReceiptFlush,
    Campaign,
}

impl BatchKind {
    pub fn as_str(self) -> &'static str {
        match self {
            BatchKind::Messages => "messages",
            BatchKind::Receipts => "receipts",
            BatchKind::CustomerOperations => "customer_operations",
            BatchKind::ReceiptIngress => "receipt_ingress",
            BatchKind::ReceiptFlush => "receipt_flush",
            BatchKind::Campaign => "campaign",
        }
    }
}

impl fmt::Display for BatchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum ProgressPhase {
    Started,
    Progress,
    Completed { success: bool, error: Option<String> },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub batch_id: BatchId,
    pub kind: BatchKind,
    pub total: usize,
    pub processed: usize,
    #[serde(flatten)]
    pub phase: ProgressPhase,
    pub at: DateTime<Utc>,
}

impl ProgressEvent {
    /// Whole-number percentage, 100 for an empty batch.
    pub fn percent(&self) -> u8 {
        if self.total == 0 {
            return 100;
        }
        let pct = (self.processed.min(self.total) * 100) / self.total;
        pct as u8
    }

    pub fn is_completion(&self) -> bool {
        matches!(self.phase, ProgressPhase::Completed { .. })
    }
}
