use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One execution of sending a message to a segment's audience.
///
/// `sent_count` / `failed_count` only ever grow, and only receipt
/// reconciliation advances them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Campaign {
    pub id: String,
    #[serde(rename = "userId")]
    pub owner_id: String,
    pub name: String,
    pub audience_size: usize,
    #[serde(default)]
    pub sent_count: u64,
    #[serde(default)]
    pub failed_count: u64,
    #[serde(default)]
    pub tag: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub customers: Vec<String>,
}

impl Campaign {
    pub fn record(&mut self, sent: u64, failed: u64) {
        self.sent_count = self.sent_count.saturating_add(sent);
        self.failed_count = self.failed_count.saturating_add(failed);
    }

    pub fn processed(&self) -> u64 {
        self.sent_count + self.failed_count
    }
}

/// Per-campaign delta produced by one reconciliation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeCounts {
    pub sent: u64,
    pub failed: u64,
}

impl OutcomeCounts {
    pub fn is_empty(&self) -> bool {
        self.sent == 0 && self.failed == 0
    }
}
