use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::events::BatchKind;

/// A work queue topic. Each topic is an independent FIFO list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Topic {
    MessageBatches,
    Receipts,
    CustomerOperations,
}

impl Topic {
    pub const ALL: [Topic; 3] = [Topic::MessageBatches, Topic::Receipts, Topic::CustomerOperations];

    /// Key of the backing list in the shared store.
    pub fn key(self) -> &'static str {
        match self {
            Topic::MessageBatches => "message:queue",
            Topic::Receipts => "receipt:queue",
            Topic::CustomerOperations => "customer:queue",
        }
    }

    pub fn batch_kind(self) -> BatchKind {
        match self {
            Topic::MessageBatches => BatchKind::Messages,
            Topic::Receipts => BatchKind::Receipts,
            Topic::CustomerOperations => BatchKind::CustomerOperations,
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown topic: {0}")]
pub struct UnknownTopic(pub String);

impl FromStr for Topic {
    type Err = UnknownTopic;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Topic::ALL
            .into_iter()
            .find(|t| t.key() == s)
            .ok_or_else(|| UnknownTopic(s.to_string()))
    }
}
