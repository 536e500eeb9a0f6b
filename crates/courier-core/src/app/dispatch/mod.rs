//! Topic dispatchers - what the scheduler does with a drained batch.
//!
//! # Included
//! - **MessageBatchDispatcher**: audience resolution + pending log entries
//! - **ReceiptDispatcher**: bulk reconciliation onto the communication log
//! - **CustomerOpDispatcher**: queued customer create/update/delete

pub mod customers;
pub mod messages;
pub mod receipts;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::errors::DispatchError;
use crate::domain::ids::BatchId;
use crate::domain::topic::Topic;

pub use self::customers::CustomerOpDispatcher;
pub use self::messages::MessageBatchDispatcher;
pub use self::receipts::ReceiptDispatcher;

/// Outcome of one dispatch call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Items fully handled.
    pub processed: usize,
    /// Items dropped: undecodable, unsupported, or whose job failed on its own.
    pub skipped: usize,
}

impl DispatchReport {
    pub fn total(&self) -> usize {
        self.processed + self.skipped
    }
}

/// TopicDispatcher handles every drained batch of one topic.
///
/// # Contract
/// - `items` are raw queue payloads; an item that does not decode is skipped
///   and logged, it does not fail the batch
/// - `Err` means the batch-level write failed. The scheduler may retry the
///   same items once, so a failed call must leave no partial write behind
#[async_trait]
pub trait TopicDispatcher: Send + Sync {
    fn topic(&self) -> Topic;

    async fn dispatch(&self, batch_id: BatchId, items: &[String]) -> Result<DispatchReport, DispatchError>;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("a dispatcher for topic '{0}' is already registered")]
    AlreadyRegistered(Topic),
}

/// One dispatcher per topic.
#[derive(Default, Clone)]
pub struct DispatcherRegistry {
    dispatchers: HashMap<Topic, Arc<dyn TopicDispatcher>>,
}

impl DispatcherRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, dispatcher: Arc<dyn TopicDispatcher>) -> Result<(), RegistryError> {
        let topic = dispatcher.topic();
        if self.dispatchers.contains_key(&topic) {
            return Err(RegistryError::AlreadyRegistered(topic));
        }
        self.dispatchers.insert(topic, dispatcher);
        Ok(())
    }

    pub fn get(&self, topic: Topic) -> Option<Arc<dyn TopicDispatcher>> {
        self.dispatchers.get(&topic).cloned()
    }

    pub fn topics(&self) -> Vec<Topic> {
        Topic::ALL
            .into_iter()
            .filter(|t| self.dispatchers.contains_key(t))
            .collect()
    }

    /// Topics with no dispatcher.
    pub fn missing_topics(&self) -> Vec<Topic> {
        Topic::ALL
            .into_iter()
            .filter(|t| !self.dispatchers.contains_key(t))
            .collect()
    }
}
