//! WorkQueue port - per-topic FIFO lists of JSON items.
//!
//! Items are stored as encoded strings, the way an external list store holds
//! them. Producers push at the tail; the scheduler drains from the head.

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::domain::errors::QueueError;
use crate::domain::topic::Topic;

/// WorkQueue holds the three pipeline topics.
///
/// # Contract
/// - `enqueue` appends at the tail of the topic
/// - `dequeue_batch` removes up to `max` items from the head in one atomic
///   step: two concurrent calls never receive the same item
/// - no priority, no TTL, no dead-letter list
/// - a drained item is gone; nothing is ever returned to the queue
#[async_trait]
pub trait WorkQueue: Send + Sync {
    async fn enqueue(&self, topic: Topic, item: String) -> Result<(), QueueError>;

    /// Append several items in order, as one operation.
    async fn enqueue_many(&self, topic: Topic, items: Vec<String>) -> Result<(), QueueError>;

    async fn dequeue_batch(&self, topic: Topic, max: usize) -> Result<Vec<String>, QueueError>;

    async fn len(&self, topic: Topic) -> Result<usize, QueueError>;
}

pub fn encode<T: Serialize>(item: &T) -> Result<String, QueueError> {
    serde_json::to_string(item).map_err(|e| QueueError::Encode(e.to_string()))
}

pub fn decode<T: DeserializeOwned>(raw: &str) -> Result<T, QueueError> {
    serde_json::from_str(raw).map_err(|e| QueueError::Decode(e.to_string()))
}

/// Encode and append one item.
pub async fn push<T: Serialize>(
    queue: &dyn WorkQueue,
    topic: Topic,
    item: &T,
) -> Result<(), QueueError> {
    let encoded = encode(item)?;
    queue.enqueue(topic, encoded).await
}

/// Encode and append several items as one operation.
pub async fn push_all<T: Serialize>(
    queue: &dyn WorkQueue,
    topic: Topic,
    items: &[T],
) -> Result<(), QueueError> {
    let encoded = items.iter().map(encode).collect::<Result<Vec<_>, _>>()?;
    queue.enqueue_many(topic, encoded).await
}
