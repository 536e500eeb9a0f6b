//! InMemoryWorkQueue - work queue for development and tests.
//!
//! One `VecDeque` per topic behind a single async mutex. Every operation
//! completes inside one lock acquisition, which is what makes
//! `dequeue_batch` atomic.

use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::errors::QueueError;
use crate::domain::topic::Topic;
use crate::ports::WorkQueue;

#[derive(Default)]
pub struct InMemoryWorkQueue {
    lists: Mutex<HashMap<Topic, VecDeque<String>>>,
}

impl InMemoryWorkQueue {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl WorkQueue for InMemoryWorkQueue {
    async fn enqueue(&self, topic: Topic, item: String) -> Result<(), QueueError> {
        let mut lists = self.lists.lock().await;
        lists.entry(topic).or_default().push_back(item);
        Ok(())
    }

    async fn enqueue_many(&self, topic: Topic, items: Vec<String>) -> Result<(), QueueError> {
        if items.is_empty() {
            return Ok(());
        }
        let mut lists = self.lists.lock().await;
        lists.entry(topic).or_default().extend(items);
        Ok(())
    }

    async fn dequeue_batch(&self, topic: Topic, max: usize) -> Result<Vec<String>, QueueError> {
        let mut lists = self.lists.lock().await;
        let Some(list) = lists.get_mut(&topic) else {
            return Ok(Vec::new());
        };
        let take = max.min(list.len());
        Ok(list.drain(..take).collect())
    }

    async fn len(&self, topic: Topic) -> Result<usize, QueueError> {
        let lists = self.lists.lock().await;
        Ok(lists.get(&topic).map_or(0, VecDeque::len))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    #[tokio::test]
    async fn fifo_per_topic() {
        let queue = InMemoryWorkQueue::new();
        queue.enqueue(Topic::Receipts, "r1".into()).await.unwrap();
        queue.enqueue(Topic::MessageBatches, "m1".into()).await.unwrap();
        queue
            .enqueue_many(Topic::Receipts, vec!["r2".into(), "r3".into()])
            .await
            .unwrap();

        assert_eq!(queue.len(Topic::Receipts).await.unwrap(), 3);
        assert_eq!(
            queue.dequeue_batch(Topic::Receipts, 2).await.unwrap(),
            vec!["r1".to_string(), "r2".to_string()]
        );
        assert_eq!(
            queue.dequeue_batch(Topic::Receipts, 10).await.unwrap(),
            vec!["r3".to_string()]
        );
        assert!(queue.dequeue_batch(Topic::Receipts, 10).await.unwrap().is_empty());
        assert_eq!(queue.len(Topic::MessageBatches).await.unwrap(), 1);
        assert_eq!(queue.len(Topic::CustomerOperations).await.unwrap(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_drains_never_overlap() {
        let queue = Arc::new(InMemoryWorkQueue::new());
        let items: Vec<String> = (0..1_000).map(|i| format!("item-{i}")).collect();
        queue.enqueue_many(Topic::Receipts, items).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let queue = Arc::clone(&queue);
            handles.push(tokio::spawn(async move {
                let mut seen = Vec::new();
                loop {
                    let batch = queue.dequeue_batch(Topic::Receipts, 7).await.unwrap();
                    if batch.is_empty() {
                        break;
                    }
                    seen.extend(batch);
                    tokio::task::yield_now().await;
                }
                seen
            }));
        }

        let mut all = Vec::new();
        for handle in handles {
            all.extend(handle.await.unwrap());
        }

        let unique: HashSet<_> = all.iter().collect();
        assert_eq!(all.len(), 1_000);
        assert_eq!(unique.len(), 1_000);
    }
}
