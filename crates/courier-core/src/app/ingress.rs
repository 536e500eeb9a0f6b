//! ReceiptIngress - validated entry point for delivery receipts.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::app::progress::ProgressTracker;
use crate::domain::errors::{PipelineError, ValidationError, VendorError};
use crate::domain::events::BatchKind;
use crate::domain::receipt::DeliveryReceipt;
use crate::domain::topic::Topic;
use crate::ports::work_queue::push_all;
use crate::ports::{ReceiptSink, WorkQueue};

/// Request body: one receipt or an array of them.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ReceiptSubmission {
    Batch(Vec<Value>),
    Single(Value),
}

pub struct ReceiptIngress {
    queue: Arc<dyn WorkQueue>,
    progress: Option<Arc<ProgressTracker>>,
}

impl ReceiptIngress {
    pub fn new(queue: Arc<dyn WorkQueue>, progress: Option<Arc<ProgressTracker>>) -> Self {
        Self { queue, progress }
    }

    /// Validate and enqueue a submission. Returns the number of receipts queued.
    ///
    /// Nothing is queued unless every receipt in the submission is valid.
    pub async fn submit(&self, submission: ReceiptSubmission) -> Result<usize, PipelineError> {
        let receipts = match submission {
            ReceiptSubmission::Single(value) => vec![DeliveryReceipt::from_wire(&value)?],
            ReceiptSubmission::Batch(values) => {
                let total = values.len();
                let receipts: Vec<_> = values
                    .iter()
                    .filter_map(|v| DeliveryReceipt::from_wire(v).ok())
                    .collect();
                let invalid_count = total - receipts.len();
                if invalid_count > 0 {
                    warn!(invalid_count, total, "rejecting receipt batch");
                    return Err(ValidationError::InvalidReceipts { invalid_count }.into());
                }
                receipts
            }
        };

        self.accept(receipts).await
    }

    /// Enqueue already-decoded receipts.
    pub async fn accept(&self, receipts: Vec<DeliveryReceipt>) -> Result<usize, PipelineError> {
        let count = receipts.len();
        if count == 0 {
            return Ok(0);
        }

        let batch_id = self
            .progress
            .as_ref()
            .map(|p| (p, p.start_batch(BatchKind::ReceiptIngress, count)));

        let result = push_all(self.queue.as_ref(), Topic::Receipts, &receipts).await;

        if let Some((progress, batch_id)) = batch_id {
            progress.bulk_update(batch_id, if result.is_ok() { count } else { 0 });
            progress.complete(
                batch_id,
                result.is_ok(),
                result.as_ref().err().map(ToString::to_string),
            );
        }

        result?;
        info!(receipts = count, topic = %Topic::Receipts, "receipts queued");
        Ok(count)
    }
}

/// In-process `ReceiptSink`: the vendor's flushes go straight to ingress.
pub struct IngressSink {
    ingress: Arc<ReceiptIngress>,
}

impl IngressSink {
    pub fn new(ingress: Arc<ReceiptIngress>) -> Self {
        Self { ingress }
    }
}

#[async_trait]
impl ReceiptSink for IngressSink {
    async fn deliver(&self, receipts: Vec<DeliveryReceipt>) -> Result<(), VendorError> {
        self.ingress
            .accept(receipts)
            .await
            .map(|_| ())
            .map_err(|e| VendorError::Ingress(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::impls::InMemoryWorkQueue;
    use crate::ports::work_queue::decode;
    use serde_json::json;

    fn receipt(customer: &str) -> Value {
        json!({
            "customerId": customer,
            "message": "hi",
            "status": "SENT",
            "timestamp": "2024-05-01T10:00:00Z",
            "campaignId": "camp-1"
        })
    }

    fn ingress() -> (ReceiptIngress, Arc<InMemoryWorkQueue>) {
        let queue = Arc::new(InMemoryWorkQueue::new());
        (ReceiptIngress::new(queue.clone(), None), queue)
    }

    #[tokio::test]
    async fn single_receipt_is_queued() {
        let (ingress, queue) = ingress();
        let body: ReceiptSubmission = serde_json::from_value(receipt("c1")).unwrap();
        assert!(matches!(body, ReceiptSubmission::Single(_)));

        assert_eq!(ingress.submit(body).await.unwrap(), 1);

        let items = queue.dequeue_batch(Topic::Receipts, 10).await.unwrap();
        let queued: DeliveryReceipt = decode(&items[0]).unwrap();
        assert_eq!(queued.customer_id, "c1");
    }

    #[tokio::test]
    async fn batch_is_queued_in_order() {
        let (ingress, queue) = ingress();
        let body: ReceiptSubmission =
            serde_json::from_value(json!([receipt("c1"), receipt("c2"), receipt("c3")])).unwrap();

        assert_eq!(ingress.submit(body).await.unwrap(), 3);
        assert_eq!(queue.len(Topic::Receipts).await.unwrap(), 3);

        let items = queue.dequeue_batch(Topic::Receipts, 10).await.unwrap();
        let ids: Vec<String> = items
            .iter()
            .map(|raw| decode::<DeliveryReceipt>(raw).unwrap().customer_id)
            .collect();
        assert_eq!(ids, vec!["c1", "c2", "c3"]);
    }

    #[tokio::test]
    async fn invalid_single_receipt_is_rejected() {
        let (ingress, queue) = ingress();
        let body = ReceiptSubmission::Single(json!({"customerId": "c1", "status": "SENT"}));

        let err = ingress.submit(body).await.unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Validation(ValidationError::MissingReceiptFields)
        ));
        assert_eq!(queue.len(Topic::Receipts).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn batch_reports_invalid_count_and_queues_nothing() {
        let (ingress, queue) = ingress();
        let body = ReceiptSubmission::Batch(vec![
            receipt("c1"),
            json!({"customerId": "c2"}),
            json!({"customerId": "", "message": "m", "status": "SENT", "timestamp": "2024-05-01T10:00:00Z"}),
        ]);

        let err = ingress.submit(body).await.unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Validation(ValidationError::InvalidReceipts { invalid_count: 2 })
        ));
        assert_eq!(queue.len(Topic::Receipts).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn ingress_sink_hands_flushes_to_the_queue() {
        let (ingress, queue) = ingress();
        let sink = IngressSink::new(Arc::new(ingress));

        let receipts = vec![DeliveryReceipt::from_wire(&receipt("c9")).unwrap()];
        sink.deliver(receipts).await.unwrap();

        assert_eq!(queue.len(Topic::Receipts).await.unwrap(), 1);
    }
}
