//! CustomerOpDispatcher - applies queued customer mutations.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use super::{DispatchReport, TopicDispatcher};
use crate::domain::customer::CustomerOperation;
use crate::domain::errors::DispatchError;
use crate::domain::ids::BatchId;
use crate::domain::topic::Topic;
use crate::ports::CustomerStore;
use crate::ports::work_queue::decode;

/// Runs the supported operations of a drained batch, in order, inside one
/// `apply_batch` transaction. Unknown models/operations and undecodable items
/// are skipped with a warning.
pub struct CustomerOpDispatcher {
    store: Arc<dyn CustomerStore>,
}

impl CustomerOpDispatcher {
    pub fn new(store: Arc<dyn CustomerStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl TopicDispatcher for CustomerOpDispatcher {
    fn topic(&self) -> Topic {
        Topic::CustomerOperations
    }

    async fn dispatch(&self, batch_id: BatchId, items: &[String]) -> Result<DispatchReport, DispatchError> {
        let mut skipped = 0;
        let mut mutations = Vec::with_capacity(items.len());

        for raw in items {
            let op = match decode::<CustomerOperation>(raw) {
                Ok(op) => op,
                Err(e) => {
                    warn!(%batch_id, error = %e, "skipping undecodable customer operation");
                    skipped += 1;
                    continue;
                }
            };
            match op.mutation() {
                Ok(mutation) => mutations.push(mutation),
                Err(e) => {
                    warn!(
                        %batch_id,
                        model = %op.model,
                        operation = %op.operation,
                        error = %e,
                        "skipping unsupported customer operation"
                    );
                    skipped += 1;
                }
            }
        }

        if mutations.is_empty() {
            return Ok(DispatchReport { processed: 0, skipped });
        }

        let report = self.store.apply_batch(&mutations).await?;
        info!(
            %batch_id,
            created = report.created,
            updated = report.updated,
            deleted = report.deleted,
            missing = report.missing,
            "customer operations applied"
        );

        Ok(DispatchReport {
            processed: mutations.len(),
            skipped,
        })
    }
}
