//! InMemoryLogStore - communication log for development and tests.

use std::collections::HashSet;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::errors::StoreError;
use crate::domain::log_entry::CommunicationLogEntry;
use crate::domain::receipt::DeliveryReceipt;
use crate::ports::{CommunicationLogStore, ReconcileReport};

/// Entries are kept in insertion order, so "oldest first" is a front-to-back scan.
#[derive(Default)]
pub struct InMemoryLogStore {
    entries: Mutex<Vec<CommunicationLogEntry>>,
}

impl InMemoryLogStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn all(&self) -> Vec<CommunicationLogEntry> {
        self.entries.lock().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }
}

#[async_trait]
impl CommunicationLogStore for InMemoryLogStore {
    async fn insert_many(&self, entries: Vec<CommunicationLogEntry>) -> Result<(), StoreError> {
        let mut stored = self.entries.lock().await;

        let mut seen: HashSet<_> = stored.iter().map(|e| e.send_id).collect();
        for entry in &entries {
            if !seen.insert(entry.send_id) {
                return Err(StoreError::Duplicate(entry.send_id.to_string()));
            }
        }

        stored.extend(entries);
        Ok(())
    }

    async fn apply_receipts(&self, receipts: &[DeliveryReceipt]) -> Result<ReconcileReport, StoreError> {
        let mut stored = self.entries.lock().await;
        let mut report = ReconcileReport::default();

        for receipt in receipts {
            let Some(entry) = stored.iter_mut().find(|e| e.accepts(receipt)) else {
                report.unmatched += 1;
                continue;
            };
            report.matched += 1;

            // matched but already terminal: counted, left untouched
            if !entry.is_pending() {
                continue;
            }
            if entry.apply(receipt) {
                report.modified += 1;
            }

            if let Some(campaign_id) = &entry.campaign_id {
                let counts = report.outcomes.entry(campaign_id.clone()).or_default();
                if entry.status.is_success() {
                    counts.sent += 1;
                } else if entry.status.is_failure() {
                    counts.failed += 1;
                }
            }
        }

        report.outcomes.retain(|_, counts| !counts.is_empty());
        Ok(report)
    }

    async fn by_campaign(&self, campaign_id: &str) -> Result<Vec<CommunicationLogEntry>, StoreError> {
        let stored = self.entries.lock().await;
        Ok(stored
            .iter()
            .filter(|e| e.campaign_id.as_deref() == Some(campaign_id))
            .cloned()
            .collect())
    }

    async fn by_segment(&self, segment_id: &str) -> Result<Vec<CommunicationLogEntry>, StoreError> {
        let stored = self.entries.lock().await;
        Ok(stored
            .iter()
            .filter(|e| e.segment_id == segment_id)
            .cloned()
            .collect())
    }
}
