//! CommunicationLogStore port - send attempts and their outcomes.

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::domain::campaign::OutcomeCounts;
use crate::domain::errors::StoreError;
use crate::domain::log_entry::CommunicationLogEntry;
use crate::domain::receipt::DeliveryReceipt;

/// Result of one bulk reconciliation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Receipts that found an entry.
    pub matched: usize,
    /// Entries whose stored fields actually changed.
    pub modified: usize,
    /// Receipts that found nothing (duplicates, unknown customers, ...).
    pub unmatched: usize,
    /// Newly terminal outcomes per campaign, keyed by campaign id.
    pub outcomes: BTreeMap<String, OutcomeCounts>,
}

/// CommunicationLogStore owns the communication log.
///
/// # Contract
/// - `insert_many` writes all entries in one transaction
/// - `apply_receipts` reconciles a whole drained batch in one transaction.
///   Receipts are applied in order; each one updates at most one entry
///   (see `CommunicationLogEntry::accepts`), the oldest match first
/// - only a pending entry reaching a terminal status contributes to
///   `outcomes`, so a duplicate receipt never double counts
#[async_trait]
pub trait CommunicationLogStore: Send + Sync {
    async fn insert_many(&self, entries: Vec<CommunicationLogEntry>) -> Result<(), StoreError>;

    async fn apply_receipts(&self, receipts: &[DeliveryReceipt]) -> Result<ReconcileReport, StoreError>;

    /// Entries for one campaign, oldest first.
    async fn by_campaign(&self, campaign_id: &str) -> Result<Vec<CommunicationLogEntry>, StoreError>;

    /// Entries for one segment, oldest first.
    async fn by_segment(&self, segment_id: &str) -> Result<Vec<CommunicationLogEntry>, StoreError>;
}
