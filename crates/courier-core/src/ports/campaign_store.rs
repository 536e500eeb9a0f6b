//! CampaignStore port - campaign records and their aggregate counters.

use async_trait::async_trait;

use crate::domain::campaign::{Campaign, OutcomeCounts};
use crate::domain::errors::StoreError;

#[async_trait]
pub trait CampaignStore: Send + Sync {
    /// Fails with `StoreError::Duplicate` if the id is taken.
    async fn create(&self, campaign: Campaign) -> Result<(), StoreError>;

    async fn get(&self, id: &str) -> Result<Option<Campaign>, StoreError>;

    /// Add to `sentCount` / `failedCount`. Counters never decrease.
    async fn record_outcomes(&self, id: &str, counts: OutcomeCounts) -> Result<(), StoreError>;
}
