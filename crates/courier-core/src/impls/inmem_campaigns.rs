use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::campaign::{Campaign, OutcomeCounts};
use crate::domain::errors::StoreError;
use crate::ports::CampaignStore;

#[derive(Default)]
pub struct InMemoryCampaignStore {
    campaigns: RwLock<HashMap<String, Campaign>>,
}

impl InMemoryCampaignStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CampaignStore for InMemoryCampaignStore {
    async fn create(&self, campaign: Campaign) -> Result<(), StoreError> {
        let mut campaigns = self.campaigns.write().await;
        if campaigns.contains_key(&campaign.id) {
            return Err(StoreError::Duplicate(campaign.id));
        }
        campaigns.insert(campaign.id.clone(), campaign);
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<Campaign>, StoreError> {
        Ok(self.campaigns.read().await.get(id).cloned())
    }

    async fn record_outcomes(&self, id: &str, counts: OutcomeCounts) -> Result<(), StoreError> {
        let mut campaigns = self.campaigns.write().await;
        let campaign = campaigns
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        campaign.record(counts.sent, counts.failed);
        Ok(())
    }
}
