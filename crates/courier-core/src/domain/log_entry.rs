//! Communication log: one row per send attempt.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::customer::{AudienceMember, Channel};
use super::ids::SendId;
use super::message::SendRequest;
use super::receipt::{DeliveryReceipt, DeliveryStatus};

/// A send attempt as recorded by the pipeline.
///
/// Created `pending` when a job is reconciled against its audience, then
/// updated in place exactly once by the matching receipt. Never deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommunicationLogEntry {
    pub send_id: SendId,
    pub customer_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub campaign_id: Option<String>,
    pub segment_id: String,
    pub message: String,
    pub status: DeliveryStatus,
    pub channel: Channel,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivery_timestamp: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

impl CommunicationLogEntry {
    pub fn pending(
        send_id: SendId,
        member: &AudienceMember,
        segment_id: impl Into<String>,
        campaign_id: Option<String>,
        message: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            send_id,
            customer_id: member.customer_id.clone(),
            campaign_id,
            segment_id: segment_id.into(),
            message: message.into(),
            status: DeliveryStatus::Pending,
            channel: member.channel,
            timestamp: now,
            delivery_timestamp: None,
            image_url: None,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status.is_pending()
    }

    /// Whether `receipt` is addressed to this entry.
    ///
    /// A receipt carrying a send id matches that attempt only. Without one the
    /// match falls back to customer (and campaign, when the receipt names one)
    /// on a still-pending entry.
    pub fn accepts(&self, receipt: &DeliveryReceipt) -> bool {
        match receipt.send_id {
            Some(send_id) => self.send_id == send_id,
            None => {
                self.is_pending()
                    && self.customer_id == receipt.customer_id
                    && receipt
                        .campaign_id
                        .as_ref()
                        .is_none_or(|c| self.campaign_id.as_ref() == Some(c))
            }
        }
    }

    /// Move a pending entry to the receipt's status. Returns whether anything
    /// changed; an entry that already left `pending` is never rewritten.
    pub fn apply(&mut self, receipt: &DeliveryReceipt) -> bool {
        if !self.is_pending() {
            return false;
        }
        let changed = self.status != receipt.status
            || self.delivery_timestamp != Some(receipt.timestamp)
            || (receipt.image_url.is_some() && self.image_url != receipt.image_url);

        self.status = receipt.status.clone();
        self.delivery_timestamp = Some(receipt.timestamp);
        if receipt.image_url.is_some() {
            self.image_url = receipt.image_url.clone();
        }
        changed
    }

    pub fn send_request(&self) -> SendRequest {
        SendRequest {
            customer_id: self.customer_id.clone(),
            message: self.message.clone(),
            channel: self.channel,
            campaign_id: self.campaign_id.clone(),
            send_id: Some(self.send_id),
        }
    }
}
