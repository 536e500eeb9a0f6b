//! Outbound work: message batch jobs and individual send requests.

use serde::{Deserialize, Serialize};

use super::customer::Channel;
use super::ids::SendId;
use super::predicate::Predicate;

/// "Send this message to everyone matching this filter."
///
/// Submitted once per segment or campaign action and drained by the scheduler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageBatchJob {
    pub segment_id: String,
    pub message_content: String,
    pub audience_filter: Predicate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub campaign_id: Option<String>,
}

impl MessageBatchJob {
    pub fn new(
        segment_id: impl Into<String>,
        message_content: impl Into<String>,
        audience_filter: Predicate,
    ) -> Self {
        Self {
            segment_id: segment_id.into(),
            message_content: message_content.into(),
            audience_filter,
            campaign_id: None,
        }
    }

    pub fn with_campaign(mut self, campaign_id: impl Into<String>) -> Self {
        self.campaign_id = Some(campaign_id.into());
        self
    }
}

/// One customer + message handed to the vendor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendRequest {
    pub customer_id: String,
    pub message: String,
    pub channel: Channel,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub campaign_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub send_id: Option<SendId>,
}

impl SendRequest {
    pub fn new(customer_id: impl Into<String>, message: impl Into<String>, channel: Channel) -> Self {
        Self {
            customer_id: customer_id.into(),
            message: message.into(),
            channel,
            campaign_id: None,
            send_id: None,
        }
    }

    pub fn with_campaign(mut self, campaign_id: Option<String>) -> Self {
        self.campaign_id = campaign_id;
        self
    }
}
