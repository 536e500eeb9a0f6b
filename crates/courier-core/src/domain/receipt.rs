//! Delivery outcomes reported by the vendor.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use super::errors::ValidationError;
use super::ids::SendId;

/// Status of a send attempt.
///
/// Log entries start `pending`; receipts carry a terminal status. Statuses
/// outside the known set are kept verbatim so that a newer vendor status is
/// reconciled instead of rejected.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DeliveryStatus {
    Pending,
    Sent,
    Delivered,
    Failed,
    Other(String),
}

impl DeliveryStatus {
    pub fn as_str(&self) -> &str {
        match self {
            DeliveryStatus::Pending => "pending",
            DeliveryStatus::Sent => "SENT",
            DeliveryStatus::Delivered => "DELIVERED",
            DeliveryStatus::Failed => "FAILED",
            DeliveryStatus::Other(s) => s,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, DeliveryStatus::Pending)
    }

    /// Counts toward a campaign's `sentCount`.
    pub fn is_success(&self) -> bool {
        matches!(self, DeliveryStatus::Sent | DeliveryStatus::Delivered)
    }

    /// Counts toward a campaign's `failedCount`.
    pub fn is_failure(&self) -> bool {
        matches!(self, DeliveryStatus::Failed)
    }
}

impl FromStr for DeliveryStatus {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let status = match s.trim().to_ascii_lowercase().as_str() {
            "pending" => DeliveryStatus::Pending,
            "sent" => DeliveryStatus::Sent,
            "delivered" => DeliveryStatus::Delivered,
            "failed" => DeliveryStatus::Failed,
            _ => DeliveryStatus::Other(s.trim().to_string()),
        };
        Ok(status)
    }
}

impl fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for DeliveryStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for DeliveryStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        let Ok(status) = raw.parse::<DeliveryStatus>();
        Ok(status)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryReceipt {
    pub customer_id: String,
    pub message: String,
    pub status: DeliveryStatus,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub campaign_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub send_id: Option<SendId>,
}

/// Fields every receipt must carry.
pub const REQUIRED_RECEIPT_FIELDS: &[&str] = &["customerId", "message", "status", "timestamp"];

impl DeliveryReceipt {
    /// Validate and decode one receipt as it arrives on the wire.
    ///
    /// Each required field must be present, non-null and (for strings)
    /// non-empty. A receipt whose fields are present but malformed (e.g. an
    /// unparseable timestamp) is rejected the same way.
    pub fn from_wire(value: &Value) -> Result<Self, ValidationError> {
        let obj = value.as_object().ok_or(ValidationError::MissingReceiptFields)?;

        let complete = REQUIRED_RECEIPT_FIELDS.iter().all(|key| match obj.get(*key) {
            None | Some(Value::Null) => false,
            Some(Value::String(s)) => !s.trim().is_empty(),
            Some(_) => true,
        });
        if !complete {
            return Err(ValidationError::MissingReceiptFields);
        }

        serde_json::from_value(value.clone()).map_err(|_| ValidationError::MissingReceiptFields)
    }
}
