//! Customer records as the pipeline sees them.
//!
//! The customer store owns these; the pipeline only reads them through a
//! predicate and mutates them through queued `CustomerOperation`s.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use super::predicate::FilterValue;

/// Delivery channel a customer can be reached on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Sms,
    Email,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,

    #[serde(default, deserialize_with = "lenient_number", skip_serializing_if = "Option::is_none")]
    pub spend: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number", skip_serializing_if = "Option::is_none")]
    pub visits: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number", skip_serializing_if = "Option::is_none")]
    pub orders: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number", skip_serializing_if = "Option::is_none")]
    pub avg_order_value: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number", skip_serializing_if = "Option::is_none")]
    pub clv: Option<f64>,

    #[serde(rename = "lastActive", default, skip_serializing_if = "Option::is_none")]
    pub last_active: Option<DateTime<Utc>>,
    #[serde(rename = "createdAt", default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(rename = "updatedAt", default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_since: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_order: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preferred_category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,

    /// Attributes outside the fixed field table (the store is schemaless).
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl Customer {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            email: None,
            phone: None,
            spend: None,
            visits: None,
            orders: None,
            avg_order_value: None,
            clv: None,
            last_active: None,
            created_at: None,
            updated_at: None,
            customer_since: None,
            last_order: None,
            preferred_category: None,
            source: None,
            extra: BTreeMap::new(),
        }
    }

    /// Customers with a phone number are reached by SMS, everyone else by email.
    pub fn channel(&self) -> Channel {
        match self.phone.as_deref() {
            Some(phone) if !phone.trim().is_empty() => Channel::Sms,
            _ => Channel::Email,
        }
    }

    /// Stored value of `field`, typed for comparison against a filter value.
    pub fn field_value(&self, field: &str) -> Option<FilterValue> {
        let number = |v: Option<f64>| v.map(FilterValue::Number);
        let date = |v: Option<DateTime<Utc>>| v.map(FilterValue::Date);
        let text = |v: &Option<String>| v.clone().map(FilterValue::Text);

        match field {
            "_id" | "id" => Some(FilterValue::Text(self.id.clone())),
            "name" => Some(FilterValue::Text(self.name.clone())),
            "email" => text(&self.email),
            "phone" => text(&self.phone),
            "spend" => number(self.spend),
            "visits" => number(self.visits),
            "orders" => number(self.orders),
            "avg_order_value" => number(self.avg_order_value),
            "clv" => number(self.clv),
            "lastActive" => date(self.last_active),
            "createdAt" => date(self.created_at),
            "updatedAt" => date(self.updated_at),
            "customer_since" => date(self.customer_since),
            "last_order" => date(self.last_order),
            "preferred_category" => text(&self.preferred_category),
            "source" => text(&self.source),
            other => self.extra.get(other).and_then(json_to_filter_value),
        }
    }

    pub fn audience_member(&self) -> AudienceMember {
        AudienceMember {
            customer_id: self.id.clone(),
            channel: self.channel(),
            email: self.email.clone(),
            phone: self.phone.clone(),
        }
    }
}

fn json_to_filter_value(value: &Value) -> Option<FilterValue> {
    match value {
        Value::String(s) => Some(FilterValue::Text(s.clone())),
        Value::Bool(b) => Some(FilterValue::Bool(*b)),
        Value::Number(n) => n.as_f64().map(FilterValue::Number),
        Value::Object(obj) => obj
            .get("$date")
            .and_then(Value::as_str)
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|d| FilterValue::Date(d.with_timezone(&Utc))),
        _ => None,
    }
}

// Imported data often carries numbers as (quoted) strings.
fn lenient_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
    let value = Option::<Value>::deserialize(deserializer)?;
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => Ok(n.as_f64()),
        Some(Value::String(s)) => {
            let cleaned = s.trim().trim_matches(|c| c == '"' || c == '\'');
            cleaned
                .parse::<f64>()
                .map(Some)
                .map_err(|_| serde::de::Error::custom(format!("not a number: {s}")))
        }
        Some(other) => Err(serde::de::Error::custom(format!("not a number: {other}"))),
    }
}

/// Projection returned by the audience resolver: identity plus contact channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudienceMember {
    pub customer_id: String,
    pub channel: Channel,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

/// A queued customer mutation as producers submit it.
///
/// `model` and `operation` stay strings so that an unknown value reaches the
/// dispatcher (which logs and skips it) instead of failing the whole drain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerOperation {
    pub model: String,
    pub operation: String,
    pub data: Value,
}

pub const CUSTOMER_MODEL: &str = "Customer";

/// A validated customer mutation.
#[derive(Debug, Clone, PartialEq)]
pub enum CustomerMutation {
    Create(Customer),
    Update { id: String, patch: Map<String, Value> },
    Delete { id: String },
}

impl CustomerMutation {
    pub fn customer_id(&self) -> &str {
        match self {
            CustomerMutation::Create(customer) => &customer.id,
            CustomerMutation::Update { id, .. } | CustomerMutation::Delete { id } => id,
        }
    }
}

/// Why a queued operation could not be turned into a mutation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UnsupportedOperation {
    #[error("unknown model: {0}")]
    UnknownModel(String),
    #[error("unknown operation: {0}")]
    UnknownOperation(String),
    #[error("operation data is invalid: {0}")]
    InvalidData(String),
}

impl CustomerOperation {
    pub fn create(customer: &Customer) -> Self {
        Self {
            model: CUSTOMER_MODEL.to_string(),
            operation: "create".to_string(),
            data: serde_json::to_value(customer).unwrap_or(Value::Null),
        }
    }

    pub fn mutation(&self) -> Result<CustomerMutation, UnsupportedOperation> {
        if self.model != CUSTOMER_MODEL {
            return Err(UnsupportedOperation::UnknownModel(self.model.clone()));
        }
        match self.operation.as_str() {
            "create" => serde_json::from_value::<Customer>(self.data.clone())
                .map(CustomerMutation::Create)
                .map_err(|e| UnsupportedOperation::InvalidData(e.to_string())),
            "update" => {
                let id = self.data_id()?;
                let mut patch = self
                    .data
                    .as_object()
                    .cloned()
                    .ok_or_else(|| UnsupportedOperation::InvalidData("expected an object".into()))?;
                patch.remove("_id");
                patch.remove("id");
                Ok(CustomerMutation::Update { id, patch })
            }
            "delete" => Ok(CustomerMutation::Delete { id: self.data_id()? }),
            other => Err(UnsupportedOperation::UnknownOperation(other.to_string())),
        }
    }

    fn data_id(&self) -> Result<String, UnsupportedOperation> {
        self.data
            .get("_id")
            .or_else(|| self.data.get("id"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| UnsupportedOperation::InvalidData("missing _id".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn channel_depends_on_phone() {
        let mut customer = Customer::new("c1", "Ada");
        assert_eq!(customer.channel(), Channel::Email);

        customer.phone = Some("+15550100".into());
        assert_eq!(customer.channel(), Channel::Sms);

        customer.phone = Some("  ".into());
        assert_eq!(customer.channel(), Channel::Email);
    }

    #[test]
    fn deserializes_string_numbers_and_extra_fields() {
        let customer: Customer = serde_json::from_value(json!({
            "_id": "c1",
            "name": "Ada",
            "spend": "\"1500\"",
            "visits": 3,
            "lastActive": "2024-03-01T00:00:00Z",
            "tier": "gold"
        }))
        .unwrap();

        assert_eq!(customer.spend, Some(1500.0));
        assert_eq!(customer.field_value("visits"), Some(FilterValue::Number(3.0)));
        assert_eq!(
            customer.field_value("tier"),
            Some(FilterValue::Text("gold".into()))
        );
        assert!(matches!(customer.field_value("lastActive"), Some(FilterValue::Date(_))));
    }

    #[test]
    fn operation_mutations() {
        let update = CustomerOperation {
            model: "Customer".into(),
            operation: "update".into(),
            data: json!({"_id": "c1", "spend": 10}),
        };
        match update.mutation().unwrap() {
            CustomerMutation::Update { id, patch } => {
                assert_eq!(id, "c1");
                assert_eq!(patch.get("spend"), Some(&json!(10)));
                assert!(!patch.contains_key("_id"));
            }
            other => panic!("unexpected {other:?}"),
        }

        let unknown_model = CustomerOperation {
            model: "Order".into(),
            operation: "create".into(),
            data: json!({}),
        };
        assert_eq!(
            unknown_model.mutation(),
            Err(UnsupportedOperation::UnknownModel("Order".into()))
        );

        let unknown_op = CustomerOperation {
            model: "Customer".into(),
            operation: "archive".into(),
            data: json!({"_id": "c1"}),
        };
        assert_eq!(
            unknown_op.mutation(),
            Err(UnsupportedOperation::UnknownOperation("archive".into()))
        );
    }
}
