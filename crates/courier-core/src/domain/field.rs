//! Customer field classification.
//!
//! The table is fixed: it decides how a rule value is coerced and therefore
//! what the store is asked to compare.

use std::fmt;

/// Declared type of a filterable customer field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    Numeric,
    Date,
    Text,
}

pub const NUMERIC_FIELDS: &[&str] = &["spend", "visits", "orders", "avg_order_value", "clv"];

pub const DATE_FIELDS: &[&str] = &[
    "lastActive",
    "createdAt",
    "updatedAt",
    "customer_since",
    "last_order",
];

pub const TEXT_FIELDS: &[&str] = &["preferred_category", "source"];

/// Numeric fields whose values are counts; coerced values are truncated.
pub const INTEGER_FIELDS: &[&str] = &["visits", "orders"];

impl FieldKind {
    /// Look up the declared kind of a filterable field.
    pub fn of(field: &str) -> Option<FieldKind> {
        if NUMERIC_FIELDS.contains(&field) {
            Some(FieldKind::Numeric)
        } else if DATE_FIELDS.contains(&field) {
            Some(FieldKind::Date)
        } else if TEXT_FIELDS.contains(&field) {
            Some(FieldKind::Text)
        } else {
            None
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            FieldKind::Numeric => "numeric",
            FieldKind::Date => "date",
            FieldKind::Text => "string",
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

pub fn is_integer_field(field: &str) -> bool {
    INTEGER_FIELDS.contains(&field)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("spend", Some(FieldKind::Numeric))]
    #[case("visits", Some(FieldKind::Numeric))]
    #[case("orders", Some(FieldKind::Numeric))]
    #[case("avg_order_value", Some(FieldKind::Numeric))]
    #[case("clv", Some(FieldKind::Numeric))]
    #[case("lastActive", Some(FieldKind::Date))]
    #[case("createdAt", Some(FieldKind::Date))]
    #[case("updatedAt", Some(FieldKind::Date))]
    #[case("customer_since", Some(FieldKind::Date))]
    #[case("last_order", Some(FieldKind::Date))]
    #[case("preferred_category", Some(FieldKind::Text))]
    #[case("source", Some(FieldKind::Text))]
    #[case("email", None)]
    #[case("Spend", None)]
    fn classifies_fields(#[case] field: &str, #[case] expected: Option<FieldKind>) {
        assert_eq!(FieldKind::of(field), expected);
    }
}
