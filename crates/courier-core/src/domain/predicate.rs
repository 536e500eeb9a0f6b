//! Normalized filter predicate.
//!
//! A `Predicate` is the typed form of a store filter document. Values are
//! already coerced to the declared type of their field, and operators are
//! already canonical, so a store adapter never has to guess.
//!
//! Document form (what goes over the wire and into the queue):
//!
//! ```text
//! {}                                      match all
//! {"$and": [..]} / {"$or": [..]}          composition
//! {"orders": 2}                           equality
//! {"spend": {"$gt": 1000}}                comparison
//! {"source": {"$regex": "^web", "$options": "i"}}
//! {"lastActive": {"$gte": {"$date": "2024-01-01T00:00:00.000Z"}}}
//! ```

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value, json};

use super::errors::ValidationError;
use super::field::FieldKind;

/// A coerced filter value.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    Number(f64),
    Date(DateTime<Utc>),
    Text(String),
    Bool(bool),
}

impl FilterValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            FilterValue::Number(_) => "number",
            FilterValue::Date(_) => "date",
            FilterValue::Text(_) => "string",
            FilterValue::Bool(_) => "boolean",
        }
    }

    /// Whether this value has the type a field of `kind` declares.
    pub fn matches_kind(&self, kind: FieldKind) -> bool {
        matches!(
            (self, kind),
            (FilterValue::Number(_), FieldKind::Numeric)
                | (FilterValue::Date(_), FieldKind::Date)
                | (FilterValue::Text(_), FieldKind::Text)
        )
    }

    pub fn to_document(&self) -> Value {
        match self {
            FilterValue::Number(n) => number_value(*n),
            FilterValue::Date(d) => json!({ "$date": d.to_rfc3339_opts(SecondsFormat::Millis, true) }),
            FilterValue::Text(s) => Value::String(s.clone()),
            FilterValue::Bool(b) => Value::Bool(*b),
        }
    }
}

// Integral values serialize as JSON integers so `{"orders": 2}` stays `2`, not `2.0`.
fn number_value(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
        Value::from(n as i64)
    } else {
        serde_json::Number::from_f64(n)
            .map(Value::Number)
            .unwrap_or(Value::Null)
    }
}

/// A single field test.
#[derive(Debug, Clone, PartialEq)]
pub enum Comparison {
    Eq(FilterValue),
    Ne(FilterValue),
    Gt(FilterValue),
    Gte(FilterValue),
    Lt(FilterValue),
    Lte(FilterValue),
    Regex {
        pattern: String,
        case_insensitive: bool,
    },
}

impl Comparison {
    pub fn value(&self) -> Option<&FilterValue> {
        match self {
            Comparison::Eq(v)
            | Comparison::Ne(v)
            | Comparison::Gt(v)
            | Comparison::Gte(v)
            | Comparison::Lt(v)
            | Comparison::Lte(v) => Some(v),
            Comparison::Regex { .. } => None,
        }
    }

    /// Store operator key (`$gt`, `$regex`, ...). Equality has no key in document form.
    pub fn operator_key(&self) -> &'static str {
        match self {
            Comparison::Eq(_) => "$eq",
            Comparison::Ne(_) => "$ne",
            Comparison::Gt(_) => "$gt",
            Comparison::Gte(_) => "$gte",
            Comparison::Lt(_) => "$lt",
            Comparison::Lte(_) => "$lte",
            Comparison::Regex { .. } => "$regex",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub field: String,
    pub comparison: Comparison,
}

impl Condition {
    pub fn new(field: impl Into<String>, comparison: Comparison) -> Self {
        Self {
            field: field.into(),
            comparison,
        }
    }

    fn to_document(&self) -> Value {
        let test = match &self.comparison {
            Comparison::Eq(v) => v.to_document(),
            Comparison::Regex {
                pattern,
                case_insensitive,
            } => {
                let mut ops = Map::new();
                ops.insert("$regex".into(), Value::String(pattern.clone()));
                if *case_insensitive {
                    ops.insert("$options".into(), Value::String("i".into()));
                }
                Value::Object(ops)
            }
            other => {
                let mut ops = Map::new();
                if let Some(v) = other.value() {
                    ops.insert(other.operator_key().into(), v.to_document());
                }
                Value::Object(ops)
            }
        };
        let mut doc = Map::new();
        doc.insert(self.field.clone(), test);
        Value::Object(doc)
    }
}

/// Normalized predicate tree. Built once per filter submission, never mutated.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
    Leaf(Condition),
}

impl Predicate {
    /// The empty conjunction; matches every record.
    pub fn match_all() -> Self {
        Predicate::And(Vec::new())
    }

    pub fn leaf(field: impl Into<String>, comparison: Comparison) -> Self {
        Predicate::Leaf(Condition::new(field, comparison))
    }

    pub fn is_match_all(&self) -> bool {
        matches!(self, Predicate::And(children) if children.is_empty())
    }

    /// All leaf conditions, depth first, left to right.
    pub fn conditions(&self) -> Vec<&Condition> {
        let mut out = Vec::new();
        self.collect_conditions(&mut out);
        out
    }

    fn collect_conditions<'a>(&'a self, out: &mut Vec<&'a Condition>) {
        match self {
            Predicate::And(children) | Predicate::Or(children) => {
                for child in children {
                    child.collect_conditions(out);
                }
            }
            Predicate::Leaf(condition) => out.push(condition),
        }
    }

    /// Degraded form used when the full predicate cannot be executed.
    ///
    /// Keeps a top-level equality leaf on a non-numeric field whose value is a
    /// plain string or boolean. Anything else (operators, numeric comparisons,
    /// composition) collapses to match-all, trading precision for a result.
    pub fn simplified(&self) -> Predicate {
        match self {
            Predicate::Leaf(Condition {
                field,
                comparison: Comparison::Eq(value @ (FilterValue::Text(_) | FilterValue::Bool(_))),
            }) if FieldKind::of(field) != Some(FieldKind::Numeric) => {
                Predicate::leaf(field.clone(), Comparison::Eq(value.clone()))
            }
            _ => Predicate::match_all(),
        }
    }

    pub fn to_document(&self) -> Value {
        match self {
            Predicate::And(children) if children.is_empty() => Value::Object(Map::new()),
            Predicate::And(children) => {
                json!({ "$and": children.iter().map(Predicate::to_document).collect::<Vec<_>>() })
            }
            Predicate::Or(children) => {
                json!({ "$or": children.iter().map(Predicate::to_document).collect::<Vec<_>>() })
            }
            Predicate::Leaf(condition) => condition.to_document(),
        }
    }

    /// Parse and normalize a filter document. See [`crate::filter::normalize`].
    pub fn from_document(doc: &Value) -> Result<Predicate, ValidationError> {
        crate::filter::normalize::parse_document(doc)
    }
}

impl Serialize for Predicate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_document().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Predicate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let doc = Value::deserialize(deserializer)?;
        Predicate::from_document(&doc).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn document_form_of_composed_predicate() {
        let predicate = Predicate::Or(vec![
            Predicate::And(vec![
                Predicate::leaf("spend", Comparison::Gt(FilterValue::Number(1000.0))),
                Predicate::leaf("visits", Comparison::Lt(FilterValue::Number(5.0))),
            ]),
            Predicate::leaf("orders", Comparison::Eq(FilterValue::Number(2.0))),
        ]);

        assert_eq!(
            predicate.to_document(),
            json!({"$or": [
                {"$and": [{"spend": {"$gt": 1000}}, {"visits": {"$lt": 5}}]},
                {"orders": 2}
            ]})
        );
    }

    #[test]
    fn dates_use_extended_json() {
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let predicate = Predicate::leaf("lastActive", Comparison::Gte(FilterValue::Date(at)));

        assert_eq!(
            predicate.to_document(),
            json!({"lastActive": {"$gte": {"$date": "2024-01-01T00:00:00.000Z"}}})
        );
    }

    #[test]
    fn match_all_is_empty_document() {
        assert_eq!(Predicate::match_all().to_document(), json!({}));
    }

    #[test]
    fn simplified_keeps_plain_string_equality() {
        let predicate = Predicate::leaf("source", Comparison::Eq(FilterValue::Text("web".into())));
        assert_eq!(predicate.simplified(), predicate);
    }

    #[test]
    fn simplified_drops_operators_and_composition() {
        let comparison = Predicate::leaf("spend", Comparison::Gt(FilterValue::Number(10.0)));
        assert!(comparison.simplified().is_match_all());

        let composed = Predicate::And(vec![
            Predicate::leaf("source", Comparison::Eq(FilterValue::Text("web".into()))),
            Predicate::leaf("spend", Comparison::Gt(FilterValue::Number(10.0))),
        ]);
        assert!(composed.simplified().is_match_all());

        let regex = Predicate::leaf(
            "source",
            Comparison::Regex {
                pattern: "^web".into(),
                case_insensitive: true,
            },
        );
        assert!(regex.simplified().is_match_all());
    }

    #[test]
    fn simplified_drops_numeric_equality() {
        let predicate = Predicate::leaf("orders", Comparison::Eq(FilterValue::Number(2.0)));
        assert!(predicate.simplified().is_match_all());
    }

    #[test]
    fn serde_round_trip_goes_through_document_form() {
        let predicate = Predicate::leaf(
            "source",
            Comparison::Regex {
                pattern: "^web".into(),
                case_insensitive: true,
            },
        );
        let json = serde_json::to_value(&predicate).unwrap();
        assert_eq!(json, json!({"source": {"$regex": "^web", "$options": "i"}}));

        let back: Predicate = serde_json::from_value(json).unwrap();
        assert_eq!(back, predicate);
    }
}
