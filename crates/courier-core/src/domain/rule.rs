//! User-authored filter rules.
//!
//! A rule list is what a segment form submits: `field`, `operator`, `value`,
//! and an optional connector joining the rule to the *next* one. Rules are kept
//! exactly as submitted; all repair and coercion happens in the translator.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

use super::errors::ValidationError;

/// Connector between rule `i` and rule `i + 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Connector {
    #[serde(rename = "AND", alias = "and", alias = "And")]
    And,
    #[serde(rename = "OR", alias = "or", alias = "Or")]
    Or,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    pub field: String,
    pub operator: String,
    #[serde(deserialize_with = "string_or_number")]
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connector: Option<Connector>,
}

impl Rule {
    pub fn new(field: impl Into<String>, operator: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            operator: operator.into(),
            value: value.into(),
            connector: None,
        }
    }

    pub fn and(mut self) -> Self {
        self.connector = Some(Connector::And);
        self
    }

    pub fn or(mut self) -> Self {
        self.connector = Some(Connector::Or);
        self
    }
}

/// Canonical rule operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Gt,
    Lt,
    Eq,
    Gte,
    Lte,
    Ne,
    Contains,
    StartsWith,
    EndsWith,
}

impl Operator {
    /// Parse an operator token, repairing malformed spellings.
    ///
    /// Accepts the symbolic form (`>=`), the store form (`$gte`, `gte`) and the
    /// broken form produced by naive string prefixing (`$>=`).
    pub fn parse(token: &str) -> Result<Operator, ValidationError> {
        let trimmed = token.trim();
        let bare = trimmed.strip_prefix('$').unwrap_or(trimmed);
        let op = match bare {
            ">" | "gt" => Operator::Gt,
            "<" | "lt" => Operator::Lt,
            "=" | "==" | "eq" => Operator::Eq,
            ">=" | "=>" | "gte" => Operator::Gte,
            "<=" | "=<" | "lte" => Operator::Lte,
            "!=" | "<>" | "ne" => Operator::Ne,
            other if other.eq_ignore_ascii_case("contains") => Operator::Contains,
            other if other.eq_ignore_ascii_case("startsWith") => Operator::StartsWith,
            other if other.eq_ignore_ascii_case("endsWith") => Operator::EndsWith,
            _ => return Err(ValidationError::UnknownOperator(token.to_string())),
        };
        Ok(op)
    }

    /// Operators that only make sense on string fields.
    pub fn is_text_match(self) -> bool {
        matches!(
            self,
            Operator::Contains | Operator::StartsWith | Operator::EndsWith
        )
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Operator::Gt => ">",
            Operator::Lt => "<",
            Operator::Eq => "=",
            Operator::Gte => ">=",
            Operator::Lte => "<=",
            Operator::Ne => "!=",
            Operator::Contains => "contains",
            Operator::StartsWith => "startsWith",
            Operator::EndsWith => "endsWith",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

fn string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(serde_json::Number),
        Bool(bool),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Text(s) => s,
        Raw::Number(n) => n.to_string(),
        Raw::Bool(b) => b.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(">", Operator::Gt)]
    #[case("$>", Operator::Gt)]
    #[case("$gt", Operator::Gt)]
    #[case("<", Operator::Lt)]
    #[case("$<", Operator::Lt)]
    #[case("=", Operator::Eq)]
    #[case("$=", Operator::Eq)]
    #[case("$eq", Operator::Eq)]
    #[case(">=", Operator::Gte)]
    #[case("$>=", Operator::Gte)]
    #[case("<=", Operator::Lte)]
    #[case("$<=", Operator::Lte)]
    #[case("$lte", Operator::Lte)]
    #[case("!=", Operator::Ne)]
    #[case("$ne", Operator::Ne)]
    #[case(" >= ", Operator::Gte)]
    #[case("contains", Operator::Contains)]
    #[case("startsWith", Operator::StartsWith)]
    #[case("endswith", Operator::EndsWith)]
    fn repairs_operator_tokens(#[case] token: &str, #[case] expected: Operator) {
        assert_eq!(Operator::parse(token).unwrap(), expected);
    }

    #[test]
    fn rejects_unknown_operator() {
        let err = Operator::parse("~=").unwrap_err();
        assert_eq!(err, ValidationError::UnknownOperator("~=".to_string()));
    }

    #[test]
    fn rule_accepts_numeric_value_and_connector() {
        let rule: Rule = serde_json::from_value(serde_json::json!({
            "field": "spend",
            "operator": ">",
            "value": 1000,
            "connector": "OR"
        }))
        .unwrap();

        assert_eq!(rule.value, "1000");
        assert_eq!(rule.connector, Some(Connector::Or));
    }
}
