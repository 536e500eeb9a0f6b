//! Filter document → Predicate.
//!
//! Producers may submit an already-built filter document instead of a rule
//! list. Documents are normalized with the same repairs the translator applies:
//! operator keys such as `$<=` become `$lte`, numeric fields get quoted numbers
//! coerced, date fields get strings parsed. A multi-key object becomes an
//! explicit `And` of its clauses.

use serde_json::{Map, Value};

use crate::domain::errors::ValidationError;
use crate::domain::predicate::{Comparison, Predicate};
use crate::domain::rule::Operator;

use super::coerce::{coerce_json, extended_date};
use super::translator::{compare, text_match};

pub fn parse_document(doc: &Value) -> Result<Predicate, ValidationError> {
    let obj = doc
        .as_object()
        .ok_or_else(|| ValidationError::MalformedFilter(format!("expected an object, got {doc}")))?;

    let mut clauses = Vec::with_capacity(obj.len());
    for (key, value) in obj {
        match key.as_str() {
            "$and" => clauses.push(Predicate::And(parse_branches(key, value)?)),
            "$or" => clauses.push(Predicate::Or(parse_branches(key, value)?)),
            other if other.starts_with('$') => {
                return Err(ValidationError::MalformedFilter(format!(
                    "unsupported top-level operator '{other}'"
                )));
            }
            field => clauses.extend(parse_field(field, value)?),
        }
    }

    Ok(match clauses.len() {
        0 => Predicate::match_all(),
        1 => clauses.remove(0),
        _ => Predicate::And(clauses),
    })
}

// `$and` / `$or` take an array of documents; a lone object is accepted as a one-element array.
fn parse_branches(key: &str, value: &Value) -> Result<Vec<Predicate>, ValidationError> {
    match value {
        Value::Array(items) => items.iter().map(parse_document).collect(),
        Value::Object(_) => Ok(vec![parse_document(value)?]),
        other => Err(ValidationError::MalformedFilter(format!(
            "'{key}' expects an array, got {other}"
        ))),
    }
}

fn parse_field(field: &str, value: &Value) -> Result<Vec<Predicate>, ValidationError> {
    let ops = match value {
        Value::Object(ops) if extended_date(value).is_none() => ops,
        _ => {
            let value = coerce_json(field, value)?;
            return Ok(vec![Predicate::leaf(field, Comparison::Eq(value))]);
        }
    };

    if ops.is_empty() {
        return Err(ValidationError::MalformedFilter(format!(
            "field '{field}' has an empty condition"
        )));
    }

    let mut leaves = Vec::with_capacity(ops.len());
    for (key, operand) in ops {
        match key.as_str() {
            "$regex" => leaves.push(Predicate::leaf(field, regex_condition(field, operand, ops)?)),
            "$options" => {
                if !ops.contains_key("$regex") {
                    return Err(ValidationError::MalformedFilter(format!(
                        "'$options' without '$regex' on field '{field}'"
                    )));
                }
            }
            _ => {
                let operator = Operator::parse(key)?;
                let comparison = if operator.is_text_match() {
                    let text = operand.as_str().ok_or_else(|| ValidationError::InvalidValue {
                        field: field.to_string(),
                        value: operand.to_string(),
                        kind: "string",
                    })?;
                    text_match(operator, text)
                } else {
                    compare(operator, coerce_json(field, operand)?)
                };
                leaves.push(Predicate::leaf(field, comparison));
            }
        }
    }
    Ok(leaves)
}

fn regex_condition(
    field: &str,
    pattern: &Value,
    ops: &Map<String, Value>,
) -> Result<Comparison, ValidationError> {
    let pattern = pattern.as_str().ok_or_else(|| ValidationError::InvalidValue {
        field: field.to_string(),
        value: pattern.to_string(),
        kind: "pattern",
    })?;
    let case_insensitive = ops
        .get("$options")
        .and_then(Value::as_str)
        .is_some_and(|opts| opts.contains('i'));
    Ok(Comparison::Regex {
        pattern: pattern.to_string(),
        case_insensitive,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::predicate::FilterValue;
    use crate::domain::rule::Rule;
    use crate::filter::translate;
    use rstest::rstest;
    use serde_json::json;

    #[test]
    fn empty_document_matches_all() {
        assert!(parse_document(&json!({})).unwrap().is_match_all());
    }

    #[rstest]
    #[case("$<=", "$lte")]
    #[case("$>=", "$gte")]
    #[case("$=", "$eq")]
    #[case("$>", "$gt")]
    #[case("$<", "$lt")]
    #[case("$!=", "$ne")]
    fn repairs_malformed_operator_keys(#[case] broken: &str, #[case] canonical: &str) {
        let doc = json!({ "spend": { broken: "\"250\"" } });
        let predicate = parse_document(&doc).unwrap();
        let expected = if canonical == "$eq" {
            json!({ "spend": 250 })
        } else {
            json!({ "spend": { canonical: 250 } })
        };
        assert_eq!(predicate.to_document(), expected);
    }

    #[test]
    fn multi_key_object_is_explicit_and() {
        let predicate = parse_document(&json!({"source": "web", "spend": {"$gt": 10}})).unwrap();
        assert!(matches!(predicate, Predicate::And(ref v) if v.len() == 2));
        assert!(predicate.simplified().is_match_all());
    }

    #[test]
    fn several_operators_on_one_field() {
        let predicate = parse_document(&json!({"spend": {"$gte": 10, "$lt": 20}})).unwrap();
        assert_eq!(predicate.conditions().len(), 2);
    }

    #[test]
    fn plain_equality_on_untyped_field_keeps_json_type() {
        let predicate = parse_document(&json!({"subscribed": true})).unwrap();
        assert_eq!(
            predicate,
            Predicate::leaf("subscribed", Comparison::Eq(FilterValue::Bool(true)))
        );
        assert_eq!(predicate.simplified(), predicate);
    }

    #[test]
    fn date_literal_is_a_value_not_an_operator() {
        let predicate =
            parse_document(&json!({"lastActive": {"$date": "2024-01-01T00:00:00.000Z"}})).unwrap();
        assert!(matches!(
            predicate,
            Predicate::Leaf(ref c) if matches!(c.comparison, Comparison::Eq(FilterValue::Date(_)))
        ));
    }

    #[test]
    fn rejects_malformed_documents() {
        assert!(matches!(
            parse_document(&json!([1, 2])),
            Err(ValidationError::MalformedFilter(_))
        ));
        assert!(matches!(
            parse_document(&json!({"$nor": []})),
            Err(ValidationError::MalformedFilter(_))
        ));
        assert!(matches!(
            parse_document(&json!({"spend": {"$near": 1}})),
            Err(ValidationError::UnknownOperator(_))
        ));
        assert!(matches!(
            parse_document(&json!({"source": {"$options": "i"}})),
            Err(ValidationError::MalformedFilter(_))
        ));
    }

    #[test]
    fn translated_predicates_survive_the_document_form() {
        let rules = vec![
            Rule::new("spend", ">", "1000").and(),
            Rule::new("lastActive", ">=", "2024-01-01").or(),
            Rule::new("source", "startsWith", "web").and(),
            Rule::new("orders", "=", "2"),
        ];
        let predicate = translate(&rules).unwrap();
        assert_eq!(parse_document(&predicate.to_document()).unwrap(), predicate);
    }
}
