//! Rule list → Predicate.
//!
//! Grouping is strictly left to right. The connector on rule `i` joins it to
//! rule `i + 1`:
//!
//! - AND-joined rules accumulate into one conjunctive group
//! - an OR closes the current group and opens a new one
//!
//! If any OR was seen the result is `Or(groups)`; otherwise it is the single
//! group (`And` for several rules, the bare leaf for one). A group holding a
//! single rule is emitted as that leaf.

use crate::domain::errors::ValidationError;
use crate::domain::field::FieldKind;
use crate::domain::predicate::{Comparison, FilterValue, Predicate};
use crate::domain::rule::{Connector, Operator, Rule};

use super::coerce::coerce_text;

/// Translate a rule list into a normalized predicate.
///
/// Pure: the same rules always yield a structurally identical predicate.
pub fn translate(rules: &[Rule]) -> Result<Predicate, ValidationError> {
    if rules.is_empty() {
        return Err(ValidationError::EmptyRules);
    }

    let mut groups: Vec<Vec<Predicate>> = Vec::new();
    let mut current: Vec<Predicate> = Vec::new();
    let mut saw_or = false;

    for (index, rule) in rules.iter().enumerate() {
        current.push(translate_rule(index, rule)?);

        let is_last = index + 1 == rules.len();
        if !is_last && rule.connector == Some(Connector::Or) {
            groups.push(std::mem::take(&mut current));
            saw_or = true;
        }
    }
    groups.push(current);

    if saw_or {
        Ok(Predicate::Or(groups.into_iter().map(group).collect()))
    } else {
        Ok(groups.into_iter().next().map(group).unwrap_or_else(Predicate::match_all))
    }
}

fn group(mut members: Vec<Predicate>) -> Predicate {
    if members.len() == 1 {
        members.remove(0)
    } else {
        Predicate::And(members)
    }
}

/// Build the leaf for one rule.
pub fn translate_rule(index: usize, rule: &Rule) -> Result<Predicate, ValidationError> {
    let field = rule.field.trim();
    if field.is_empty() {
        return Err(ValidationError::IncompleteRule { index, field: "field" });
    }
    if rule.operator.trim().is_empty() {
        return Err(ValidationError::IncompleteRule { index, field: "operator" });
    }

    let kind = FieldKind::of(field).ok_or_else(|| ValidationError::UnknownField(field.to_string()))?;
    let operator = Operator::parse(&rule.operator)?;

    let comparison = if operator.is_text_match() {
        if kind != FieldKind::Text {
            return Err(ValidationError::UnsupportedOperator {
                field: field.to_string(),
                operator: operator.to_string(),
                kind: kind.name(),
            });
        }
        text_match(operator, &rule.value)
    } else {
        compare(operator, coerce_text(field, kind, &rule.value)?)
    };

    Ok(Predicate::leaf(field, comparison))
}

/// Case-insensitive substring/prefix/suffix match. The value is matched literally.
pub(crate) fn text_match(operator: Operator, value: &str) -> Comparison {
    let escaped = regex::escape(value);
    let pattern = match operator {
        Operator::StartsWith => format!("^{escaped}"),
        Operator::EndsWith => format!("{escaped}$"),
        _ => escaped,
    };
    Comparison::Regex {
        pattern,
        case_insensitive: true,
    }
}

pub(crate) fn compare(operator: Operator, value: FilterValue) -> Comparison {
    match operator {
        Operator::Gt => Comparison::Gt(value),
        Operator::Lt => Comparison::Lt(value),
        Operator::Gte => Comparison::Gte(value),
        Operator::Lte => Comparison::Lte(value),
        Operator::Ne => Comparison::Ne(value),
        // text-match operators are routed through `text_match` before this point
        Operator::Eq | Operator::Contains | Operator::StartsWith | Operator::EndsWith => {
            Comparison::Eq(value)
        }
    }
}
