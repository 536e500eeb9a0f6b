//! InMemoryCustomerStore - customer collection for development and tests.
//!
//! Evaluates predicates the way a document store would, including its
//! failure modes: ordering comparisons across types and invalid patterns are
//! query errors.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use regex::{Regex, RegexBuilder};
use serde_json::Value;
use tokio::sync::RwLock;

use crate::domain::customer::{AudienceMember, Customer, CustomerMutation};
use crate::domain::errors::StoreError;
use crate::domain::predicate::{Comparison, Condition, FilterValue, Predicate};
use crate::ports::{CustomerStore, MutationReport};

#[derive(Default)]
pub struct InMemoryCustomerStore {
    customers: RwLock<BTreeMap<String, Customer>>,
}

impl InMemoryCustomerStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_customers(customers: impl IntoIterator<Item = Customer>) -> Self {
        let map = customers.into_iter().map(|c| (c.id.clone(), c)).collect();
        Self {
            customers: RwLock::new(map),
        }
    }

    pub async fn get(&self, id: &str) -> Option<Customer> {
        self.customers.read().await.get(id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.customers.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.customers.read().await.is_empty()
    }

    async fn matching(&self, predicate: &Predicate) -> Result<Vec<Customer>, StoreError> {
        let compiled = CompiledPredicate::new(predicate)?;
        let customers = self.customers.read().await;
        let mut out = Vec::new();
        for customer in customers.values() {
            if compiled.matches(customer)? {
                out.push(customer.clone());
            }
        }
        Ok(out)
    }
}

#[async_trait]
impl CustomerStore for InMemoryCustomerStore {
    async fn find(&self, predicate: &Predicate) -> Result<Vec<AudienceMember>, StoreError> {
        let matched = self.matching(predicate).await?;
        Ok(matched.iter().map(Customer::audience_member).collect())
    }

    async fn count(&self, predicate: &Predicate) -> Result<usize, StoreError> {
        Ok(self.matching(predicate).await?.len())
    }

    async fn apply_batch(&self, mutations: &[CustomerMutation]) -> Result<MutationReport, StoreError> {
        let mut customers = self.customers.write().await;

        // work on a copy; only a fully successful batch is committed
        let mut staged = customers.clone();
        let mut report = MutationReport::default();

        for mutation in mutations {
            match mutation {
                CustomerMutation::Create(customer) => {
                    if staged.contains_key(&customer.id) {
                        return Err(StoreError::Duplicate(customer.id.clone()));
                    }
                    staged.insert(customer.id.clone(), customer.clone());
                    report.created += 1;
                }
                CustomerMutation::Update { id, patch } => match staged.get_mut(id) {
                    Some(existing) => {
                        *existing = patched(existing, patch)?;
                        report.updated += 1;
                    }
                    None => report.missing += 1,
                },
                CustomerMutation::Delete { id } => {
                    if staged.remove(id).is_some() {
                        report.deleted += 1;
                    } else {
                        report.missing += 1;
                    }
                }
            }
        }

        *customers = staged;
        Ok(report)
    }
}

fn patched(existing: &Customer, patch: &serde_json::Map<String, Value>) -> Result<Customer, StoreError> {
    let mut doc = serde_json::to_value(existing).map_err(|e| StoreError::InvalidRecord(e.to_string()))?;
    if let Value::Object(fields) = &mut doc {
        for (key, value) in patch {
            if value.is_null() {
                fields.remove(key);
            } else {
                fields.insert(key.clone(), value.clone());
            }
        }
    }
    serde_json::from_value(doc).map_err(|e| StoreError::InvalidRecord(format!("{}: {e}", existing.id)))
}

/// A predicate with its patterns compiled once per query.
struct CompiledPredicate<'a> {
    predicate: &'a Predicate,
    patterns: HashMap<(&'a str, bool), Regex>,
}

impl<'a> CompiledPredicate<'a> {
    fn new(predicate: &'a Predicate) -> Result<Self, StoreError> {
        let mut patterns = HashMap::new();
        for condition in predicate.conditions() {
            if let Comparison::Regex {
                pattern,
                case_insensitive,
            } = &condition.comparison
            {
                let key = (pattern.as_str(), *case_insensitive);
                if patterns.contains_key(&key) {
                    continue;
                }
                let regex = RegexBuilder::new(pattern)
                    .case_insensitive(*case_insensitive)
                    .build()
                    .map_err(|e| StoreError::InvalidPattern {
                        field: condition.field.clone(),
                        message: e.to_string(),
                    })?;
                patterns.insert(key, regex);
            }
        }
        Ok(Self { predicate, patterns })
    }

    fn matches(&self, customer: &Customer) -> Result<bool, StoreError> {
        self.eval(self.predicate, customer)
    }

    fn eval(&self, predicate: &'a Predicate, customer: &Customer) -> Result<bool, StoreError> {
        match predicate {
            Predicate::And(children) => {
                for child in children {
                    if !self.eval(child, customer)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            Predicate::Or(children) => {
                for child in children {
                    if self.eval(child, customer)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            Predicate::Leaf(condition) => self.eval_condition(condition, customer),
        }
    }

    fn eval_condition(&self, condition: &'a Condition, customer: &Customer) -> Result<bool, StoreError> {
        let stored = customer.field_value(&condition.field);

        match &condition.comparison {
            Comparison::Eq(expected) => Ok(stored.as_ref().is_some_and(|v| same(v, expected))),
            Comparison::Ne(expected) => Ok(!stored.as_ref().is_some_and(|v| same(v, expected))),
            Comparison::Regex {
                pattern,
                case_insensitive,
            } => {
                let Some(FilterValue::Text(text)) = stored else {
                    return Ok(false);
                };
                Ok(self
                    .patterns
                    .get(&(pattern.as_str(), *case_insensitive))
                    .is_some_and(|re| re.is_match(&text)))
            }
            ordering => {
                let (Some(stored), Some(bound)) = (stored, ordering.value()) else {
                    return Ok(false);
                };
                let ord = order(&condition.field, &stored, bound)?;
                Ok(match ordering {
                    Comparison::Gt(_) => ord == Ordering::Greater,
                    Comparison::Gte(_) => ord != Ordering::Less,
                    Comparison::Lt(_) => ord == Ordering::Less,
                    Comparison::Lte(_) => ord != Ordering::Greater,
                    _ => false,
                })
            }
        }
    }
}

fn same(stored: &FilterValue, expected: &FilterValue) -> bool {
    match (stored, expected) {
        (FilterValue::Number(a), FilterValue::Number(b)) => a == b,
        (FilterValue::Date(a), FilterValue::Date(b)) => a == b,
        (FilterValue::Text(a), FilterValue::Text(b)) => a == b,
        (FilterValue::Bool(a), FilterValue::Bool(b)) => a == b,
        _ => false,
    }
}

fn order(field: &str, stored: &FilterValue, bound: &FilterValue) -> Result<Ordering, StoreError> {
    let ord = match (stored, bound) {
        (FilterValue::Number(a), FilterValue::Number(b)) => a.partial_cmp(b),
        (FilterValue::Date(a), FilterValue::Date(b)) => Some(a.cmp(b)),
        (FilterValue::Text(a), FilterValue::Text(b)) => Some(a.cmp(b)),
        _ => None,
    };
    ord.ok_or_else(|| StoreError::TypeMismatch {
        field: field.to_string(),
        stored: stored.type_name(),
        filter: bound.type_name(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::customer::Channel;
    use crate::domain::rule::Rule;
    use crate::filter::{parse_document, translate};
    use serde_json::json;

    fn customer(id: &str, spend: f64, visits: f64, source: &str, phone: Option<&str>) -> Customer {
        let mut c = Customer::new(id, format!("Customer {id}"));
        c.spend = Some(spend);
        c.visits = Some(visits);
        c.source = Some(source.to_string());
        c.phone = phone.map(str::to_string);
        c.email = Some(format!("{id}@example.com"));
        c
    }

    fn store() -> InMemoryCustomerStore {
        InMemoryCustomerStore::with_customers([
            customer("c1", 1500.0, 2.0, "web", Some("+1555")),
            customer("c2", 200.0, 9.0, "Webinar", None),
            customer("c3", 5000.0, 12.0, "store", None),
        ])
    }

    fn ids(members: &[AudienceMember]) -> Vec<&str> {
        members.iter().map(|m| m.customer_id.as_str()).collect()
    }

    #[tokio::test]
    async fn finds_translated_predicates() {
        let store = store();
        let predicate = translate(&[
            Rule::new("spend", ">", "1000").and(),
            Rule::new("visits", "<", "5").or(),
            Rule::new("source", "=", "store"),
        ])
        .unwrap();

        let members = store.find(&predicate).await.unwrap();
        assert_eq!(ids(&members), vec!["c1", "c3"]);
        assert_eq!(members[0].channel, Channel::Sms);
        assert_eq!(members[1].channel, Channel::Email);
    }

    #[tokio::test]
    async fn text_patterns_are_case_insensitive() {
        let store = store();
        let predicate = translate(&[Rule::new("source", "startsWith", "WEB")]).unwrap();
        assert_eq!(store.count(&predicate).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn match_all_returns_everyone() {
        assert_eq!(store().count(&Predicate::match_all()).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn ordering_across_types_is_a_query_error() {
        let predicate = parse_document(&json!({"email": {"$gt": 5}})).unwrap();
        let err = store().find(&predicate).await.unwrap_err();
        assert!(matches!(err, StoreError::TypeMismatch { stored: "string", filter: "number", .. }));
    }

    #[tokio::test]
    async fn invalid_pattern_is_a_query_error() {
        let predicate = parse_document(&json!({"source": {"$regex": "(unclosed"}})).unwrap();
        let err = store().count(&predicate).await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidPattern { .. }));
    }

    #[tokio::test]
    async fn apply_batch_is_all_or_nothing() {
        let store = store();

        let report = store
            .apply_batch(&[
                CustomerMutation::Update {
                    id: "c1".into(),
                    patch: json!({"spend": "99"}).as_object().cloned().unwrap(),
                },
                CustomerMutation::Delete { id: "c2".into() },
                CustomerMutation::Delete { id: "ghost".into() },
                CustomerMutation::Create(customer("c4", 1.0, 1.0, "web", None)),
            ])
            .await
            .unwrap();

        assert_eq!(
            report,
            MutationReport {
                created: 1,
                updated: 1,
                deleted: 1,
                missing: 1
            }
        );
        assert_eq!(store.get("c1").await.unwrap().spend, Some(99.0));
        assert!(store.get("c2").await.is_none());

        let err = store
            .apply_batch(&[
                CustomerMutation::Delete { id: "c3".into() },
                CustomerMutation::Create(customer("c1", 1.0, 1.0, "web", None)),
            ])
            .await
            .unwrap_err();
        assert_eq!(err, StoreError::Duplicate("c1".into()));
        assert!(store.get("c3").await.is_some(), "failed batch must not leak writes");
    }
}
