//! CustomerStore port - the customer collection.

use async_trait::async_trait;

use crate::domain::customer::{AudienceMember, CustomerMutation};
use crate::domain::errors::StoreError;
use crate::domain::predicate::Predicate;

/// What one `apply_batch` call changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MutationReport {
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
    /// Updates and deletes whose target did not exist (not an error).
    pub missing: usize,
}

/// CustomerStore executes predicates and applies queued mutations.
///
/// # Contract
/// - `find` / `count` are read-only. A predicate the store cannot evaluate
///   (type mismatch, bad pattern) is an error, not an empty result
/// - `find` projects identity and contact fields only
/// - `apply_batch` runs the mutations in order inside one transaction: either
///   every mutation is applied or none is. Creating an existing id aborts it
#[async_trait]
pub trait CustomerStore: Send + Sync {
    async fn find(&self, predicate: &Predicate) -> Result<Vec<AudienceMember>, StoreError>;

    async fn count(&self, predicate: &Predicate) -> Result<usize, StoreError>;

    async fn apply_batch(&self, mutations: &[CustomerMutation]) -> Result<MutationReport, StoreError>;
}
