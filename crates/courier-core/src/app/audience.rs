//! AudienceResolver - predicate to audience, with one degraded retry.

use std::sync::Arc;

use tracing::{info, warn};

use crate::domain::customer::AudienceMember;
use crate::domain::errors::ResolutionError;
use crate::domain::predicate::Predicate;
use crate::ports::CustomerStore;

/// The resolved audience.
///
/// `degraded` is set when the full predicate failed and the members come from
/// `Predicate::simplified()`, i.e. a broader audience than requested.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub members: Vec<AudienceMember>,
    pub degraded: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudienceCount {
    pub count: usize,
    pub degraded: bool,
}

pub struct AudienceResolver {
    store: Arc<dyn CustomerStore>,
}

impl AudienceResolver {
    pub fn new(store: Arc<dyn CustomerStore>) -> Self {
        Self { store }
    }

    pub async fn resolve(&self, predicate: &Predicate) -> Result<Resolution, ResolutionError> {
        let full = match self.store.find(predicate).await {
            Ok(members) => {
                return Ok(Resolution {
                    members,
                    degraded: false,
                });
            }
            Err(e) => e,
        };

        let simplified = predicate.simplified();
        warn!(
            error = %full,
            filter = %predicate.to_document(),
            fallback = %simplified.to_document(),
            "audience query failed, retrying with simplified filter"
        );

        match self.store.find(&simplified).await {
            Ok(members) => {
                info!(members = members.len(), "degraded audience resolved");
                Ok(Resolution {
                    members,
                    degraded: true,
                })
            }
            Err(simplified) => Err(ResolutionError { full, simplified }),
        }
    }

    /// Same degradation as `resolve`, without materializing members.
    pub async fn count(&self, predicate: &Predicate) -> Result<AudienceCount, ResolutionError> {
        let full = match self.store.count(predicate).await {
            Ok(count) => {
                return Ok(AudienceCount {
                    count,
                    degraded: false,
                });
            }
            Err(e) => e,
        };

        warn!(error = %full, "audience count failed, retrying with simplified filter");
        self.store
            .count(&predicate.simplified())
            .await
            .map(|count| AudienceCount {
                count,
                degraded: true,
            })
            .map_err(|simplified| ResolutionError { full, simplified })
    }
}
