//! Generated identifiers (strongly-typed, ULID based).
//!
//! `Id<T>` carries a ULID plus a zero-sized marker so that a `SendId` can never
//! be passed where a `BatchId` is expected. Display adds a per-kind prefix
//! (`send-01J...`), and serde uses the same prefixed string so that ids
//! survive the JSON hop through the work queue and the receipt ingress.
//!
//! Identifiers owned by external systems (customers, segments, campaigns) are
//! plain strings and live on their records; only ids minted by the pipeline
//! itself use this type. A campaign created by the pipeline gets a
//! `CampaignId` and stores its string form.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::marker::PhantomData;
use std::str::FromStr;
use ulid::Ulid;

/// Marker trait providing the display prefix for an id kind.
pub trait IdMarker: Send + Sync + 'static {
    fn prefix() -> &'static str;
}

#[repr(transparent)]
pub struct Id<T: IdMarker> {
    ulid: Ulid,
    _marker: PhantomData<T>,
}

impl<T: IdMarker> Id<T> {
    pub fn from_ulid(ulid: Ulid) -> Self {
        Self {
            ulid,
            _marker: PhantomData,
        }
    }

    pub fn as_ulid(&self) -> Ulid {
        self.ulid
    }
}

// Manual impls: derives would put bounds on `T`, which is an uninhabited marker.
impl<T: IdMarker> Clone for Id<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T: IdMarker> Copy for Id<T> {}

impl<T: IdMarker> PartialEq for Id<T> {
    fn eq(&self, other: &Self) -> bool {
        self.ulid == other.ulid
    }
}

impl<T: IdMarker> Eq for Id<T> {}

impl<T: IdMarker> std::hash::Hash for Id<T> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.ulid.hash(state);
    }
}

impl<T: IdMarker> PartialOrd for Id<T> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl<T: IdMarker> Ord for Id<T> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.ulid.cmp(&other.ulid)
    }
}

impl<T: IdMarker> From<Ulid> for Id<T> {
    fn from(ulid: Ulid) -> Self {
        Self::from_ulid(ulid)
    }
}

impl<T: IdMarker> fmt::Debug for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", T::prefix(), self.ulid)
    }
}

impl<T: IdMarker> fmt::Display for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", T::prefix(), self.ulid)
    }
}

/// Error returned when a prefixed id string cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid {expected_prefix} id: {value}")]
pub struct ParseIdError {
    pub expected_prefix: &'static str,
    pub value: String,
}

impl<T: IdMarker> FromStr for Id<T> {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseIdError {
            expected_prefix: T::prefix(),
            value: s.to_string(),
        };
        let raw = s.strip_prefix(T::prefix()).ok_or_else(err)?;
        let ulid = Ulid::from_string(raw).map_err(|_| err())?;
        Ok(Self::from_ulid(ulid))
    }
}

impl<T: IdMarker> Serialize for Id<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de, T: IdMarker> Deserialize<'de> for Id<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

// ========================================
// Markers
// ========================================

/// One send attempt (one CommunicationLogEntry).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SendAttempt {}

impl IdMarker for SendAttempt {
    fn prefix() -> &'static str {
        "send-"
    }
}

/// One drained or tracked batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TrackedBatch {}

impl IdMarker for TrackedBatch {
    fn prefix() -> &'static str {
        "batch-"
    }
}

/// One campaign run started by the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CampaignRun {}

impl IdMarker for CampaignRun {
    fn prefix() -> &'static str {
        "camp-"
    }
}

/// Identifier of a single send attempt, threaded from job dispatch through the
/// vendor to the receipt.
pub type SendId = Id<SendAttempt>;

/// Identifier of a tracked batch operation.
pub type BatchId = Id<TrackedBatch>;

/// Identifier minted for campaigns the pipeline creates. Stored on the
/// campaign record as its string form.
pub type CampaignId = Id<CampaignRun>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_carries_prefix() {
        let send = SendId::from_ulid(Ulid::new());
        let batch = BatchId::from_ulid(Ulid::new());

        assert!(send.to_string().starts_with("send-"));
        assert!(batch.to_string().starts_with("batch-"));
    }

    #[test]
    fn serializes_as_prefixed_string() {
        let ulid = Ulid::new();
        let id = SendId::from_ulid(ulid);

        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"send-{ulid}\""));

        let back: SendId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn parse_rejects_wrong_prefix() {
        let batch = BatchId::from_ulid(Ulid::new());
        let err = batch.to_string().parse::<SendId>().unwrap_err();
        assert_eq!(err.expected_prefix, "send-");
    }

    #[test]
    fn marker_does_not_consume_memory() {
        assert_eq!(std::mem::size_of::<SendId>(), std::mem::size_of::<Ulid>());
    }
}
