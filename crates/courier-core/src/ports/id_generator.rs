//! IdGenerator port - identifier generation.
//!
//! # Implementations
//! - **UlidGenerator**: ULID based, timestamp taken from a `Clock`

use ulid::Ulid;

use crate::domain::ids::{BatchId, CampaignId, SendId};
use crate::ports::Clock;

/// IdGenerator mints the identifiers the pipeline owns.
///
/// # ULID properties
/// - sortable by creation time
/// - generated without coordination
///
/// # Thread Safety
/// - requires `Send + Sync` (shared by every dispatcher task)
pub trait IdGenerator: Send + Sync {
    fn generate_send_id(&self) -> SendId;

    fn generate_batch_id(&self) -> BatchId;

    fn generate_campaign_id(&self) -> CampaignId;
}

/// UlidGenerator builds ULIDs from the clock's time plus random bits.
///
/// With a `FixedClock` the timestamp part is deterministic.
pub struct UlidGenerator<C> {
    clock: C,
}

impl<C: Clock> UlidGenerator<C> {
    pub fn new(clock: C) -> Self {
        Self { clock }
    }

    fn next_ulid(&self) -> Ulid {
        let timestamp_ms = self.clock.now().timestamp_millis().max(0) as u64;
        Ulid::from_parts(timestamp_ms, rand::random())
    }
}

impl<C: Clock> IdGenerator for UlidGenerator<C> {
    fn generate_send_id(&self) -> SendId {
        SendId::from_ulid(self.next_ulid())
    }

    fn generate_batch_id(&self) -> BatchId {
        BatchId::from_ulid(self.next_ulid())
    }

    fn generate_campaign_id(&self) -> CampaignId {
        CampaignId::from_ulid(self.next_ulid())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::{FixedClock, SystemClock};
    use chrono::{TimeZone, Utc};

    #[test]
    fn ulid_generator_generates_unique_ids() {
        let id_gen = UlidGenerator::new(SystemClock);

        let id1 = id_gen.generate_send_id();
        let id2 = id_gen.generate_send_id();
        let id3 = id_gen.generate_send_id();

        assert_ne!(id1, id2);
        assert_ne!(id2, id3);
        assert_ne!(id1, id3);
    }

    #[test]
    fn ulid_generator_with_fixed_clock_shares_timestamp() {
        let fixed_time = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let id_gen = UlidGenerator::new(FixedClock::new(fixed_time));

        let id1 = id_gen.generate_send_id();
        let id2 = id_gen.generate_send_id();

        // random part differs
        assert_ne!(id1, id2);

        assert_eq!(id1.as_ulid().timestamp_ms(), fixed_time.timestamp_millis() as u64);
        assert_eq!(id2.as_ulid().timestamp_ms(), fixed_time.timestamp_millis() as u64);
    }

    #[test]
    fn different_id_kinds_have_different_prefixes() {
        let id_gen = UlidGenerator::new(SystemClock);

        assert!(id_gen.generate_send_id().to_string().starts_with("send-"));
        assert!(id_gen.generate_batch_id().to_string().starts_with("batch-"));
        assert!(id_gen.generate_campaign_id().to_string().starts_with("camp-"));
    }
}
