//! Delivery outcome strategies for the simulated vendor.

use std::sync::Mutex;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::domain::message::SendRequest;
use crate::domain::receipt::DeliveryStatus;
use crate::ports::DeliveryOutcome;

/// SENT with probability `p`, FAILED otherwise.
pub struct WeightedRandomOutcome {
    success_probability: f64,
    rng: Mutex<StdRng>,
}

impl WeightedRandomOutcome {
    /// `success_probability` is clamped to `[0, 1]`.
    pub fn new(success_probability: f64) -> Self {
        Self::with_rng(success_probability, StdRng::from_entropy())
    }

    /// Reproducible sequence of outcomes for a given seed.
    pub fn seeded(success_probability: f64, seed: u64) -> Self {
        Self::with_rng(success_probability, StdRng::seed_from_u64(seed))
    }

    fn with_rng(success_probability: f64, rng: StdRng) -> Self {
        let p = if success_probability.is_nan() {
            0.0
        } else {
            success_probability.clamp(0.0, 1.0)
        };
        Self {
            success_probability: p,
            rng: Mutex::new(rng),
        }
    }

    pub fn success_probability(&self) -> f64 {
        self.success_probability
    }
}

impl DeliveryOutcome for WeightedRandomOutcome {
    fn decide(&self, _request: &SendRequest) -> DeliveryStatus {
        let mut rng = self.rng.lock().unwrap_or_else(|p| p.into_inner());
        if rng.gen_bool(self.success_probability) {
            DeliveryStatus::Sent
        } else {
            DeliveryStatus::Failed
        }
    }
}

/// Always reports the same status.
#[derive(Debug, Clone)]
pub struct FixedOutcome(pub DeliveryStatus);

impl DeliveryOutcome for FixedOutcome {
    fn decide(&self, _request: &SendRequest) -> DeliveryStatus {
        self.0.clone()
    }
}
