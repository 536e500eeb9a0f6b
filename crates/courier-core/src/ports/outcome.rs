//! DeliveryOutcome port - decides what the simulated vendor reports.

use crate::domain::message::SendRequest;
use crate::domain::receipt::DeliveryStatus;

/// DeliveryOutcome picks the status of one send.
///
/// # Implementations
/// - `WeightedRandomOutcome`: SENT with a configurable probability (seedable)
/// - `FixedOutcome`: always the same status (deterministic tests)
pub trait DeliveryOutcome: Send + Sync {
    fn decide(&self, request: &SendRequest) -> DeliveryStatus;
}
