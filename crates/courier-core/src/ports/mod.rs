//! Ports - the narrow contracts the pipeline depends on.
//!
//! Each trait stands for an external collaborator (list store, document
//! store, vendor, log output) and hides its implementation. `impls` provides
//! the in-memory and HTTP implementations.

pub mod campaign_store;
pub mod clock;
pub mod customer_store;
pub mod event_sink;
pub mod id_generator;
pub mod log_store;
pub mod outcome;
pub mod receipt_sink;
pub mod work_queue;

pub use self::campaign_store::CampaignStore;
pub use self::clock::{Clock, FixedClock, ManualClock, SystemClock};
pub use self::customer_store::{CustomerStore, MutationReport};
pub use self::event_sink::EventSink;
pub use self::id_generator::{IdGenerator, UlidGenerator};
pub use self::log_store::{CommunicationLogStore, ReconcileReport};
pub use self::outcome::DeliveryOutcome;
pub use self::receipt_sink::ReceiptSink;
pub use self::work_queue::WorkQueue;
