//! Impls - port implementations.
//!
//! # Included
//! - **InMemoryWorkQueue**, **InMemoryCustomerStore**, **InMemoryLogStore**,
//!   **InMemoryCampaignStore**: development and test backends
//! - **HttpReceiptSink**: flushes vendor receipts over HTTP
//! - **WeightedRandomOutcome** / **FixedOutcome**: vendor outcome strategies
//! - **TracingEventSink** / **MemoryEventSink**: progress event output

pub mod event_sinks;
pub mod http_sink;
pub mod inmem_campaigns;
pub mod inmem_customers;
pub mod inmem_logs;
pub mod inmem_queue;
pub mod outcome;

pub use self::event_sinks::{MemoryEventSink, TracingEventSink};
pub use self::http_sink::HttpReceiptSink;
pub use self::inmem_campaigns::InMemoryCampaignStore;
pub use self::inmem_customers::InMemoryCustomerStore;
pub use self::inmem_logs::InMemoryLogStore;
pub use self::inmem_queue::InMemoryWorkQueue;
pub use self::outcome::{FixedOutcome, WeightedRandomOutcome};
