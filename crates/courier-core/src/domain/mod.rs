//! Domain model (rules, predicates, customers, receipts, log entries, ...).

pub mod campaign;
pub mod customer;
pub mod errors;
pub mod events;
pub mod field;
pub mod ids;
pub mod log_entry;
pub mod message;
pub mod predicate;
pub mod receipt;
pub mod rule;
pub mod topic;

pub use self::campaign::{Campaign, OutcomeCounts};
pub use self::customer::{
    AudienceMember, Channel, Customer, CustomerMutation, CustomerOperation, UnsupportedOperation,
};
pub use self::errors::{
    DispatchError, ErrorKind, PipelineError, QueueError, ResolutionError, StoreError,
    ValidationError, VendorError,
};
pub use self::events::{BatchKind, ProgressEvent, ProgressPhase};
pub use self::field::FieldKind;
pub use self::ids::{BatchId, CampaignId, SendId};
pub use self::log_entry::CommunicationLogEntry;
pub use self::message::{MessageBatchJob, SendRequest};
pub use self::predicate::{Comparison, Condition, FilterValue, Predicate};
pub use self::receipt::{DeliveryReceipt, DeliveryStatus};
pub use self::rule::{Connector, Operator, Rule};
pub use self::topic::Topic;
