//! Error taxonomy for the delivery pipeline.
//!
//! Each stage has its own error type so callers can tell a caller mistake
//! (`ValidationError`) from an infrastructure failure. `PipelineError` wraps
//! them all for code that crosses stage boundaries.

use thiserror::Error;

/// ErrorKind classifies a failure for logging and for deciding where it surfaces.
///
/// - Validation: malformed rule, filter or receipt; reported to the caller, never retried
/// - Resolution: audience query failed; one degraded retry, then the job is skipped
/// - Dispatch: transactional write failed; the drained batch is logged as failed
/// - Vendor: receipt flush failed; receipts counted as failed, flush not retried
/// - Infrastructure: queue or store unavailable
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Resolution,
    Dispatch,
    Vendor,
    Infrastructure,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("unknown field '{0}'")]
    UnknownField(String),

    #[error("unknown operator '{0}'")]
    UnknownOperator(String),

    #[error("operator '{operator}' is not supported for {kind} field '{field}'")]
    UnsupportedOperator {
        field: String,
        operator: String,
        kind: &'static str,
    },

    #[error("invalid {kind} value for field '{field}': {value}")]
    InvalidValue {
        field: String,
        value: String,
        kind: &'static str,
    },

    #[error("rule {index} is missing '{field}'")]
    IncompleteRule { index: usize, field: &'static str },

    #[error("filter must contain at least one rule")]
    EmptyRules,

    #[error("malformed filter document: {0}")]
    MalformedFilter(String),

    #[error("missing required fields in receipt")]
    MissingReceiptFields,

    #[error("missing required fields in {invalid_count} receipt(s)")]
    InvalidReceipts { invalid_count: usize },
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum StoreError {
    #[error("type mismatch on field '{field}': cannot compare {stored} with {filter}")]
    TypeMismatch {
        field: String,
        stored: &'static str,
        filter: &'static str,
    },

    #[error("invalid pattern for field '{field}': {message}")]
    InvalidPattern { field: String, message: String },

    #[error("record not found: {0}")]
    NotFound(String),

    #[error("duplicate record: {0}")]
    Duplicate(String),

    #[error("invalid record: {0}")]
    InvalidRecord(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum QueueError {
    #[error("queue operation failed: {0}")]
    OperationFailed(String),

    #[error("failed to encode queue item: {0}")]
    Encode(String),

    #[error("failed to decode queue item: {0}")]
    Decode(String),
}

#[derive(Debug, Clone, PartialEq, Error)]
#[error("audience resolution failed (full: {full}; simplified: {simplified})")]
pub struct ResolutionError {
    pub full: StoreError,
    pub simplified: StoreError,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum DispatchError {
    #[error("store write failed: {0}")]
    Store(#[from] StoreError),

    #[error("queue failed: {0}")]
    Queue(#[from] QueueError),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum VendorError {
    #[error("receipt flush rejected with status {status}")]
    Rejected { status: u16 },

    #[error("receipt flush transport failed: {0}")]
    Transport(String),

    #[error("receipt ingress refused the batch: {0}")]
    Ingress(String),
}

/// Umbrella error for code that spans several stages.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    #[error(transparent)]
    Vendor(#[from] VendorError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Queue(#[from] QueueError),
}

impl PipelineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::Validation(_) => ErrorKind::Validation,
            PipelineError::Resolution(_) => ErrorKind::Resolution,
            PipelineError::Dispatch(_) => ErrorKind::Dispatch,
            PipelineError::Vendor(_) => ErrorKind::Vendor,
            PipelineError::Store(_) | PipelineError::Queue(_) => ErrorKind::Infrastructure,
        }
    }
}
