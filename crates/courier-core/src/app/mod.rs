//! App - the pipeline stages, wired from ports.
//!
//! # Main components
//! - **AudienceResolver**: predicate to audience, one degraded retry
//! - **VendorClient**: simulated sends + micro-batching receipt buffer
//! - **ReceiptIngress**: validated entry point for receipts
//! - **Scheduler**: per-topic drain loops over the `dispatch` handlers
//! - **ProgressTracker**: start/update/complete events per batch
//! - **CampaignRunner**: paced, synchronous campaign sends
//! - **PipelineBuilder** / **Pipeline**: wiring and the producer API

pub mod audience;
pub mod builder;
pub mod campaign;
pub mod dispatch;
pub mod ingress;
pub mod pipeline;
pub mod progress;
pub mod scheduler;
pub mod status;
pub mod vendor;

pub use self::audience::{AudienceCount, AudienceResolver, Resolution};
pub use self::builder::{BuildError, PipelineBuilder};
pub use self::campaign::{CampaignConfig, CampaignRequest, CampaignRunner, CampaignSummary};
pub use self::dispatch::{DispatchReport, DispatcherRegistry, TopicDispatcher};
pub use self::ingress::{IngressSink, ReceiptIngress, ReceiptSubmission};
pub use self::pipeline::Pipeline;
pub use self::progress::{BatchSnapshot, ProgressConfig, ProgressTracker};
pub use self::scheduler::{Scheduler, SchedulerConfig, SchedulerHandle, TickOutcome};
pub use self::status::PipelineStatus;
pub use self::vendor::{CampaignStats, SendAck, VendorClient, VendorConfig};
