//! PipelineBuilder - wiring and startup validation.
//!
//! Stores and the queue are required; everything else has a default. `build`
//! checks the whole configuration up front and refuses to start a pipeline
//! that could only fail later.

use std::sync::Arc;

use crate::app::audience::AudienceResolver;
use crate::app::campaign::{CampaignConfig, CampaignRunner};
use crate::app::dispatch::{
    CustomerOpDispatcher, DispatcherRegistry, MessageBatchDispatcher, ReceiptDispatcher, RegistryError,
    TopicDispatcher,
};
use crate::app::ingress::{IngressSink, ReceiptIngress};
use crate::app::pipeline::Pipeline;
use crate::app::progress::{ProgressConfig, ProgressTracker};
use crate::app::scheduler::{Scheduler, SchedulerConfig};
use crate::app::vendor::{VendorClient, VendorConfig};
use crate::domain::topic::Topic;
use crate::impls::TracingEventSink;
use crate::ports::{
    CampaignStore, Clock, CommunicationLogStore, CustomerStore, DeliveryOutcome, EventSink, IdGenerator,
    ReceiptSink, SystemClock, UlidGenerator, WorkQueue,
};

/// BuildError is returned by `PipelineBuilder::build`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BuildError {
    #[error("missing component: {0}")]
    MissingComponent(&'static str),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    DuplicateDispatcher(#[from] RegistryError),
}

/// # Example
/// ```ignore
/// let pipeline = PipelineBuilder::new()
///     .queue(Arc::new(InMemoryWorkQueue::new()))
///     .customers(customers)
///     .logs(Arc::new(InMemoryLogStore::new()))
///     .campaigns(Arc::new(InMemoryCampaignStore::new()))
///     .build()?;
/// let scheduler = pipeline.start();
/// ```
#[derive(Default)]
pub struct PipelineBuilder {
    queue: Option<Arc<dyn WorkQueue>>,
    customers: Option<Arc<dyn CustomerStore>>,
    logs: Option<Arc<dyn CommunicationLogStore>>,
    campaigns: Option<Arc<dyn CampaignStore>>,
    clock: Option<Arc<dyn Clock>>,
    ids: Option<Arc<dyn IdGenerator>>,
    outcome: Option<Arc<dyn DeliveryOutcome>>,
    receipt_sink: Option<Arc<dyn ReceiptSink>>,
    event_sink: Option<Arc<dyn EventSink>>,
    dispatchers: Vec<Arc<dyn TopicDispatcher>>,
    scheduler_config: SchedulerConfig,
    vendor_config: VendorConfig,
    campaign_config: CampaignConfig,
    progress_config: ProgressConfig,
    disable_handoff: bool,
}

impl PipelineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue(mut self, queue: Arc<dyn WorkQueue>) -> Self {
        self.queue = Some(queue);
        self
    }

    pub fn customers(mut self, store: Arc<dyn CustomerStore>) -> Self {
        self.customers = Some(store);
        self
    }

    pub fn logs(mut self, store: Arc<dyn CommunicationLogStore>) -> Self {
        self.logs = Some(store);
        self
    }

    pub fn campaigns(mut self, store: Arc<dyn CampaignStore>) -> Self {
        self.campaigns = Some(store);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = Some(ids);
        self
    }

    /// Replaces the weighted random outcome built from `VendorConfig`.
    pub fn outcome(mut self, outcome: Arc<dyn DeliveryOutcome>) -> Self {
        self.outcome = Some(outcome);
        self
    }

    /// Where vendor flushes go. Defaults to in-process ingress.
    pub fn receipt_sink(mut self, sink: Arc<dyn ReceiptSink>) -> Self {
        self.receipt_sink = Some(sink);
        self
    }

    pub fn event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.event_sink = Some(sink);
        self
    }

    /// Use `dispatcher` for its topic instead of the built-in one.
    pub fn dispatcher(mut self, dispatcher: Arc<dyn TopicDispatcher>) -> Self {
        self.dispatchers.push(dispatcher);
        self
    }

    pub fn scheduler_config(mut self, config: SchedulerConfig) -> Self {
        self.scheduler_config = config;
        self
    }

    pub fn vendor_config(mut self, config: VendorConfig) -> Self {
        self.vendor_config = config;
        self
    }

    pub fn campaign_config(mut self, config: CampaignConfig) -> Self {
        self.campaign_config = config;
        self
    }

    pub fn progress_config(mut self, config: ProgressConfig) -> Self {
        self.progress_config = config;
        self
    }

    /// Stop the message dispatcher from sending the entries it writes.
    pub fn without_handoff(mut self) -> Self {
        self.disable_handoff = true;
        self
    }

    pub fn build(self) -> Result<Pipeline, BuildError> {
        self.validate()?;

        let queue = self.queue.ok_or(BuildError::MissingComponent("work queue"))?;
        let customers = self.customers.ok_or(BuildError::MissingComponent("customer store"))?;
        let logs = self.logs.ok_or(BuildError::MissingComponent("communication log store"))?;
        let campaigns = self.campaigns.ok_or(BuildError::MissingComponent("campaign store"))?;

        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let ids = self
            .ids
            .unwrap_or_else(|| Arc::new(UlidGenerator::new(Arc::clone(&clock))));
        let event_sink = self.event_sink.unwrap_or_else(|| Arc::new(TracingEventSink));

        let progress = Arc::new(ProgressTracker::new(
            self.progress_config,
            event_sink,
            ids.clone(),
            clock.clone(),
        ));
        let ingress = Arc::new(ReceiptIngress::new(queue.clone(), Some(progress.clone())));

        let receipt_sink = self
            .receipt_sink
            .unwrap_or_else(|| Arc::new(IngressSink::new(ingress.clone())));
        let outcome = self
            .outcome
            .unwrap_or_else(|| Arc::new(self.vendor_config.outcome()));
        let vendor = VendorClient::new(
            self.vendor_config,
            outcome,
            receipt_sink,
            clock.clone(),
            Some(progress.clone()),
        );

        let resolver = Arc::new(AudienceResolver::new(customers.clone()));

        let mut registry = DispatcherRegistry::new();
        for dispatcher in self.dispatchers {
            registry.register(dispatcher)?;
        }
        for topic in registry.missing_topics() {
            let dispatcher: Arc<dyn TopicDispatcher> = match topic {
                Topic::MessageBatches => {
                    let d = MessageBatchDispatcher::new(resolver.clone(), logs.clone(), ids.clone(), clock.clone());
                    if self.disable_handoff {
                        Arc::new(d)
                    } else {
                        Arc::new(d.with_handoff(vendor.clone(), self.scheduler_config.batch_size))
                    }
                }
                Topic::Receipts => Arc::new(ReceiptDispatcher::new(logs.clone(), campaigns.clone())),
                Topic::CustomerOperations => Arc::new(CustomerOpDispatcher::new(customers.clone())),
            };
            registry.register(dispatcher)?;
        }

        let scheduler = Arc::new(Scheduler::new(
            queue.clone(),
            registry,
            progress.clone(),
            self.scheduler_config,
        ));
        let runner = CampaignRunner::new(
            resolver.clone(),
            campaigns.clone(),
            logs.clone(),
            vendor.clone(),
            ids,
            clock,
            progress.clone(),
            self.campaign_config,
        );

        Ok(Pipeline {
            queue,
            customers,
            logs,
            campaigns,
            resolver,
            vendor,
            ingress,
            scheduler,
            progress,
            runner,
        })
    }

    fn validate(&self) -> Result<(), BuildError> {
        let invalid = |msg: &str| Err(BuildError::InvalidConfig(msg.to_string()));

        if self.scheduler_config.batch_size == 0 {
            return invalid("scheduler batch size must be greater than 0");
        }
        if self.scheduler_config.tick.is_zero() {
            return invalid("scheduler tick must be greater than 0");
        }
        if self.vendor_config.batch_capacity == 0 {
            return invalid("receipt buffer capacity must be greater than 0");
        }
        if self.vendor_config.idle_flush.is_zero() {
            return invalid("receipt idle flush must be greater than 0");
        }
        let p = self.vendor_config.success_probability;
        if !(0.0..=1.0).contains(&p) {
            return invalid("success probability must be within [0, 1]");
        }
        if self.campaign_config.chunk_size == 0 {
            return invalid("campaign chunk size must be greater than 0");
        }
        Ok(())
    }
}
