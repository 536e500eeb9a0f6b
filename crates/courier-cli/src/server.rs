//! `courier serve`: in-memory backends, scheduler loops and the HTTP surface.

use std::sync::Arc;

use anyhow::{Context, Result};
use courier_core::app::{Pipeline, PipelineBuilder};
use courier_core::impls::{
    HttpReceiptSink, InMemoryCampaignStore, InMemoryCustomerStore, InMemoryLogStore, InMemoryWorkQueue,
};
use courier_core::ports::CustomerStore;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{info, warn};

use crate::config::{PipelineArgs, ServeArgs};
use crate::http::{AppState, AuthConfig, router};

/// Pipeline over fresh in-memory backends.
pub fn build_pipeline(args: &PipelineArgs, customers: Arc<dyn CustomerStore>) -> PipelineBuilder {
    PipelineBuilder::new()
        .queue(Arc::new(InMemoryWorkQueue::new()))
        .customers(customers)
        .logs(Arc::new(InMemoryLogStore::new()))
        .campaigns(Arc::new(InMemoryCampaignStore::new()))
        .scheduler_config(args.scheduler_config())
        .vendor_config(args.vendor_config())
}

pub async fn run(args: ServeArgs) -> Result<()> {
    args.validate()?;

    let mut builder = build_pipeline(&args.pipeline, Arc::new(InMemoryCustomerStore::new()));
    if let Some(url) = &args.receipt_url {
        let sink = HttpReceiptSink::new(url.as_str(), args.api_key.clone())
            .context("failed to create receipt sink")?;
        info!(url = %sink.url(), "vendor receipts will be posted over HTTP");
        builder = builder.receipt_sink(Arc::new(sink));
    }
    let pipeline: Arc<Pipeline> = Arc::new(builder.build().context("failed to build pipeline")?);

    let scheduler = pipeline.start();

    let state = AppState {
        pipeline: pipeline.clone(),
        auth: Arc::new(AuthConfig {
            api_key: args.api_key.clone(),
            allow_local_bypass: args.allows_local_bypass(),
        }),
    };
    let app = router(state);

    let addr = format!("{}:{}", args.host, args.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(
        addr = %addr,
        environment = ?args.environment,
        batch_size = args.pipeline.batch_size,
        tick_ms = args.pipeline.tick_ms,
        "courier listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("http server stopped, stopping scheduler");
    scheduler.shutdown_and_join().await;
    if let Err(e) = pipeline.vendor().flush_now().await {
        warn!(error = %e, "final receipt flush failed");
    }

    info!("courier shut down gracefully");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received Ctrl+C, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}
