//! Tracing subscriber setup.
//!
//! Structured logging only: every component logs through `tracing` macros and
//! this module decides how the events are rendered.

use anyhow::{Context, Result};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{DEFAULT_LOG_FILTER, LogFormat};

/// Install the global subscriber. `filter` uses `RUST_LOG` syntax; when absent
/// the default filter applies.
pub fn init_logging(format: LogFormat, filter: Option<&str>) -> Result<()> {
    let directives = filter
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .unwrap_or(DEFAULT_LOG_FILTER);
    let filter = EnvFilter::try_new(directives)
        .with_context(|| format!("invalid log filter '{directives}'"))?;

    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Text => registry
            .with(fmt::layer().with_target(true))
            .try_init()
            .context("failed to install text subscriber")?,
        LogFormat::Json => registry
            .with(fmt::layer().json().with_current_span(true))
            .try_init()
            .context("failed to install json subscriber")?,
    }
    Ok(())
}
