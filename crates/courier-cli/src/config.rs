//! Command line and environment configuration.
//!
//! Every option can come from a flag or from its `COURIER_*` variable; a
//! `.env` file is loaded before parsing.

use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};
use courier_core::app::{SchedulerConfig, VendorConfig};

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_LOG_FILTER: &str = "info,courier_core=info,tower_http=debug";

#[derive(Debug, Clone, Parser)]
#[command(name = "courier", version, about = "Campaign delivery pipeline")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Log output format.
    #[arg(long, env = "COURIER_LOG_FORMAT", value_enum, default_value_t = LogFormat::Text, global = true)]
    pub log_format: LogFormat,

    /// Log filter directives (overrides the default filter).
    #[arg(long, env = "RUST_LOG", global = true)]
    pub log_filter: Option<String>,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Run the pipeline with its HTTP surface.
    Serve(ServeArgs),
    /// Seed synthetic customers, run one campaign and print the outcome.
    Demo(DemoArgs),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Environment {
    Development,
    Production,
}

#[derive(Debug, Clone, Args)]
pub struct PipelineArgs {
    /// Items drained per topic per tick.
    #[arg(long, env = "COURIER_BATCH_SIZE", default_value_t = courier_core::app::scheduler::DEFAULT_BATCH_SIZE)]
    pub batch_size: usize,

    /// Scheduler tick in milliseconds.
    #[arg(long, env = "COURIER_TICK_MS", default_value_t = 5_000)]
    pub tick_ms: u64,

    /// Probability that a simulated send succeeds.
    #[arg(long, env = "COURIER_SUCCESS_PROBABILITY", default_value_t = courier_core::app::vendor::DEFAULT_SUCCESS_PROBABILITY)]
    pub success_probability: f64,

    /// Seed for the simulated vendor (reproducible outcomes).
    #[arg(long, env = "COURIER_SEED")]
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, Args)]
pub struct ServeArgs {
    #[arg(long, env = "COURIER_HOST", default_value = DEFAULT_HOST)]
    pub host: String,

    #[arg(long, env = "COURIER_PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Bearer key required on API routes.
    #[arg(long, env = "COURIER_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// `development` allows unauthenticated calls from localhost.
    #[arg(long = "env", env = "COURIER_ENV", value_enum, default_value_t = Environment::Development)]
    pub environment: Environment,

    /// Post vendor receipt flushes to this URL instead of ingesting in-process.
    #[arg(long, env = "COURIER_RECEIPT_URL")]
    pub receipt_url: Option<String>,

    #[command(flatten)]
    pub pipeline: PipelineArgs,
}

#[derive(Debug, Clone, Args)]
pub struct DemoArgs {
    /// Number of synthetic customers.
    #[arg(long, default_value_t = 200)]
    pub customers: usize,

    #[command(flatten)]
    pub pipeline: PipelineArgs,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("batch size must be greater than 0")]
    ZeroBatchSize,

    #[error("tick must be greater than 0 ms")]
    ZeroTick,

    #[error("success probability must be within [0, 1], got {0}")]
    InvalidProbability(String),

    #[error("port must be greater than 0")]
    ZeroPort,

    #[error("COURIER_API_KEY is required in production")]
    MissingApiKey,
}

impl PipelineArgs {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch_size == 0 {
            return Err(ConfigError::ZeroBatchSize);
        }
        if self.tick_ms == 0 {
            return Err(ConfigError::ZeroTick);
        }
        if !(0.0..=1.0).contains(&self.success_probability) {
            return Err(ConfigError::InvalidProbability(self.success_probability.to_string()));
        }
        Ok(())
    }

    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            batch_size: self.batch_size,
            tick: Duration::from_millis(self.tick_ms),
        }
    }

    pub fn vendor_config(&self) -> VendorConfig {
        VendorConfig {
            success_probability: self.success_probability,
            seed: self.seed,
            ..VendorConfig::default()
        }
    }
}

impl ServeArgs {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.pipeline.validate()?;
        if self.port == 0 {
            return Err(ConfigError::ZeroPort);
        }
        if self.environment == Environment::Production
            && self.api_key.as_deref().is_none_or(|k| k.trim().is_empty())
        {
            return Err(ConfigError::MissingApiKey);
        }
        Ok(())
    }

    pub fn allows_local_bypass(&self) -> bool {
        self.environment == Environment::Development
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("courier").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn serve_defaults() {
        let cli = parse(&["serve"]);
        let Command::Serve(args) = cli.command else {
            panic!("expected serve");
        };
        assert_eq!(args.port, DEFAULT_PORT);
        assert_eq!(args.pipeline.batch_size, 50);
        assert_eq!(args.pipeline.scheduler_config().tick, Duration::from_secs(5));
        assert!(args.allows_local_bypass());
        assert_eq!(args.validate(), Ok(()));
    }

    #[test]
    fn invalid_values_are_rejected() {
        let cli = parse(&["serve", "--batch-size", "0"]);
        let Command::Serve(args) = cli.command else {
            panic!("expected serve");
        };
        assert_eq!(args.validate(), Err(ConfigError::ZeroBatchSize));

        let cli = parse(&["demo", "--success-probability", "1.5"]);
        let Command::Demo(args) = cli.command else {
            panic!("expected demo");
        };
        assert!(matches!(
            args.pipeline.validate(),
            Err(ConfigError::InvalidProbability(_))
        ));
    }

    #[test]
    fn production_requires_api_key() {
        let cli = parse(&["serve", "--env", "production"]);
        let Command::Serve(args) = cli.command else {
            panic!("expected serve");
        };
        assert_eq!(args.validate(), Err(ConfigError::MissingApiKey));
        assert!(!args.allows_local_bypass());

        let cli = parse(&["serve", "--env", "production", "--api-key", "secret"]);
        let Command::Serve(args) = cli.command else {
            panic!("expected serve");
        };
        assert_eq!(args.validate(), Ok(()));
    }
}
