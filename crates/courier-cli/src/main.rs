//! courier - campaign delivery pipeline.
//!
//! - `courier serve` runs the scheduler loops behind the HTTP API
//! - `courier demo` seeds synthetic customers, runs one campaign and prints
//!   the reconciled result

mod config;
mod demo;
mod http;
mod logging;
mod server;

use clap::Parser;

use crate::config::{Cli, Command};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env is optional
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    logging::init_logging(cli.log_format, cli.log_filter.as_deref())?;

    match cli.command {
        Command::Serve(args) => server::run(args).await,
        Command::Demo(args) => demo::run(args).await,
    }
}
