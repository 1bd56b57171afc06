//! Jobstream - job board crawl orchestrator
//!
//! CLI entry point for the Jobstream server and local commands.

#![forbid(unsafe_code)]

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod api;
mod cli;
mod server;

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    let cli = cli::Cli::parse();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "jobstream=info,tower_http=info".into());
    // Logs go to stderr so `crawl` and `parse` output stays machine-readable.
    if cli.json_logs {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }

    if cli.command.is_some() {
        info!("Starting Jobstream v{}", env!("CARGO_PKG_VERSION"));
    }

    cli::run(cli).await
}
