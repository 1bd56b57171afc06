//! CLI module for Jobstream
//!
//! Provides commands:
//! - `serve`: HTTP server with SSE streams
//! - `crawl`: run a paged crawl locally and print every event
//! - `parse`: parse one job posting URL

use clap::{Parser, Subcommand};

pub mod crawl;
pub mod parse;

/// Jobstream CLI
#[derive(Parser, Debug)]
#[command(name = "jobstream")]
#[command(about = "Job board crawl orchestrator with live event streams")]
#[command(version)]
pub struct Cli {
    /// Emit logs as JSON
    #[arg(long, global = true)]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the HTTP server
    Serve,
    /// Crawl one source page by page and print the events
    Crawl(crawl::CrawlArgs),
    /// Parse a single job posting
    Parse {
        /// Posting URL
        url: String,
    },
}

/// Run the CLI command
pub async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Some(Commands::Serve) => crate::server::run().await,
        Some(Commands::Crawl(args)) => crawl::run(args).await,
        Some(Commands::Parse { url }) => parse::run(&url).await,
        None => {
            let mut cmd = <Cli as clap::CommandFactory>::command();
            cmd.print_help()?;
            println!();
            Ok(())
        }
    }
}
