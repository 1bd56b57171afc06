//! `jobstream crawl` - paged crawl printed as JSON lines

use crate::server::{build_components, load_config};
use anyhow::{bail, Result};
use clap::Args;
use jobstream_bus::{channel_for_request, BusMessage};
use jobstream_core::{format_error_for_cli, run_crawl, BusNotifier, CrawlRequest, WorkerPageFetcher};
use serde_json::json;
use uuid::Uuid;

#[derive(Args, Debug)]
pub struct CrawlArgs {
    /// Source key (e.g. lever)
    #[arg(long)]
    pub source: String,
    /// Search query
    #[arg(long, default_value = "")]
    pub query: String,
    /// Item cap (defaults to the configured value)
    #[arg(long)]
    pub max_items: Option<i64>,
    /// Items per page (defaults to the configured value)
    #[arg(long)]
    pub page_size: Option<i64>,
    /// First page
    #[arg(long, default_value_t = 1)]
    pub start_page: i64,
}

pub async fn run(args: CrawlArgs) -> Result<()> {
    let config = load_config()?;
    let (bus, worker) = build_components(&config);

    let request_id = format!("cli-{}", Uuid::new_v4());
    let mut subscription = bus.subscribe(&channel_for_request(&request_id));
    let printer = tokio::spawn(async move {
        while let Some(message) = subscription.recv().await {
            if let BusMessage::Event(event) = message {
                println!(
                    "{}",
                    json!({ "event": event.event_type, "data": event.payload })
                );
            }
        }
    });

    let request = CrawlRequest {
        source: args.source,
        query: args.query,
        max_items: args.max_items.unwrap_or(config.crawl.default_max_items),
        start_page: args.start_page,
        page_size: args.page_size.unwrap_or(config.crawl.page_size),
    };
    let fetcher = WorkerPageFetcher::new(worker.clone());
    let notifier = BusNotifier::new(bus.clone());
    let result = run_crawl(&request_id, &request, &fetcher, &bus, &notifier).await;

    bus.shutdown("cli-exit");
    let _ = printer.await;
    worker.stop_all();

    match result {
        Ok(result) => {
            eprintln!(
                "{} items, last page {}{}",
                result.items.len(),
                result.last_page_fetched,
                if result.truncated { " (truncated)" } else { "" }
            );
            Ok(())
        }
        Err(e) => bail!(format_error_for_cli(&e)),
    }
}
