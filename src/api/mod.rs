//! HTTP API for Jobstream
//!
//! Provides endpoints for:
//! - Streaming and paged crawls
//! - Resume analysis
//! - Server-sent event streams per request
//! - Single job parsing and health

pub mod analysis;
pub mod crawl;
pub mod error;
pub mod health;
pub mod inflight;
pub mod jobs;
pub mod stream;

use crate::server::config::CrawlDefaults;
use axum::{Extension, Router};
use jobstream_bus::EventBus;
use jobstream_core::SourceTracker;
use jobstream_worker::WorkerClient;
use std::sync::Arc;

pub use analysis::analysis_routes;
pub use crawl::crawl_routes;
pub use health::health_routes;
pub use inflight::InFlightRequests;
pub use jobs::jobs_routes;
pub use stream::stream_routes;

/// Shared components the handlers extract
#[derive(Clone)]
pub struct ApiContext {
    pub bus: EventBus,
    pub worker: Arc<dyn WorkerClient>,
    pub tracker: Arc<SourceTracker>,
    pub inflight: InFlightRequests,
    pub crawl: CrawlDefaults,
}

impl ApiContext {
    pub fn new(bus: EventBus, worker: Arc<dyn WorkerClient>, crawl: CrawlDefaults) -> Self {
        Self {
            tracker: Arc::new(SourceTracker::new(bus.clone())),
            bus,
            worker,
            inflight: InFlightRequests::new(),
            crawl,
        }
    }
}

/// Create the router with all endpoints
pub fn api_router(ctx: &ApiContext) -> Router {
    Router::new()
        .merge(health_routes())
        .merge(crawl_routes())
        .merge(analysis_routes())
        .merge(stream_routes())
        .merge(jobs_routes())
        .layer(Extension(ctx.bus.clone()))
        .layer(Extension(ctx.worker.clone()))
        .layer(Extension(ctx.tracker.clone()))
        .layer(Extension(ctx.inflight.clone()))
        .layer(Extension(ctx.crawl))
}

#[cfg(test)]
mod tests;
