//! Collaborators of the crawl and analysis pipelines.
//!
//! Pipelines never talk to the bus or the worker directly; they go through
//! these traits so tests can substitute recorders and mocks.

use async_trait::async_trait;
use jobstream_bus::{channel_for_request, EventBus};
use jobstream_worker::{PageResult, WorkerClient};
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

/// Fetches one page of a source.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetch `page` (1-based) of `source` for `query`.
    async fn fetch_page(
        &self,
        request_id: &str,
        source: &str,
        query: &str,
        page: u32,
        page_size: u32,
    ) -> jobstream_worker::Result<PageResult>;
}

/// Publishes pipeline events for a request.
pub trait StreamEmitter: Send + Sync {
    /// Emit one event on the request's channel.
    fn emit(&self, request_id: &str, event_type: &str, payload: Value);
}

/// Told when a pipeline finishes.
pub trait CompletionNotifier: Send + Sync {
    /// One source of a (possibly multi-source) request is done.
    fn source_complete(&self, request_id: &str, source: &str);

    /// The whole request is done.
    fn completed(&self, request_id: &str);
}

impl StreamEmitter for EventBus {
    fn emit(&self, request_id: &str, event_type: &str, payload: Value) {
        self.publish(&channel_for_request(request_id), event_type, payload);
    }
}

/// [`PageFetcher`] backed by a [`WorkerClient`].
#[derive(Clone)]
pub struct WorkerPageFetcher {
    client: Arc<dyn WorkerClient>,
}

impl WorkerPageFetcher {
    /// Wrap a worker client.
    #[must_use]
    pub fn new(client: Arc<dyn WorkerClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PageFetcher for WorkerPageFetcher {
    async fn fetch_page(
        &self,
        request_id: &str,
        source: &str,
        query: &str,
        page: u32,
        page_size: u32,
    ) -> jobstream_worker::Result<PageResult> {
        // One registry key per page
        let key = format!("{request_id}:{source}:{page}");
        debug!(request_id = %request_id, worker = self.client.name(), page, "Fetching page via worker");
        self.client
            .fetch_page(&key, source, query, page, page_size)
            .await
    }
}

/// Notifier that completes the request channel on every call.
///
/// Suitable for single-source requests; fan-out requests use
/// [`SourceTracker`](crate::SourceTracker).
#[derive(Debug, Clone)]
pub struct BusNotifier {
    bus: EventBus,
}

impl BusNotifier {
    /// Create a notifier completing channels on `bus`.
    #[must_use]
    pub fn new(bus: EventBus) -> Self {
        Self { bus }
    }
}

impl CompletionNotifier for BusNotifier {
    fn source_complete(&self, request_id: &str, _source: &str) {
        self.bus
            .complete(&channel_for_request(request_id), "source-complete");
    }

    fn completed(&self, request_id: &str) {
        self.bus.complete(&channel_for_request(request_id), "completed");
    }
}
