//! WorkerClient - the seam between request handling and worker execution.

use crate::config::WorkerConfig;
use crate::error::Result;
use crate::orchestrator::{ExecuteOutcome, ProcessOrchestrator, SearchRequest};
use crate::protocol::{JobDetails, PageResult};
use crate::stub::StubWorker;
use async_trait::async_trait;
use jobstream_bus::EventBus;
use std::sync::Arc;
use tracing::info;

/// Executes searches, page fetches and URL parses.
#[async_trait]
pub trait WorkerClient: Send + Sync {
    /// Implementation name (for logs and health output)
    fn name(&self) -> &'static str;

    /// Start a streaming search; returns without waiting for it.
    async fn execute(&self, request: SearchRequest) -> Result<ExecuteOutcome>;

    /// Fetch one page of one source.
    async fn fetch_page(
        &self,
        request_id: &str,
        source: &str,
        query: &str,
        page: u32,
        page_size: u32,
    ) -> Result<PageResult>;

    /// Parse one job URL.
    async fn fetch_by_url(&self, url: &str) -> Result<JobDetails>;

    /// Stop the search registered under `request_id`.
    fn stop(&self, request_id: &str) -> bool;

    /// Stop everything in flight.
    fn stop_all(&self) -> usize;

    /// Number of in-flight workers.
    fn active_count(&self) -> usize;
}

#[async_trait]
impl WorkerClient for ProcessOrchestrator {
    fn name(&self) -> &'static str {
        "process"
    }

    async fn execute(&self, request: SearchRequest) -> Result<ExecuteOutcome> {
        ProcessOrchestrator::execute(self, request).await
    }

    async fn fetch_page(
        &self,
        request_id: &str,
        source: &str,
        query: &str,
        page: u32,
        page_size: u32,
    ) -> Result<PageResult> {
        ProcessOrchestrator::fetch_page(self, request_id, source, query, page, page_size).await
    }

    async fn fetch_by_url(&self, url: &str) -> Result<JobDetails> {
        ProcessOrchestrator::fetch_by_url(self, url).await
    }

    fn stop(&self, request_id: &str) -> bool {
        ProcessOrchestrator::stop(self, request_id)
    }

    fn stop_all(&self) -> usize {
        ProcessOrchestrator::stop_all(self)
    }

    fn active_count(&self) -> usize {
        self.registry().len()
    }
}

#[async_trait]
impl WorkerClient for StubWorker {
    fn name(&self) -> &'static str {
        "stub"
    }

    async fn execute(&self, request: SearchRequest) -> Result<ExecuteOutcome> {
        StubWorker::execute(self, request).await
    }

    async fn fetch_page(
        &self,
        request_id: &str,
        source: &str,
        query: &str,
        page: u32,
        page_size: u32,
    ) -> Result<PageResult> {
        StubWorker::fetch_page(self, request_id, source, query, page, page_size).await
    }

    async fn fetch_by_url(&self, url: &str) -> Result<JobDetails> {
        StubWorker::fetch_by_url(self, url).await
    }

    fn stop(&self, request_id: &str) -> bool {
        StubWorker::stop(self, request_id)
    }

    fn stop_all(&self) -> usize {
        self.registry().stop_all()
    }

    fn active_count(&self) -> usize {
        self.registry().len()
    }
}

/// Pick the implementation selected by `enable_direct_execution`.
pub fn worker_client(config: WorkerConfig, bus: EventBus) -> Arc<dyn WorkerClient> {
    if config.enable_direct_execution {
        info!(command = %config.command, "Using process worker");
        Arc::new(ProcessOrchestrator::new(config, bus))
    } else {
        info!("Direct execution disabled, using stub worker");
        Arc::new(StubWorker::new(bus))
    }
}
