//! Crawl endpoints
//!
//! - `POST /api/crawl` starts one streaming worker per source
//! - `POST /api/crawl/paged` runs the capped pagination loop in a task
//! - `POST /api/crawl/complete-source` reports one source as finished
//! - `POST /api/crawl/{id}/stop` (and `DELETE /api/crawl/{id}`) stops a request

use super::error::{ApiError, ApiResult};
use super::inflight::InFlightRequests;
use crate::server::config::CrawlDefaults;
use axum::extract::{Extension, Path, Query};
use axum::response::Json;
use axum::routing::{delete, post};
use axum::Router;
use jobstream_bus::{channel_for_request, EventBus};
use jobstream_core::{
    run_crawl, CompletionNotifier, CrawlRequest, SourceTracker, WorkerPageFetcher,
};
use jobstream_worker::{ExecuteOutcome, SearchRequest, WorkerClient};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Query of `POST /api/crawl`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamCrawlParams {
    /// Comma-separated source keys
    pub sources: String,
    #[serde(default)]
    pub keywords: String,
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,
    #[serde(default = "default_per_source_limit")]
    pub per_source_limit: u32,
}

fn default_max_pages() -> u32 {
    jobstream_worker::orchestrator::DEFAULT_MAX_PAGES
}

fn default_per_source_limit() -> u32 {
    jobstream_worker::orchestrator::DEFAULT_PER_SOURCE_LIMIT
}

/// Response of every endpoint that starts a request
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartedResponse {
    pub status: String,
    pub request_id: String,
    pub sse_url: String,
}

impl StartedResponse {
    pub fn started(request_id: String) -> Self {
        Self {
            status: "started".to_string(),
            sse_url: format!("/api/stream/{request_id}"),
            request_id,
        }
    }
}

/// Body of `POST /api/crawl/complete-source`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteSourceBody {
    pub request_id: String,
    #[serde(default = "default_source")]
    pub source: String,
}

fn default_source() -> String {
    "default".to_string()
}

/// Split a comma-separated source list; blanks and duplicates are dropped.
pub fn split_sources(sources: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for source in sources.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        if !out.iter().any(|s| s == source) {
            out.push(source.to_string());
        }
    }
    out
}

/// Start a streaming crawl.
///
/// Every source gets its own worker (registry key `<id>:<source>`) publishing
/// to the shared `req:<id>` channel. The channel completes once the last
/// worker has exited.
async fn start_crawl(
    Extension(worker): Extension<Arc<dyn WorkerClient>>,
    Extension(tracker): Extension<Arc<SourceTracker>>,
    Extension(inflight): Extension<InFlightRequests>,
    Query(params): Query<StreamCrawlParams>,
) -> ApiResult<Json<StartedResponse>> {
    let sources = split_sources(&params.sources);
    if sources.is_empty() {
        return Err(ApiError::bad_request("sources is required"));
    }

    let request_id = format!("crawl-{}", Uuid::new_v4());
    let channel = channel_for_request(&request_id);
    tracker.expect(&request_id, &sources);

    let mut keys = Vec::with_capacity(sources.len());
    let mut running = Vec::with_capacity(sources.len());
    for source in &sources {
        let key = format!("{request_id}:{source}");
        let request = SearchRequest::new(&key, source.as_str(), params.keywords.as_str())
            .with_channel(&channel)
            .with_limits(params.max_pages, params.per_source_limit);

        match worker.execute(request).await {
            Ok(ExecuteOutcome::Started(handle)) => {
                keys.push(key);
                running.push((source.clone(), handle));
            }
            Ok(ExecuteOutcome::AlreadyRunning) => {
                warn!(request_id = %request_id, source = %source, "Source already running");
            }
            Err(e) => {
                // Failure was published on the channel; the source is finished.
                warn!(request_id = %request_id, source = %source, error = %e, "Source failed to start");
                tracker.source_complete(&request_id, source);
            }
        }
    }

    inflight.track_workers(&request_id, keys);
    let waiter_id = request_id.clone();
    let waiter_inflight = inflight.clone();
    tokio::spawn(async move {
        let waits = running.into_iter().map(|(source, handle)| {
            let tracker = tracker.clone();
            let request_id = waiter_id.clone();
            async move {
                let state = handle.wait().await;
                info!(request_id = %request_id, source = %source, state = %state, "Source finished");
                tracker.source_complete(&request_id, &source);
            }
        });
        futures::future::join_all(waits).await;
        waiter_inflight.finish(&waiter_id);
    });

    info!(request_id = %request_id, sources = sources.len(), "Crawl started");
    Ok(Json(StartedResponse::started(request_id)))
}

/// Start a paginated crawl of one source.
async fn start_paged_crawl(
    Extension(worker): Extension<Arc<dyn WorkerClient>>,
    Extension(bus): Extension<EventBus>,
    Extension(tracker): Extension<Arc<SourceTracker>>,
    Extension(inflight): Extension<InFlightRequests>,
    Extension(defaults): Extension<CrawlDefaults>,
    Json(mut request): Json<CrawlRequest>,
) -> ApiResult<Json<StartedResponse>> {
    if request.source.trim().is_empty() {
        return Err(ApiError::bad_request("source is required"));
    }
    if request.page_size <= 0 {
        request.page_size = defaults.page_size;
    }
    if request.max_items <= 0 {
        request.max_items = defaults.default_max_items;
    }

    let request_id = format!("crawl-{}", Uuid::new_v4());
    let task_id = request_id.clone();
    inflight.spawn_tracked(&request_id, async move {
        let fetcher = WorkerPageFetcher::new(worker);
        if let Err(e) = run_crawl(&task_id, &request, &fetcher, &bus, tracker.as_ref()).await {
            warn!(request_id = %task_id, error = %e, "Paged crawl failed");
            let channel = channel_for_request(&task_id);
            bus.publish(
                &channel,
                jobstream_bus::event_types::ERROR,
                serde_json::json!({
                    "message": e.to_string(),
                    "timestamp": chrono::Utc::now().timestamp_millis(),
                }),
            );
            bus.complete(&channel, "failed");
        }
    });

    info!(request_id = %request_id, "Paged crawl started");
    Ok(Json(StartedResponse::started(request_id)))
}

async fn complete_source(
    Extension(tracker): Extension<Arc<SourceTracker>>,
    Json(body): Json<CompleteSourceBody>,
) -> ApiResult<Json<serde_json::Value>> {
    if body.request_id.trim().is_empty() {
        return Err(ApiError::bad_request("requestId is required"));
    }
    tracker.source_complete(&body.request_id, &body.source);
    let remaining = tracker.pending(&body.request_id);
    Ok(Json(serde_json::json!({
        "ok": true,
        "requestId": body.request_id,
        "source": body.source,
        "remaining": remaining,
        "completed": remaining == 0,
    })))
}

async fn stop_crawl(
    Extension(worker): Extension<Arc<dyn WorkerClient>>,
    Extension(bus): Extension<EventBus>,
    Extension(inflight): Extension<InFlightRequests>,
    Path(request_id): Path<String>,
) -> Json<serde_json::Value> {
    let had_task = inflight.has_task(&request_id);
    let stopped = inflight.stop(&request_id, worker.as_ref());
    if stopped && had_task {
        // Aborted tasks publish nothing themselves.
        bus.complete(&channel_for_request(&request_id), "stopped");
    }
    Json(serde_json::json!({
        "ok": true,
        "stopped": stopped,
        "requestId": request_id,
    }))
}

/// Create crawl routes
pub fn crawl_routes() -> Router {
    Router::new()
        .route("/api/crawl", post(start_crawl))
        .route("/api/crawl/paged", post(start_paged_crawl))
        .route("/api/crawl/complete-source", post(complete_source))
        .route("/api/crawl/:id/stop", post(stop_crawl))
        .route("/api/crawl/:id", delete(stop_crawl))
}
