//! Health check endpoint

use axum::extract::Extension;
use axum::response::Json;
use axum::routing::get;
use axum::Router;
use jobstream_bus::EventBus;
use jobstream_worker::WorkerClient;
use serde::Serialize;
use std::sync::Arc;

/// Health response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub worker: &'static str,
    pub active_workers: usize,
    pub channels: usize,
    pub heartbeat_running: bool,
}

async fn health_check(
    Extension(bus): Extension<EventBus>,
    Extension(worker): Extension<Arc<dyn WorkerClient>>,
) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        worker: worker.name(),
        active_workers: worker.active_count(),
        channels: bus.channel_count(),
        heartbeat_running: bus.heartbeat_running(),
    })
}

/// Create health routes
pub fn health_routes() -> Router {
    Router::new().route("/health", get(health_check))
}
