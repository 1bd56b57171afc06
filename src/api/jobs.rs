//! Single job lookup

use super::error::{ApiError, ApiResult};
use axum::extract::{Extension, Query};
use axum::response::Json;
use axum::routing::get;
use axum::Router;
use jobstream_worker::{JobDetails, WorkerClient};
use serde::Deserialize;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
pub struct ParseQuery {
    #[serde(default)]
    pub url: String,
}

/// `GET /api/jobs/parse?url=` parses one posting through the worker.
async fn parse_job(
    Extension(worker): Extension<Arc<dyn WorkerClient>>,
    Query(query): Query<ParseQuery>,
) -> ApiResult<Json<JobDetails>> {
    let url = query.url.trim();
    if url.is_empty() {
        return Err(ApiError::bad_request("url is required"));
    }
    Ok(Json(worker.fetch_by_url(url).await?))
}

/// Create job routes
pub fn jobs_routes() -> Router {
    Router::new().route("/api/jobs/parse", get(parse_job))
}
