//! Analysis endpoints

use super::crawl::StartedResponse;
use super::error::{ApiError, ApiResult};
use super::inflight::InFlightRequests;
use axum::extract::Extension;
use axum::response::Json;
use axum::routing::post;
use axum::Router;
use jobstream_bus::{channel_for_request, EventBus};
use jobstream_core::{run_analysis, AnalysisRequest, CompletionNotifier, HeuristicScorer, SourceTracker};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Body of `POST /api/analysis`; either `jobIds` or `jobUrl` is required
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisBody {
    #[serde(default)]
    pub resume_text: String,
    #[serde(default)]
    pub job_ids: Vec<String>,
    #[serde(default)]
    pub job_url: Option<String>,
}

impl AnalysisBody {
    fn into_request(self) -> ApiResult<AnalysisRequest> {
        let job_ids: Vec<String> = self
            .job_ids
            .into_iter()
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .collect();
        let job_ids = match (job_ids.is_empty(), self.job_url) {
            (false, _) => job_ids,
            (true, Some(url)) if !url.trim().is_empty() => vec![url.trim().to_string()],
            _ => {
                return Err(ApiError::bad_request(
                    "Provide either jobIds (list) or jobUrl (string)",
                ))
            }
        };
        Ok(AnalysisRequest {
            resume_text: self.resume_text,
            job_ids,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CompleteAnalysisBody {
    request_id: String,
    #[serde(default = "default_source")]
    source: String,
}

fn default_source() -> String {
    "analysis".to_string()
}

async fn start_analysis(
    Extension(bus): Extension<EventBus>,
    Extension(tracker): Extension<Arc<SourceTracker>>,
    Extension(inflight): Extension<InFlightRequests>,
    Json(body): Json<AnalysisBody>,
) -> ApiResult<Json<StartedResponse>> {
    let request = body.into_request()?;
    let request_id = format!("analysis-{}", Uuid::new_v4());
    info!(request_id = %request_id, jobs = request.job_ids.len(), "Analysis requested");

    let task_id = request_id.clone();
    inflight.spawn_tracked(&request_id, async move {
        let result = run_analysis(&task_id, &request, &HeuristicScorer, &bus, tracker.as_ref()).await;
        if let Err(e) = result {
            // analysisError was already emitted
            warn!(request_id = %task_id, error = %e, "Analysis failed");
            bus.complete(&channel_for_request(&task_id), "failed");
        }
    });

    Ok(Json(StartedResponse::started(request_id)))
}

/// An external producer reports the analysis finished.
async fn complete_analysis(
    Extension(bus): Extension<EventBus>,
    Extension(tracker): Extension<Arc<SourceTracker>>,
    Json(body): Json<CompleteAnalysisBody>,
) -> ApiResult<Json<serde_json::Value>> {
    if body.request_id.trim().is_empty() {
        return Err(ApiError::bad_request("requestId is required"));
    }
    bus.publish(
        &channel_for_request(&body.request_id),
        "analysis",
        json!({ "kind": "analysisAllComplete", "source": body.source }),
    );
    tracker.completed(&body.request_id);
    Ok(Json(json!({
        "ok": true,
        "requestId": body.request_id,
        "source": body.source,
        "completed": true,
    })))
}

/// Create analysis routes
pub fn analysis_routes() -> Router {
    Router::new()
        .route("/api/analysis", post(start_analysis))
        .route("/api/analysis/complete-source", post(complete_analysis))
}
