use super::*;
use crate::api::crawl::StartedResponse;
use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use jobstream_bus::{BusConfig, BusMessage, Subscription};
use jobstream_worker::StubWorker;
use serde_json::{json, Value};
use std::time::Duration;
use tower::ServiceExt;

fn context(delay: Duration) -> ApiContext {
    let bus = EventBus::new(BusConfig { heartbeat_secs: 0 });
    let worker = Arc::new(StubWorker::new(bus.clone()).with_delay(delay));
    ApiContext::new(bus, worker, CrawlDefaults::default())
}

async fn call(ctx: &ApiContext, request: Request<Body>) -> (StatusCode, Value) {
    let response = api_router(ctx).oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::post(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// Collect event types until `done` or the timeout.
async fn collect_until_done(sub: &mut Subscription) -> Vec<String> {
    let mut types = Vec::new();
    let _ = tokio::time::timeout(Duration::from_secs(5), async {
        while let Some(message) = sub.recv().await {
            if let BusMessage::Event(event) = message {
                types.push(event.event_type.clone());
                if event.is_terminal() {
                    break;
                }
            }
        }
    })
    .await;
    types
}

#[tokio::test]
async fn test_health() {
    let ctx = context(Duration::ZERO);
    let (status, body) = call(&ctx, Request::get("/health").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["worker"], "stub");
    assert_eq!(body["activeWorkers"], 0);
}

#[tokio::test]
async fn test_stream_crawl_fans_out_and_completes_once() {
    let ctx = context(Duration::from_millis(30));
    let (status, body) = call(
        &ctx,
        Request::post("/api/crawl?sources=lever,greenhouse&keywords=rust&maxPages=2")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let started: StartedResponse = serde_json::from_value(body).unwrap();
    assert!(started.request_id.starts_with("crawl-"));
    assert_eq!(started.sse_url, format!("/api/stream/{}", started.request_id));

    let mut sub = ctx.bus.subscribe(&format!("req:{}", started.request_id));
    let types = collect_until_done(&mut sub).await;

    assert_eq!(types.iter().filter(|t| *t == "page").count(), 4);
    assert_eq!(types.iter().filter(|t| *t == "complete").count(), 2);
    assert_eq!(types.iter().filter(|t| *t == "done").count(), 1);
    assert_eq!(types.last().map(String::as_str), Some("done"));
}

#[tokio::test]
async fn test_stream_crawl_requires_sources() {
    let ctx = context(Duration::ZERO);
    let (status, body) = call(
        &ctx,
        Request::post("/api/crawl?sources=%20,%20&keywords=rust")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_REQUEST");
}

#[tokio::test]
async fn test_paged_crawl_streams_pages() {
    let ctx = context(Duration::from_millis(30));
    let (status, body) = call(
        &ctx,
        post_json(
            "/api/crawl/paged",
            json!({"source": "lever", "query": "rust", "maxItems": 12, "pageSize": 5}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let request_id = body["requestId"].as_str().unwrap().to_string();

    let mut sub = ctx.bus.subscribe(&format!("req:{request_id}"));
    let types = collect_until_done(&mut sub).await;
    assert_eq!(types, vec!["connected", "page", "page", "page", "crawlComplete", "done"]);
}

#[tokio::test]
async fn test_paged_crawl_requires_source() {
    let ctx = context(Duration::ZERO);
    let (status, _) = call(&ctx, post_json("/api/crawl/paged", json!({"query": "rust"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_stop_paged_crawl() {
    let ctx = context(Duration::from_millis(500));
    let (_, body) = call(
        &ctx,
        post_json("/api/crawl/paged", json!({"source": "lever", "query": "rust"})),
    )
    .await;
    let request_id = body["requestId"].as_str().unwrap().to_string();
    let mut sub = ctx.bus.subscribe(&format!("req:{request_id}"));

    let (status, body) = call(
        &ctx,
        Request::post(format!("/api/crawl/{request_id}/stop"))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["stopped"], true);
    assert!(!ctx.inflight.contains(&request_id));

    let types = collect_until_done(&mut sub).await;
    assert_eq!(types, vec!["connected", "done"]);
}

#[tokio::test]
async fn test_stop_unknown_request() {
    let ctx = context(Duration::ZERO);
    let (status, body) = call(
        &ctx,
        Request::delete("/api/crawl/nope").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["stopped"], false);
}

#[tokio::test]
async fn test_analysis_start_and_validation() {
    let ctx = context(Duration::ZERO);
    let (status, body) = call(
        &ctx,
        post_json(
            "/api/analysis",
            json!({"resumeText": "Rust", "jobUrl": "https://jobs.example.com/1"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["requestId"].as_str().unwrap().starts_with("analysis-"));

    let (status, _) = call(&ctx, post_json("/api/analysis", json!({"resumeText": "Rust"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_complete_source_closes_channel() {
    let ctx = context(Duration::ZERO);
    ctx.tracker.expect("r9", ["a", "b"]);
    let mut sub = ctx.bus.subscribe("req:r9");

    let (_, body) = call(
        &ctx,
        post_json("/api/crawl/complete-source", json!({"requestId": "r9", "source": "a"})),
    )
    .await;
    assert_eq!(body["remaining"], 1);
    assert_eq!(body["completed"], false);
    assert!(ctx.bus.has_channel("req:r9"));

    let (_, body) = call(
        &ctx,
        post_json("/api/crawl/complete-source", json!({"requestId": "r9", "source": "b"})),
    )
    .await;
    assert_eq!(body["completed"], true);
    assert!(!ctx.bus.has_channel("req:r9"));

    let types = collect_until_done(&mut sub).await;
    assert_eq!(types.last().map(String::as_str), Some("done"));
}

#[tokio::test]
async fn test_ingest_publishes_on_channel() {
    let ctx = context(Duration::ZERO);
    let mut sub = ctx.bus.subscribe("req:ext-1");

    let (status, body) = call(
        &ctx,
        post_json(
            "/api/stream/ingest",
            json!({"requestId": "ext-1", "event": "jobAnalyzed", "payload": {"score": 0.5}}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["delivered"], 1);

    let _connected = sub.recv().await.unwrap();
    let event = sub.recv().await.unwrap();
    let event = event.event().unwrap();
    assert_eq!(event.event_type, "jobAnalyzed");
    assert_eq!(event.payload["score"], 0.5);
}

#[tokio::test]
async fn test_stream_endpoint_headers() {
    let ctx = context(Duration::ZERO);
    let response = api_router(&ctx)
        .oneshot(Request::get("/api/stream/r1").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let headers = response.headers();
    assert_eq!(headers[header::CONTENT_TYPE], "text/event-stream");
    assert_eq!(headers[header::CACHE_CONTROL], "no-cache, no-transform");
    assert_eq!(headers["x-accel-buffering"], "no");
    assert_eq!(ctx.bus.subscriber_count("req:r1"), 1);

    drop(response);
    assert_eq!(ctx.bus.subscriber_count("req:r1"), 0);
}

#[tokio::test]
async fn test_parse_job() {
    let ctx = context(Duration::ZERO);
    let (status, body) = call(
        &ctx,
        Request::get("/api/jobs/parse?url=https://boards.acme.com/jobs/rust-engineer")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["url"], "https://boards.acme.com/jobs/rust-engineer");

    let (status, _) = call(
        &ctx,
        Request::get("/api/jobs/parse?url=").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_blank_request_id_rejected() {
    let ctx = context(Duration::ZERO);
    let (status, body) = call(
        &ctx,
        Request::get("/api/stream/%20").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_REQUEST");
    assert_eq!(ctx.bus.channel_count(), 0);

    let (status, _) = call(
        &ctx,
        post_json("/api/stream/ingest", json!({"requestId": " ", "payload": {}})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
