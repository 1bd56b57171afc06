//! Server-sent event stream of a request channel
//!
//! `GET /api/stream/{id}` subscribes to `req:{id}`. Bus events become named SSE
//! events carrying the JSON payload; heartbeats become comment lines. The
//! response ends after `done`.

use super::error::ApiResult;
use axum::extract::{Extension, Path};
use axum::http::header;
use axum::response::sse::{Event, Sse};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use futures::{Stream, StreamExt};
use jobstream_bus::{request_channel, BusMessage, EventBus, SubscriberId};
use serde::Deserialize;
use serde_json::{json, Value};
use std::convert::Infallible;
use tracing::{debug, warn};

/// Body of `POST /api/stream/ingest`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestBody {
    pub request_id: String,
    #[serde(default = "default_event")]
    pub event: String,
    #[serde(default)]
    pub payload: Value,
}

fn default_event() -> String {
    "analysis".to_string()
}

/// Detaches the subscriber when the response body is dropped.
struct DetachOnDrop {
    bus: EventBus,
    channel: String,
    id: SubscriberId,
}

impl Drop for DetachOnDrop {
    fn drop(&mut self) {
        if self.bus.unsubscribe(&self.channel, self.id) {
            debug!(channel = %self.channel, "Client disconnected");
        }
    }
}

/// Map one bus message to an SSE frame.
pub fn to_sse_event(message: BusMessage) -> Event {
    match message {
        BusMessage::Event(event) => {
            let data = match serde_json::to_string(&event.payload) {
                Ok(data) => data,
                Err(e) => {
                    warn!(event = %event.event_type, error = %e, "Unserializable payload");
                    "{}".to_string()
                }
            };
            Event::default().event(event.event_type).data(data)
        }
        BusMessage::Ping { timestamp } => {
            Event::default().comment(format!("ping {}", timestamp.timestamp_millis()))
        }
    }
}

fn event_stream(bus: EventBus, channel: String) -> impl Stream<Item = Result<Event, Infallible>> {
    let subscription = bus.subscribe(&channel);
    let guard = DetachOnDrop {
        bus,
        id: subscription.id(),
        channel,
    };
    subscription.into_stream().map(move |message| {
        let _ = &guard;
        Ok(to_sse_event(message))
    })
}

async fn stream(
    Extension(bus): Extension<EventBus>,
    Path(id): Path<String>,
) -> ApiResult<Response> {
    let channel = request_channel(&id)?;
    let sse = Sse::new(event_stream(bus, channel));
    Ok((
        [
            (header::CACHE_CONTROL, "no-cache, no-transform"),
            (header::HeaderName::from_static("x-accel-buffering"), "no"),
        ],
        sse,
    )
        .into_response())
}

/// Publish an event on behalf of an external producer.
async fn ingest(
    Extension(bus): Extension<EventBus>,
    Json(body): Json<IngestBody>,
) -> ApiResult<Json<Value>> {
    let channel = request_channel(&body.request_id)?;
    let payload = if body.payload.is_null() {
        json!({})
    } else {
        body.payload
    };
    let delivered = bus.publish(&channel, &body.event, payload);
    Ok(Json(json!({
        "ok": true,
        "requestId": body.request_id,
        "event": body.event,
        "delivered": delivered,
    })))
}

/// Create stream routes
pub fn stream_routes() -> Router {
    Router::new()
        .route("/api/stream/ingest", post(ingest))
        .route("/api/stream/:id", get(stream))
}
