//! Event and message types carried by the bus.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Well-known event type names.
///
/// Payloads are schema-less; the type string is the only contract consumers
/// switch on. Unknown types are forwarded unchanged.
pub mod event_types {
    /// Subscription established (synthetic, sent by the bus)
    pub const CONNECTED: &str = "connected";
    /// Worker process started for a request
    pub const CRAWL_START: &str = "crawlStart";
    /// One page folded into a crawl
    pub const PAGE: &str = "page";
    /// Paginated crawl finished
    pub const CRAWL_COMPLETE: &str = "crawlComplete";
    /// Analysis stage change
    pub const ANALYSIS_PROGRESS: &str = "analysisProgress";
    /// One job scored
    pub const JOB_ANALYZED: &str = "jobAnalyzed";
    /// Tailored documents are being generated
    pub const GENERATING_RESUME: &str = "generatingResume";
    /// Analysis finished with results
    pub const ANALYSIS_COMPLETE: &str = "analysisComplete";
    /// Analysis failed
    pub const ANALYSIS_ERROR: &str = "analysisError";
    /// Channel-scoped failure
    pub const ERROR: &str = "error";
    /// Worker emitted a line that is not a JSON object
    pub const PARSE_ERROR: &str = "parseError";
    /// Worker process exited
    pub const COMPLETE: &str = "complete";
    /// Terminal event sent by `complete()`; the channel is closed afterwards
    pub const DONE: &str = "done";
    /// Heartbeat (comment-only at the transport)
    pub const PING: &str = "ping";
}

/// A single event published on a channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusEvent {
    /// Event type (SSE event name at the transport boundary)
    #[serde(rename = "type")]
    pub event_type: String,
    /// Free-form payload
    pub payload: Value,
    /// When the bus accepted the event
    pub timestamp: DateTime<Utc>,
}

impl BusEvent {
    /// Create an event stamped with the current time.
    pub fn new(event_type: impl Into<String>, payload: Value) -> Self {
        Self {
            event_type: event_type.into(),
            payload,
            timestamp: Utc::now(),
        }
    }

    /// Whether this event ends the stream for a consumer.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.event_type == event_types::DONE
    }
}

/// What a subscriber sink receives.
#[derive(Debug, Clone, PartialEq)]
pub enum BusMessage {
    /// A published (or synthetic) event
    Event(BusEvent),
    /// Keep-alive; carries no payload semantics
    Ping {
        /// When the heartbeat fired
        timestamp: DateTime<Utc>,
    },
}

impl BusMessage {
    /// The event, if this is not a heartbeat.
    #[must_use]
    pub fn event(&self) -> Option<&BusEvent> {
        match self {
            Self::Event(event) => Some(event),
            Self::Ping { .. } => None,
        }
    }

    /// Event type name, `ping` for heartbeats.
    #[must_use]
    pub fn event_type(&self) -> &str {
        match self {
            Self::Event(event) => &event.event_type,
            Self::Ping { .. } => event_types::PING,
        }
    }

    /// Whether this is a heartbeat.
    #[must_use]
    pub fn is_ping(&self) -> bool {
        matches!(self, Self::Ping { .. })
    }
}
