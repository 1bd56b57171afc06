//! SourceTracker - completes a fanned-out request once every source is done.

use crate::ports::CompletionNotifier;
use dashmap::DashMap;
use jobstream_bus::{channel_for_request, EventBus};
use serde_json::json;
use std::collections::HashSet;
use tracing::{debug, info};

/// Event emitted on the request channel for each finished source
pub const SOURCE_COMPLETE_EVENT: &str = "sourceComplete";

/// Reason carried by the final `done` event
pub const ALL_SOURCES_COMPLETE: &str = "all-sources-complete";

/// Tracks outstanding sources per request.
///
/// Requests that were never registered with [`expect`](Self::expect) complete
/// on their first `source_complete`.
#[derive(Debug)]
pub struct SourceTracker {
    bus: EventBus,
    pending: DashMap<String, HashSet<String>>,
}

impl SourceTracker {
    /// Create a tracker completing channels on `bus`.
    #[must_use]
    pub fn new(bus: EventBus) -> Self {
        Self {
            bus,
            pending: DashMap::new(),
        }
    }

    /// Register the sources a request fans out to.
    ///
    /// Blank names are ignored; duplicates collapse.
    pub fn expect<I, S>(&self, request_id: &str, sources: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let set: HashSet<String> = sources
            .into_iter()
            .map(|s| s.as_ref().trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        debug!(request_id = %request_id, sources = set.len(), "Tracking sources");
        self.pending.insert(request_id.to_string(), set);
    }

    /// Sources still outstanding for a request.
    #[must_use]
    pub fn pending(&self, request_id: &str) -> usize {
        self.pending.get(request_id).map_or(0, |s| s.len())
    }

    /// Whether a request is being tracked.
    #[must_use]
    pub fn is_tracking(&self, request_id: &str) -> bool {
        self.pending.contains_key(request_id)
    }

    fn finish(&self, request_id: &str, reason: &str) {
        self.pending.remove(request_id);
        self.bus.complete(&channel_for_request(request_id), reason);
        info!(request_id = %request_id, reason = %reason, "Request complete");
    }
}

impl CompletionNotifier for SourceTracker {
    fn source_complete(&self, request_id: &str, source: &str) {
        let source = source.trim();
        let remaining = match self.pending.get_mut(request_id) {
            Some(mut outstanding) => {
                outstanding.remove(source);
                outstanding.len()
            }
            None => 0,
        };

        self.bus.publish(
            &channel_for_request(request_id),
            SOURCE_COMPLETE_EVENT,
            json!({ "kind": SOURCE_COMPLETE_EVENT, "source": source, "remaining": remaining }),
        );
        debug!(request_id = %request_id, source = %source, remaining, "Source complete");

        if remaining == 0 {
            self.finish(request_id, ALL_SOURCES_COMPLETE);
        }
    }

    fn completed(&self, request_id: &str) {
        self.finish(request_id, "completed");
    }
}
