//! Requests started over HTTP that can still be stopped.
//!
//! A stream crawl owns one worker per source; a paged crawl or analysis owns
//! one background task. Stopping a request stops both kinds.

use dashmap::DashMap;
use jobstream_worker::WorkerClient;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio::task::AbortHandle;
use tracing::info;

#[derive(Debug, Default)]
struct InFlight {
    worker_keys: Vec<String>,
    task: Option<AbortHandle>,
}

/// Shared table of in-flight requests, keyed by request id
#[derive(Debug, Clone, Default)]
pub struct InFlightRequests {
    entries: Arc<DashMap<String, InFlight>>,
}

impl InFlightRequests {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the worker registry keys a request fanned out to.
    pub fn track_workers(&self, request_id: &str, worker_keys: Vec<String>) {
        self.entries
            .entry(request_id.to_string())
            .or_default()
            .worker_keys = worker_keys;
    }

    /// Record the background task driving a request.
    pub fn track_task(&self, request_id: &str, task: AbortHandle) {
        self.entries.entry(request_id.to_string()).or_default().task = Some(task);
    }

    /// Spawn the task driving a request and track it until it returns.
    ///
    /// The task starts only after it is tracked, so a fast finish never
    /// leaves a stale entry behind.
    pub fn spawn_tracked<F>(&self, request_id: &str, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let (ready_tx, ready_rx) = oneshot::channel::<()>();
        let entries = self.clone();
        let id = request_id.to_string();
        let handle = tokio::spawn(async move {
            if ready_rx.await.is_err() {
                return;
            }
            task.await;
            entries.finish(&id);
        });
        self.track_task(request_id, handle.abort_handle());
        let _ = ready_tx.send(());
    }

    /// Forget a request that finished on its own.
    pub fn finish(&self, request_id: &str) {
        self.entries.remove(request_id);
    }

    pub fn contains(&self, request_id: &str) -> bool {
        self.entries.contains_key(request_id)
    }

    /// Whether a background task drives the request.
    pub fn has_task(&self, request_id: &str) -> bool {
        self.entries
            .get(request_id)
            .is_some_and(|entry| entry.task.is_some())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Stop a request's workers and abort its task.
    ///
    /// Returns `false` when nothing was in flight under `request_id`.
    pub fn stop(&self, request_id: &str, worker: &dyn WorkerClient) -> bool {
        let Some((_, entry)) = self.entries.remove(request_id) else {
            return worker.stop(request_id);
        };

        let mut stopped = false;
        for key in &entry.worker_keys {
            stopped |= worker.stop(key);
        }
        if let Some(task) = entry.task {
            stopped |= !task.is_finished();
            task.abort();
        }
        info!(request_id = %request_id, stopped, "Stop requested");
        stopped
    }

    /// Abort every tracked task. Workers are stopped through the client.
    pub fn abort_all(&self) -> usize {
        let ids: Vec<String> = self.entries.iter().map(|e| e.key().clone()).collect();
        let mut aborted = 0;
        for id in ids {
            if let Some((_, entry)) = self.entries.remove(&id) {
                if let Some(task) = entry.task {
                    task.abort();
                    aborted += 1;
                }
            }
        }
        aborted
    }
}
