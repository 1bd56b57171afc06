//! Process registry - at most one live worker per request id.
//!
//! Entries are reserved atomically through the map's entry API and removed
//! by the [`RegistrySlot`] guard, so every exit path of a supervisor
//! (including panics and task cancellation) unregisters its process.

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Lifecycle state of a worker process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ProcessState {
    /// Slot reserved, process not started yet
    Spawning,
    /// Process running
    Running,
    /// Timeout elapsed, termination pending
    TimedOut,
    /// Process exited on its own
    Exited {
        /// Exit code (`None` when killed by a signal)
        code: Option<i32>,
    },
    /// Process was terminated by the orchestrator
    Killed,
    /// Spawn or I/O failure
    Failed,
}

impl fmt::Display for ProcessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Spawning => write!(f, "spawning"),
            Self::Running => write!(f, "running"),
            Self::TimedOut => write!(f, "timed_out"),
            Self::Exited { code: Some(code) } => write!(f, "exited({code})"),
            Self::Exited { code: None } => write!(f, "exited(signal)"),
            Self::Killed => write!(f, "killed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Snapshot of one registered process.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessInfo {
    /// Request id (registry key)
    pub request_id: String,
    /// Program and arguments
    pub command: String,
    /// Working directory
    pub working_directory: PathBuf,
    /// Reservation time
    pub started_at: DateTime<Utc>,
    /// Current state
    #[serde(flatten)]
    pub state: ProcessState,
    /// OS process id once spawned
    pub pid: Option<u32>,
}

struct ProcessEntry {
    info: ProcessInfo,
    cancel: CancellationToken,
}

/// Concurrent registry of live worker processes.
#[derive(Clone, Default)]
pub struct ProcessRegistry {
    entries: Arc<DashMap<String, ProcessEntry>>,
}

impl ProcessRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve the slot for `request_id`.
    ///
    /// Returns `None` if a process is already registered under that id.
    pub fn reserve(
        &self,
        request_id: &str,
        command: String,
        working_directory: PathBuf,
    ) -> Option<RegistrySlot> {
        match self.entries.entry(request_id.to_string()) {
            Entry::Occupied(_) => None,
            Entry::Vacant(vacant) => {
                let cancel = CancellationToken::new();
                vacant.insert(ProcessEntry {
                    info: ProcessInfo {
                        request_id: request_id.to_string(),
                        command,
                        working_directory,
                        started_at: Utc::now(),
                        state: ProcessState::Spawning,
                        pid: None,
                    },
                    cancel: cancel.clone(),
                });
                debug!(request_id = %request_id, "Process slot reserved");
                Some(RegistrySlot {
                    registry: self.clone(),
                    request_id: request_id.to_string(),
                    cancel,
                })
            }
        }
    }

    /// Snapshot of one entry.
    #[must_use]
    pub fn get(&self, request_id: &str) -> Option<ProcessInfo> {
        self.entries.get(request_id).map(|e| e.info.clone())
    }

    /// Snapshot of every entry.
    #[must_use]
    pub fn list(&self) -> Vec<ProcessInfo> {
        self.entries.iter().map(|e| e.info.clone()).collect()
    }

    /// Whether a process is registered under `request_id`.
    #[must_use]
    pub fn contains(&self, request_id: &str) -> bool {
        self.entries.contains_key(request_id)
    }

    /// Number of registered processes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no process is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Signal the supervisor of `request_id` to stop. Returns `false` if absent.
    pub fn stop(&self, request_id: &str) -> bool {
        match self.entries.get(request_id) {
            Some(entry) => {
                entry.cancel.cancel();
                true
            }
            None => false,
        }
    }

    /// Signal every supervisor to stop. Returns how many were signalled.
    pub fn stop_all(&self) -> usize {
        let mut count = 0;
        for entry in self.entries.iter() {
            entry.cancel.cancel();
            count += 1;
        }
        count
    }

    fn update(&self, request_id: &str, f: impl FnOnce(&mut ProcessInfo)) {
        if let Some(mut entry) = self.entries.get_mut(request_id) {
            f(&mut entry.info);
        }
    }
}

impl fmt::Debug for ProcessRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessRegistry")
            .field("entries", &self.entries.len())
            .finish()
    }
}

/// Ownership of one registry entry. Dropping it unregisters the process.
pub struct RegistrySlot {
    registry: ProcessRegistry,
    request_id: String,
    cancel: CancellationToken,
}

impl RegistrySlot {
    /// Request id this slot was reserved for.
    #[must_use]
    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// Token fired by [`ProcessRegistry::stop`].
    #[must_use]
    pub fn cancelled(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Record a state transition.
    pub fn set_state(&self, state: ProcessState) {
        self.registry
            .update(&self.request_id, |info| info.state = state);
    }

    /// Record the spawned process id and mark it running.
    pub fn set_running(&self, pid: Option<u32>) {
        self.registry.update(&self.request_id, |info| {
            info.pid = pid;
            info.state = ProcessState::Running;
        });
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> Option<ProcessState> {
        self.registry.get(&self.request_id).map(|info| info.state)
    }
}

impl Drop for RegistrySlot {
    fn drop(&mut self) {
        self.registry.entries.remove(&self.request_id);
        debug!(request_id = %self.request_id, "Process slot released");
    }
}

impl fmt::Debug for RegistrySlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistrySlot")
            .field("request_id", &self.request_id)
            .finish()
    }
}
