//! Error types for jobstream-worker

use thiserror::Error;

/// Worker error type
#[derive(Debug, Error)]
pub enum Error {
    /// Request rejected before any process was spawned
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// A worker is already registered under this request id
    #[error("already in progress: {0}")]
    AlreadyRunning(String),

    /// Process could not be started
    #[error("spawn failed: {0}")]
    Spawn(String),

    /// Worker did not finish in time
    #[error("timeout after {0}s")]
    Timeout(u64),

    /// Worker reported a failure line (`error` / `parseError`)
    #[error("worker error: {0}")]
    Worker(String),

    /// Worker exited without producing the expected result line
    #[error("no result: {0}")]
    NoResult(String),

    /// Output could not be mapped into the expected shape
    #[error("protocol error: {0}")]
    Protocol(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
