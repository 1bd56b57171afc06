//! Error types for jobstream-core
//!
//! This module provides error types and user-friendly error formatting.

use thiserror::Error;

/// Core error type
#[derive(Debug, Error)]
pub enum Error {
    /// Worker invocation failed
    #[error("worker error: {0}")]
    Worker(#[from] jobstream_worker::Error),

    /// A page could not be fetched; the crawl stops here
    #[error("page fetch failed for {source_key} page {page}: {message}")]
    PageFetch {
        /// Source being crawled
        source_key: String,
        /// Page that failed
        page: u32,
        /// Underlying failure
        message: String,
    },

    /// Request rejected before any work started
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Analysis failed
    #[error("analysis error: {0}")]
    Analysis(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Trait for user-friendly error messages
pub trait UserFriendlyError {
    /// Get a user-friendly error message
    fn user_message(&self) -> String;

    /// Get a suggestion for how to fix the error
    fn suggestion(&self) -> Option<String>;
}

impl UserFriendlyError for Error {
    fn user_message(&self) -> String {
        match self {
            Error::Worker(jobstream_worker::Error::Timeout(secs)) => {
                format!("Worker did not finish within {secs}s.")
            }
            Error::Worker(jobstream_worker::Error::Spawn(msg)) => {
                format!("Worker could not be started: {msg}")
            }
            Error::Worker(e) => format!("Worker failed: {e}"),
            Error::PageFetch {
                source_key, page, ..
            } => {
                format!("Fetching page {page} of '{source_key}' failed.")
            }
            Error::InvalidRequest(msg) => format!("Invalid request: {msg}"),
            Error::Analysis(msg) => format!("Analysis failed: {msg}"),
        }
    }

    fn suggestion(&self) -> Option<String> {
        match self {
            Error::Worker(jobstream_worker::Error::Spawn(_)) => Some(
                "Check [worker] command and working_directory in config/default.toml, \
                 or set worker.enable_direct_execution = false to use the stub worker."
                    .to_string(),
            ),
            Error::Worker(jobstream_worker::Error::Timeout(_)) => {
                Some("Raise worker.timeout_secs or narrow the search.".to_string())
            }
            Error::PageFetch { message, .. } => Some(format!("Worker said: {message}")),
            _ => None,
        }
    }
}

/// Format an error for display in the CLI
pub fn format_error_for_cli(error: &Error) -> String {
    let mut output = error.user_message();
    if let Some(suggestion) = error.suggestion() {
        output.push_str("\n\n");
        output.push_str(&suggestion);
    }
    output
}
