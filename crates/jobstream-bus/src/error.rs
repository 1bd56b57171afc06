//! Error types for jobstream-bus

use thiserror::Error;

/// Bus error type
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// The subscriber's sink is closed (client went away)
    #[error("subscriber closed")]
    SubscriberClosed,

    /// Channel key is not usable
    #[error("invalid channel: {0}")]
    InvalidChannel(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
