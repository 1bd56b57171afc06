//! Channel key derivation.
//!
//! Every request streams on exactly one channel. Producers and the transport
//! derive the key through these helpers so the prefix lives in one place.

use crate::error::{Error, Result};

/// Prefix shared by all request channels
pub const REQUEST_CHANNEL_PREFIX: &str = "req:";

/// Channel key for a request id.
#[must_use]
pub fn channel_for_request(request_id: &str) -> String {
    format!("{REQUEST_CHANNEL_PREFIX}{request_id}")
}

/// Channel key for a request id supplied by a client.
///
/// Blank ids would all collapse onto `req:`, so they are rejected.
pub fn request_channel(request_id: &str) -> Result<String> {
    if request_id.trim().is_empty() {
        return Err(Error::InvalidChannel(channel_for_request(request_id)));
    }
    Ok(channel_for_request(request_id))
}
