//! Jobstream Bus - channel-addressed event broadcast
//!
//! This crate provides the in-memory pub/sub primitive that carries request
//! progress from workers to connected clients:
//! - Channels: one logical stream per request (`req:<request_id>`)
//! - Subscribers: independent sinks, removed on the first failed send
//! - Heartbeat: a single ticker per bus pinging every live subscriber
//! - Completion: an explicit terminal `done` event that closes the channel

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod bus;
pub mod channel;
pub mod error;
pub mod registry;
pub mod subscriber;
pub mod types;

pub use bus::{BusConfig, EventBus};
pub use channel::{channel_for_request, request_channel, REQUEST_CHANNEL_PREFIX};
pub use error::{Error, Result};
pub use registry::ChannelRegistry;
pub use subscriber::{ChannelSink, Subscriber, SubscriberId, Subscription};
pub use types::{event_types, BusEvent, BusMessage};
