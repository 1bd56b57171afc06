//! EventBus - per-channel broadcast with heartbeat and explicit completion.
//!
//! Producers publish `(channel, type, payload)`; every subscriber currently
//! attached to that channel receives one copy. Nothing is buffered for
//! subscribers that join later.

use crate::registry::ChannelRegistry;
use crate::subscriber::{ChannelSink, Subscriber, SubscriberId, Subscription};
use crate::types::{event_types, BusEvent, BusMessage};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Bus configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusConfig {
    /// Heartbeat interval in seconds (0 disables the ticker)
    #[serde(default = "default_heartbeat_secs")]
    pub heartbeat_secs: u64,
}

fn default_heartbeat_secs() -> u64 {
    20
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            heartbeat_secs: default_heartbeat_secs(),
        }
    }
}

/// Channel-addressed event bus.
///
/// Cheap to clone; all clones share one registry and one heartbeat ticker.
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<BusInner>,
}

struct BusInner {
    registry: ChannelRegistry,
    heartbeat_every: Duration,
    heartbeat_started: AtomicBool,
    cancel: CancellationToken,
}

impl EventBus {
    /// Create a bus with the given configuration.
    #[must_use]
    pub fn new(config: BusConfig) -> Self {
        Self {
            inner: Arc::new(BusInner {
                registry: ChannelRegistry::new(),
                heartbeat_every: Duration::from_secs(config.heartbeat_secs),
                heartbeat_started: AtomicBool::new(false),
                cancel: CancellationToken::new(),
            }),
        }
    }

    /// Subscribe to a channel.
    ///
    /// The returned subscription has already received a `connected` event so
    /// the transport can flush its headers right away.
    pub fn subscribe(&self, channel: &str) -> Subscription {
        let (sink, receiver) = ChannelSink::new();
        let id = self.attach(channel, Arc::new(sink));
        Subscription::new(id, channel, receiver)
    }

    /// Attach a caller-supplied sink to a channel.
    ///
    /// If the initial `connected` event cannot be delivered the sink is closed
    /// and never registered.
    pub fn attach(&self, channel: &str, sink: Arc<dyn Subscriber>) -> SubscriberId {
        let id = SubscriberId::new();
        let connected = BusEvent::new(
            event_types::CONNECTED,
            json!({
                "ok": true,
                "channel": channel,
                "ts": Utc::now().timestamp_millis(),
            }),
        );

        if let Err(e) = sink.send(BusMessage::Event(connected)) {
            warn!(channel = %channel, error = %e, "Failed to send connected event");
            sink.close();
            return id;
        }

        self.inner.registry.insert(channel, id, sink);
        self.ensure_heartbeat();

        info!(
            channel = %channel,
            subscriber = %id,
            subscribers = self.inner.registry.len(channel),
            "Subscriber attached"
        );
        id
    }

    /// Publish an event to every current subscriber of `channel`.
    ///
    /// Returns the number of subscribers that accepted the event. A subscriber
    /// whose send fails is removed; the others are unaffected.
    pub fn publish(&self, channel: &str, event_type: &str, payload: Value) -> usize {
        let subscribers = self.inner.registry.snapshot(channel);
        if subscribers.is_empty() {
            warn!(
                channel = %channel,
                event = %event_type,
                "No subscribers attached, event dropped"
            );
            return 0;
        }

        debug!(
            channel = %channel,
            event = %event_type,
            subscribers = subscribers.len(),
            "Publishing event"
        );

        let event = BusEvent::new(event_type, payload);
        let mut delivered = 0;
        for (id, sink) in subscribers {
            match sink.send(BusMessage::Event(event.clone())) {
                Ok(()) => delivered += 1,
                Err(e) => {
                    warn!(
                        channel = %channel,
                        event = %event_type,
                        subscriber = %id,
                        error = %e,
                        "Send failed, dropping subscriber"
                    );
                    self.inner.drop_subscriber(channel, id);
                }
            }
        }
        delivered
    }

    /// Send the terminal `done` event, close every subscriber and delete the
    /// channel. Completing an absent channel is a no-op.
    pub fn complete(&self, channel: &str, reason: &str) {
        let subscribers = self.inner.registry.take(channel);
        if subscribers.is_empty() {
            info!(channel = %channel, "Complete: no subscribers");
            return;
        }

        let done = BusEvent::new(event_types::DONE, json!({ "ok": true, "reason": reason }));
        let count = subscribers.len();
        for (id, sink) in subscribers {
            if let Err(e) = sink.send(BusMessage::Event(done.clone())) {
                debug!(channel = %channel, subscriber = %id, error = %e, "Done not delivered");
            }
            sink.close();
        }

        info!(channel = %channel, reason = %reason, subscribers = count, "Channel completed");
    }

    /// Explicitly remove a subscriber (transport disconnect, error, timeout).
    ///
    /// Returns `false` if the subscriber was not registered.
    pub fn unsubscribe(&self, channel: &str, id: SubscriberId) -> bool {
        let removed = self.inner.drop_subscriber(channel, id);
        if removed {
            info!(
                channel = %channel,
                subscriber = %id,
                subscribers = self.inner.registry.len(channel),
                "Subscriber detached"
            );
        }
        removed
    }

    /// Ping every subscriber of every channel once.
    ///
    /// Returns the number of pings delivered. The ticker calls this on each
    /// interval.
    pub fn send_heartbeat(&self) -> usize {
        self.inner.beat()
    }

    /// Number of subscribers on a channel.
    #[must_use]
    pub fn subscriber_count(&self, channel: &str) -> usize {
        self.inner.registry.len(channel)
    }

    /// Whether a channel currently exists.
    #[must_use]
    pub fn has_channel(&self, channel: &str) -> bool {
        self.inner.registry.contains(channel)
    }

    /// Number of live channels.
    #[must_use]
    pub fn channel_count(&self) -> usize {
        self.inner.registry.channel_count()
    }

    /// Whether the heartbeat ticker has been started.
    #[must_use]
    pub fn heartbeat_running(&self) -> bool {
        self.inner.heartbeat_started.load(Ordering::SeqCst) && !self.inner.cancel.is_cancelled()
    }

    /// Stop the heartbeat and complete every open channel.
    pub fn shutdown(&self, reason: &str) {
        self.inner.cancel.cancel();
        for channel in self.inner.registry.channels() {
            self.complete(&channel, reason);
        }
    }

    /// Start the shared ticker on first use, if a runtime is available.
    fn ensure_heartbeat(&self) {
        if self.inner.heartbeat_every.is_zero() || self.inner.cancel.is_cancelled() {
            return;
        }
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            debug!("No tokio runtime, heartbeat not started");
            return;
        };
        if self.inner.heartbeat_started.swap(true, Ordering::SeqCst) {
            return;
        }

        let every = self.inner.heartbeat_every;
        debug!(interval_secs = every.as_secs(), "Starting heartbeat ticker");
        handle.spawn(heartbeat_loop(
            Arc::downgrade(&self.inner),
            every,
            self.inner.cancel.clone(),
        ));
    }
}

impl BusInner {
    /// Single removal path shared by publish, heartbeat and unsubscribe.
    fn drop_subscriber(&self, channel: &str, id: SubscriberId) -> bool {
        match self.registry.remove(channel, id) {
            Some(sink) => {
                sink.close();
                true
            }
            None => false,
        }
    }

    fn beat(&self) -> usize {
        let mut delivered = 0;
        for channel in self.registry.channels() {
            for (id, sink) in self.registry.snapshot(&channel) {
                let ping = BusMessage::Ping {
                    timestamp: Utc::now(),
                };
                match sink.send(ping) {
                    Ok(()) => delivered += 1,
                    Err(_) => {
                        debug!(channel = %channel, subscriber = %id, "Heartbeat failed, dropping subscriber");
                        self.drop_subscriber(&channel, id);
                    }
                }
            }
        }
        delivered
    }
}

impl Drop for BusInner {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn heartbeat_loop(inner: Weak<BusInner>, every: Duration, cancel: CancellationToken) {
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // First tick completes immediately.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }
        let Some(bus) = inner.upgrade() else {
            break;
        };
        let pinged = bus.beat();
        drop(bus);
        debug!(pinged, "Heartbeat");
    }
    debug!("Heartbeat ticker stopped");
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(BusConfig::default())
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("channels", &self.inner.registry.channel_count())
            .field("heartbeat_every", &self.inner.heartbeat_every)
            .finish()
    }
}
