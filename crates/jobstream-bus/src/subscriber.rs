//! Subscriber sinks.
//!
//! The bus only ever holds an `Arc<dyn Subscriber>` keyed by [`SubscriberId`].
//! The transport owns the receiving half and decides how messages reach the
//! client.

use crate::error::{Error, Result};
use crate::types::BusMessage;
use futures::Stream;
use std::fmt;
use std::sync::Mutex;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Opaque subscriber identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(Uuid);

impl SubscriberId {
    /// Allocate a fresh id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A sink that receives bus messages.
///
/// `send` must not block for long: a dead client should surface as an error,
/// which removes the subscriber.
pub trait Subscriber: Send + Sync {
    /// Deliver one message.
    fn send(&self, message: BusMessage) -> Result<()>;

    /// Close the sink. Later sends fail with [`Error::SubscriberClosed`].
    fn close(&self);
}

/// Subscriber backed by an unbounded tokio channel.
///
/// Sends never wait; they fail once the receiving [`Subscription`] is dropped
/// or the sink is closed.
pub struct ChannelSink {
    sender: Mutex<Option<mpsc::UnboundedSender<BusMessage>>>,
}

impl ChannelSink {
    /// Create a sink and its receiving half.
    #[must_use]
    pub fn new() -> (Self, mpsc::UnboundedReceiver<BusMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                sender: Mutex::new(Some(tx)),
            },
            rx,
        )
    }
}

impl Subscriber for ChannelSink {
    fn send(&self, message: BusMessage) -> Result<()> {
        let sender = self.sender.lock().unwrap_or_else(|e| e.into_inner());
        match sender.as_ref() {
            Some(tx) => tx.send(message).map_err(|_| Error::SubscriberClosed),
            None => Err(Error::SubscriberClosed),
        }
    }

    fn close(&self) {
        self.sender.lock().unwrap_or_else(|e| e.into_inner()).take();
    }
}

/// Receiving side of a bus subscription.
///
/// Dropping it disconnects the subscriber; the bus notices on the next
/// publish or heartbeat.
#[derive(Debug)]
pub struct Subscription {
    id: SubscriberId,
    channel: String,
    receiver: mpsc::UnboundedReceiver<BusMessage>,
}

impl Subscription {
    pub(crate) fn new(
        id: SubscriberId,
        channel: &str,
        receiver: mpsc::UnboundedReceiver<BusMessage>,
    ) -> Self {
        Self {
            id,
            channel: channel.to_string(),
            receiver,
        }
    }

    /// Subscriber id, used for explicit unsubscribe.
    #[must_use]
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Channel this subscription listens on.
    #[must_use]
    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Wait for the next message. `None` once the channel was completed.
    pub async fn recv(&mut self) -> Option<BusMessage> {
        self.receiver.recv().await
    }

    /// Take a message if one is already queued.
    pub fn try_recv(&mut self) -> Option<BusMessage> {
        self.receiver.try_recv().ok()
    }

    /// Convert into a stream of messages for transport adapters.
    pub fn into_stream(self) -> impl Stream<Item = BusMessage> + Send + 'static {
        futures::stream::unfold(self.receiver, |mut rx| async move {
            rx.recv().await.map(|message| (message, rx))
        })
    }
}
