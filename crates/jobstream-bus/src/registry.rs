//! Channel registry: channel key -> current subscriber set.
//!
//! No business logic lives here. Readers take a snapshot of a channel's set
//! and iterate it outside the map lock, so removals that happen during a
//! publish never disturb the iteration.

use crate::subscriber::{Subscriber, SubscriberId};
use dashmap::DashMap;
use std::sync::Arc;

/// Registered subscriber entry
pub type SubscriberEntry = (SubscriberId, Arc<dyn Subscriber>);

/// Concurrent map of channels to subscriber sets.
#[derive(Default)]
pub struct ChannelRegistry {
    channels: DashMap<String, Vec<SubscriberEntry>>,
}

impl ChannelRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a subscriber, creating the channel on first use.
    pub fn insert(&self, channel: &str, id: SubscriberId, sink: Arc<dyn Subscriber>) {
        self.channels
            .entry(channel.to_string())
            .or_default()
            .push((id, sink));
    }

    /// Copy of the channel's current subscriber set.
    #[must_use]
    pub fn snapshot(&self, channel: &str) -> Vec<SubscriberEntry> {
        self.channels
            .get(channel)
            .map(|subs| subs.value().clone())
            .unwrap_or_default()
    }

    /// Remove one subscriber. Drops the channel if its set became empty.
    pub fn remove(&self, channel: &str, id: SubscriberId) -> Option<Arc<dyn Subscriber>> {
        let removed = self.channels.get_mut(channel).and_then(|mut subs| {
            let pos = subs.iter().position(|(sid, _)| *sid == id)?;
            Some(subs.remove(pos).1)
        });
        // Emptiness is re-checked under the shard lock so a concurrent insert wins.
        self.channels.remove_if(channel, |_, subs| subs.is_empty());
        removed
    }

    /// Detach the whole channel and return its subscribers.
    pub fn take(&self, channel: &str) -> Vec<SubscriberEntry> {
        self.channels
            .remove(channel)
            .map(|(_, subs)| subs)
            .unwrap_or_default()
    }

    /// Number of subscribers on a channel.
    #[must_use]
    pub fn len(&self, channel: &str) -> usize {
        self.channels.get(channel).map_or(0, |subs| subs.len())
    }

    /// Whether the channel currently exists.
    #[must_use]
    pub fn contains(&self, channel: &str) -> bool {
        self.channels.contains_key(channel)
    }

    /// Number of live channels.
    #[must_use]
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Keys of all live channels.
    #[must_use]
    pub fn channels(&self) -> Vec<String> {
        self.channels.iter().map(|e| e.key().clone()).collect()
    }
}

#[cfg(test)]
mod tests;
