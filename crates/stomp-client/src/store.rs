//! Per-user, per-channel event history.

use std::collections::HashMap;

use stomp_core::event::Event;

/// Events keyed by reporting user, then channel, in insertion order.
///
/// No sorting or deduplication happens here; callers sort snapshots.
#[derive(Debug, Default)]
pub struct EventStore {
    users: HashMap<String, HashMap<String, Vec<Event>>>,
}

impl EventStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, user: &str, channel: &str, event: Event) {
        self.users
            .entry(user.to_string())
            .or_default()
            .entry(channel.to_string())
            .or_default()
            .push(event);
    }

    /// Copy of the events for `(user, channel)`, in append order.
    pub fn snapshot(&self, user: &str, channel: &str) -> Vec<Event> {
        self.users
            .get(user)
            .and_then(|channels| channels.get(channel))
            .cloned()
            .unwrap_or_default()
    }

    /// Remove every channel recorded for `user`. Returns the number of
    /// events dropped.
    pub fn evict(&mut self, user: &str) -> usize {
        self.users
            .remove(user)
            .map(|channels| channels.values().map(Vec::len).sum())
            .unwrap_or(0)
    }
}
