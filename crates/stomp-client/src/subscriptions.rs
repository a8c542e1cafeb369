//! Channel → subscription id table.

use std::collections::HashMap;

/// An active subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Subscription {
    pub id: u64,
    /// Set once the broker's RECEIPT for the SUBSCRIBE arrives.
    pub confirmed: bool,
}

/// Subscriptions keyed by channel name. Ids come from a counter that is
/// never reset, so an id is never reused within a session.
#[derive(Debug, Default)]
pub struct SubscriptionTable {
    next_id: u64,
    channels: HashMap<String, Subscription>,
}

impl SubscriptionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a provisional entry for `channel` and return its new id.
    pub fn subscribe(&mut self, channel: &str) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.channels.insert(
            channel.to_string(),
            Subscription {
                id,
                confirmed: false,
            },
        );
        id
    }

    /// Mark the subscription confirmed. Returns false when the channel is no
    /// longer subscribed under `id` (it was exited before the receipt came).
    pub fn confirm(&mut self, channel: &str, id: u64) -> bool {
        match self.channels.get_mut(channel) {
            Some(sub) if sub.id == id => {
                sub.confirmed = true;
                true
            }
            _ => false,
        }
    }

    pub fn unsubscribe(&mut self, channel: &str) -> Option<Subscription> {
        self.channels.remove(channel)
    }

    pub fn get(&self, channel: &str) -> Option<Subscription> {
        self.channels.get(channel).copied()
    }

    pub fn contains(&self, channel: &str) -> bool {
        self.channels.contains_key(channel)
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    pub fn clear(&mut self) {
        self.channels.clear();
    }
}
