//! Receipt correlation for requests that expect broker confirmation.

use std::collections::HashMap;

use stomp_core::error::{StompError, StompResult};

/// What a pending receipt confirms.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReceiptKind {
    Subscribe { channel: String, id: u64 },
    Unsubscribe { channel: String, id: u64 },
    Disconnect,
}

/// Issues monotonically increasing receipt ids and resolves confirmations.
#[derive(Debug, Default)]
pub struct ReceiptTracker {
    next: u64,
    pending: HashMap<u64, ReceiptKind>,
}

impl ReceiptTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the next receipt id. Ids are never reused.
    fn next(&mut self) -> u64 {
        let id = self.next;
        self.next += 1;
        id
    }

    fn record(&mut self, id: u64, kind: ReceiptKind) {
        self.pending.insert(id, kind);
    }

    /// Allocate an id and record it in one step.
    pub fn issue(&mut self, kind: ReceiptKind) -> u64 {
        let id = self.next();
        self.record(id, kind);
        id
    }

    /// Resolve a confirmation from the server.
    ///
    /// An id at or beyond the counter was never issued here (server
    /// violation); an issued id that is not pending was already confirmed or
    /// dropped locally.
    pub fn resolve(&mut self, id: u64) -> StompResult<ReceiptKind> {
        match self.pending.remove(&id) {
            Some(kind) => Ok(kind),
            None if id >= self.next => Err(StompError::UnknownReceipt(id)),
            None => Err(StompError::StaleReceipt(id)),
        }
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Drop every pending receipt. The counter keeps its value.
    pub fn clear(&mut self) {
        self.pending.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_strictly_increasing() {
        let mut tracker = ReceiptTracker::new();
        let ids: Vec<u64> = (0..5).map(|_| tracker.next()).collect();
        assert_eq!(ids, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn resolve_returns_recorded_kind_once() {
        let mut tracker = ReceiptTracker::new();
        let id = tracker.issue(ReceiptKind::Disconnect);
        assert_eq!(tracker.pending_count(), 1);
        assert_eq!(tracker.resolve(id).unwrap(), ReceiptKind::Disconnect);
        assert!(matches!(tracker.resolve(id), Err(StompError::StaleReceipt(0))));
    }

    #[test]
    fn never_issued_id_is_a_server_violation() {
        let mut tracker = ReceiptTracker::new();
        tracker.issue(ReceiptKind::Disconnect);
        assert!(matches!(tracker.resolve(7), Err(StompError::UnknownReceipt(7))));
    }

    #[test]
    fn clear_keeps_counter() {
        let mut tracker = ReceiptTracker::new();
        tracker.issue(ReceiptKind::Subscribe { channel: "a".into(), id: 0 });
        tracker.issue(ReceiptKind::Unsubscribe { channel: "a".into(), id: 0 });
        assert_eq!(tracker.pending_count(), 2);
        tracker.clear();
        assert_eq!(tracker.pending_count(), 0);
        assert_eq!(tracker.next(), 2);
    }
}
