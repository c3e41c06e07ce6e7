//! Change notification for store subscribers.
//!
//! Each subscriber owns the receiving half of a channel. The store broadcasts
//! a complete snapshot after every applied change while it still holds its
//! lock, so every subscriber sees snapshots whole and in mutation order.

use crate::Snapshot;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::time::Duration;

/// Handle used to unsubscribe
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Receiving side of a store subscription
///
/// The queue is unbounded and every queued snapshot keeps its library alive.
/// Consumers must drain it regularly, usually with [`Subscription::latest`],
/// or drop the subscription when they stop listening.
#[derive(Debug)]
pub struct Subscription {
    id: SubscriptionId,
    receiver: Receiver<Snapshot>,
}

impl Subscription {
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Next snapshot if one is pending, without blocking
    pub fn try_next(&self) -> Option<Snapshot> {
        match self.receiver.try_recv() {
            Ok(snapshot) => Some(snapshot),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    /// Wait up to `timeout` for the next snapshot
    pub fn next_timeout(&self, timeout: Duration) -> Option<Snapshot> {
        match self.receiver.recv_timeout(timeout) {
            Ok(snapshot) => Some(snapshot),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Drain pending snapshots and return the newest one
    ///
    /// Consumers that only render current state should use this rather than
    /// caching an older snapshot.
    pub fn latest(&self) -> Option<Snapshot> {
        let mut latest = None;
        while let Some(snapshot) = self.try_next() {
            latest = Some(snapshot);
        }
        latest
    }
}

/// Registry of live subscribers
#[derive(Debug, Default)]
pub(crate) struct Subscribers {
    next_id: u64,
    senders: Vec<(SubscriptionId, Sender<Snapshot>)>,
}

impl Subscribers {
    /// Register a subscriber and hand it `current` straight away
    pub(crate) fn add(&mut self, current: Snapshot) -> Subscription {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;

        let (sender, receiver) = mpsc::channel();
        // The receiver is alive here, so this cannot fail
        let _ = sender.send(current);
        self.senders.push((id, sender));

        tracing::debug!("Registered subscriber {:?}", id);
        Subscription { id, receiver }
    }

    pub(crate) fn remove(&mut self, id: SubscriptionId) -> bool {
        let before = self.senders.len();
        self.senders.retain(|(sid, _)| *sid != id);
        before != self.senders.len()
    }

    /// Send `snapshot` to everyone, dropping subscribers whose receiver is gone
    pub(crate) fn broadcast(&mut self, snapshot: &Snapshot) {
        self.senders.retain(|(id, sender)| {
            let alive = sender.send(snapshot.clone()).is_ok();
            if !alive {
                tracing::debug!("Pruned disconnected subscriber {:?}", id);
            }
            alive
        });
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.senders.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Library, Selection};
    use std::sync::Arc;

    fn snapshot(revision: u64) -> Snapshot {
        Snapshot {
            library: Arc::new(Library::default()),
            selection: Selection::default(),
            revision,
            durable: true,
        }
    }

    #[test]
    fn test_subscriber_receives_current_then_broadcasts_in_order() {
        let mut subscribers = Subscribers::default();
        let sub = subscribers.add(snapshot(0));

        subscribers.broadcast(&snapshot(1));
        subscribers.broadcast(&snapshot(2));

        assert_eq!(sub.try_next().map(|s| s.revision), Some(0));
        assert_eq!(sub.try_next().map(|s| s.revision), Some(1));
        assert_eq!(sub.try_next().map(|s| s.revision), Some(2));
        assert!(sub.try_next().is_none());
    }

    #[test]
    fn test_latest_drains_backlog() {
        let mut subscribers = Subscribers::default();
        let sub = subscribers.add(snapshot(0));
        subscribers.broadcast(&snapshot(1));
        subscribers.broadcast(&snapshot(2));

        assert_eq!(sub.latest().map(|s| s.revision), Some(2));
        assert!(sub.latest().is_none());
    }

    #[test]
    fn test_unsubscribe_and_prune() {
        let mut subscribers = Subscribers::default();
        let kept = subscribers.add(snapshot(0));
        let removed = subscribers.add(snapshot(0));
        let dropped = subscribers.add(snapshot(0));
        assert_ne!(kept.id(), removed.id());

        assert!(subscribers.remove(removed.id()));
        assert!(!subscribers.remove(removed.id()));
        drop(dropped);

        subscribers.broadcast(&snapshot(1));
        assert_eq!(subscribers.len(), 1);
        assert_eq!(kept.latest().map(|s| s.revision), Some(1));
        assert_eq!(removed.latest().map(|s| s.revision), Some(0));
    }
}
