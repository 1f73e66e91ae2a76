//! Status feed for observers

use super::{SessionState, StatusSnapshot};
use crate::error::AuthError;
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tracing::trace;

const FEED_CAPACITY: usize = 64;

/// Fans state transitions out to any number of observers
///
/// Every snapshot goes to a broadcast channel, where slow receivers lag
/// rather than block the sender. The latest one is also held in a watch
/// channel for observers that only care about the current state.
#[derive(Debug, Clone)]
pub struct StatusPublisher {
    feed: broadcast::Sender<StatusSnapshot>,
    latest: Arc<watch::Sender<StatusSnapshot>>,
}

impl StatusPublisher {
    pub fn new() -> Self {
        let (feed, _) = broadcast::channel(FEED_CAPACITY);
        let (latest, _) = watch::channel(StatusSnapshot::new(SessionState::Idle, None, None));
        Self {
            feed,
            latest: Arc::new(latest),
        }
    }

    /// Record a transition and notify observers
    pub fn publish(
        &self,
        state: SessionState,
        attempt_id: Option<u64>,
        last_error: Option<AuthError>,
    ) -> StatusSnapshot {
        let snapshot = StatusSnapshot::new(state, attempt_id, last_error);
        self.latest.send_replace(snapshot.clone());
        // No receivers is fine
        let receivers = self.feed.send(snapshot.clone()).unwrap_or(0);
        trace!(receivers, state = %snapshot.state, "Snapshot published");
        snapshot
    }

    /// Stream of every snapshot published from now on
    pub fn subscribe(&self) -> broadcast::Receiver<StatusSnapshot> {
        self.feed.subscribe()
    }

    pub fn latest(&self) -> StatusSnapshot {
        self.latest.borrow().clone()
    }

    /// Receiver that always holds the latest snapshot
    pub fn watch(&self) -> watch::Receiver<StatusSnapshot> {
        self.latest.subscribe()
    }
}

impl Default for StatusPublisher {
    fn default() -> Self {
        Self::new()
    }
}
