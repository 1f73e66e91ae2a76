//! Single-attempt lock
//!
//! An attempt holds the write side of the gate for its whole lifetime.
//! Background readers of the VPN client (the status monitor) take the read
//! side for the duration of one probe and skip their turn when an attempt
//! holds the gate, so they never interleave with in-flight UI input.

use std::sync::Arc;
use tokio::sync::{watch, OwnedRwLockReadGuard, OwnedRwLockWriteGuard, RwLock};

/// Shared lock plus an observable "attempt active" flag
#[derive(Debug, Clone)]
pub struct AttemptGate {
    lock: Arc<RwLock<()>>,
    active: Arc<watch::Sender<bool>>,
}

impl AttemptGate {
    pub fn new() -> Self {
        let (active, _) = watch::channel(false);
        Self {
            lock: Arc::new(RwLock::new(())),
            active: Arc::new(active),
        }
    }

    /// Take the gate for an attempt
    ///
    /// Waits for an in-flight probe to finish, never for another attempt:
    /// the orchestrator guarantees only one attempt asks at a time.
    pub async fn enter(&self) -> AttemptPermit {
        let guard = self.lock.clone().write_owned().await;
        self.active.send_replace(true);
        AttemptPermit {
            active: self.active.clone(),
            _guard: guard,
        }
    }

    /// Read access for a background observer, `None` while an attempt runs
    pub fn try_observe(&self) -> Option<OwnedRwLockReadGuard<()>> {
        self.lock.clone().try_read_owned().ok()
    }

    pub fn is_active(&self) -> bool {
        *self.active.borrow()
    }

    /// Receiver that tracks the active flag
    pub fn watch(&self) -> watch::Receiver<bool> {
        self.active.subscribe()
    }
}

impl Default for AttemptGate {
    fn default() -> Self {
        Self::new()
    }
}

/// Held by a running attempt; releases the gate on drop
#[derive(Debug)]
pub struct AttemptPermit {
    active: Arc<watch::Sender<bool>>,
    _guard: OwnedRwLockWriteGuard<()>,
}

impl Drop for AttemptPermit {
    fn drop(&mut self) {
        self.active.send_replace(false);
    }
}
