//! Periodic connectivity polling between attempts
//!
//! Keeps observers current on whether the VPN is up even when no
//! authentication attempt is running. Polls are skipped while an attempt
//! holds the [`AttemptGate`].

use super::ConnectivityProbe;
use crate::session::AttemptGate;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Last known connectivity of the VPN client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Connectivity {
    /// No successful probe yet, or the last probe failed
    #[default]
    Unknown,
    Connected,
    Disconnected,
}

impl std::fmt::Display for Connectivity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Connectivity::Unknown => write!(f, "unknown"),
            Connectivity::Connected => write!(f, "connected"),
            Connectivity::Disconnected => write!(f, "disconnected"),
        }
    }
}

/// Background poller publishing [`Connectivity`] over a watch channel
pub struct StatusMonitor {
    probe: Arc<dyn ConnectivityProbe>,
    gate: AttemptGate,
    interval: Duration,
    state_tx: watch::Sender<Connectivity>,
}

impl StatusMonitor {
    pub fn new(probe: Arc<dyn ConnectivityProbe>, gate: AttemptGate, interval: Duration) -> Self {
        let (state_tx, _) = watch::channel(Connectivity::Unknown);
        Self {
            probe,
            gate,
            interval,
            state_tx,
        }
    }

    /// Get a receiver for connectivity updates
    pub fn subscribe(&self) -> watch::Receiver<Connectivity> {
        self.state_tx.subscribe()
    }

    /// Run one poll
    ///
    /// Returns `None` without touching the VPN client when an attempt is
    /// active.
    pub async fn poll_once(&self) -> Option<Connectivity> {
        let Some(_observer) = self.gate.try_observe() else {
            debug!("Skipping status poll - authentication attempt in progress");
            return None;
        };

        let connectivity = match self.probe.is_connected().await {
            Ok(true) => Connectivity::Connected,
            Ok(false) => Connectivity::Disconnected,
            Err(e) => {
                warn!("Status poll failed: {}", e);
                Connectivity::Unknown
            }
        };

        let previous = self.state_tx.send_replace(connectivity);
        if previous != connectivity {
            info!(from = %previous, to = %connectivity, "VPN connectivity changed");
        }
        Some(connectivity)
    }

    /// Poll on the configured interval until `shutdown` fires
    ///
    /// The first poll happens immediately. This should be spawned as a
    /// background tokio task.
    #[tracing::instrument(skip_all, fields(interval_secs = self.interval.as_secs()))]
    pub async fn run(self, shutdown: CancellationToken) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    debug!("Status monitor shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    self.poll_once().await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProbeError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct CountingProbe {
        calls: AtomicU32,
        connected: bool,
    }

    #[async_trait]
    impl ConnectivityProbe for CountingProbe {
        async fn is_connected(&self) -> Result<bool, ProbeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.connected)
        }
    }

    fn probe(connected: bool) -> Arc<CountingProbe> {
        Arc::new(CountingProbe {
            calls: AtomicU32::new(0),
            connected,
        })
    }

    #[tokio::test]
    async fn test_poll_once_publishes_state() {
        let probe = probe(true);
        let monitor = StatusMonitor::new(probe.clone(), AttemptGate::new(), Duration::from_secs(5));
        let rx = monitor.subscribe();
        assert_eq!(*rx.borrow(), Connectivity::Unknown);

        assert_eq!(monitor.poll_once().await, Some(Connectivity::Connected));
        assert_eq!(*rx.borrow(), Connectivity::Connected);
        assert_eq!(probe.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_poll_skipped_during_attempt() {
        let probe = probe(false);
        let gate = AttemptGate::new();
        let monitor = StatusMonitor::new(probe.clone(), gate.clone(), Duration::from_secs(5));

        let permit = gate.enter().await;
        assert_eq!(monitor.poll_once().await, None);
        assert_eq!(probe.calls.load(Ordering::SeqCst), 0);

        drop(permit);
        assert_eq!(monitor.poll_once().await, Some(Connectivity::Disconnected));
        assert_eq!(probe.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_polls_on_interval_and_pauses() {
        let probe = probe(true);
        let gate = AttemptGate::new();
        let monitor = StatusMonitor::new(probe.clone(), gate.clone(), Duration::from_secs(5));
        let shutdown = CancellationToken::new();
        let task = tokio::spawn(monitor.run(shutdown.clone()));

        // Immediate first tick, then one at 5s and 10s
        tokio::time::sleep(Duration::from_millis(10_500)).await;
        assert_eq!(probe.calls.load(Ordering::SeqCst), 3);

        // Ticks at 15s and 20s fall inside the attempt
        let permit = gate.enter().await;
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(probe.calls.load(Ordering::SeqCst), 3);

        drop(permit);
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(probe.calls.load(Ordering::SeqCst), 4);

        shutdown.cancel();
        task.await.unwrap();
    }
}
