//! Per-attempt bookkeeping

use super::Phase;
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;

/// State scoped to a single authentication attempt
///
/// Created when the attempt starts and dropped when it resolves.
#[derive(Debug)]
pub struct AttemptContext {
    attempt_id: u64,
    started_at: Instant,
    current: Option<Phase>,
    retries: HashMap<Phase, u32>,
    deadlines: HashMap<Phase, Instant>,
}

impl AttemptContext {
    pub fn new(attempt_id: u64) -> Self {
        Self {
            attempt_id,
            started_at: Instant::now(),
            current: None,
            retries: HashMap::new(),
            deadlines: HashMap::new(),
        }
    }

    pub fn attempt_id(&self) -> u64 {
        self.attempt_id
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    pub fn current_phase(&self) -> Option<Phase> {
        self.current
    }

    /// Enter `phase`, which is expected to finish within `budget`
    pub fn begin_phase(&mut self, phase: Phase, budget: Duration) {
        self.current = Some(phase);
        self.deadlines.insert(phase, Instant::now() + budget);
    }

    /// Count one retry against the current phase
    pub fn record_retry(&mut self) {
        if let Some(phase) = self.current {
            *self.retries.entry(phase).or_insert(0) += 1;
        }
    }

    pub fn retries(&self, phase: Phase) -> u32 {
        self.retries.get(&phase).copied().unwrap_or(0)
    }

    pub fn deadline(&self, phase: Phase) -> Option<Instant> {
        self.deadlines.get(&phase).copied()
    }

    /// Whether the current phase has run past its budget
    pub fn overran(&self) -> bool {
        self.current
            .and_then(|phase| self.deadline(phase))
            .is_some_and(|deadline| Instant::now() > deadline)
    }

    pub fn total_retries(&self) -> u32 {
        self.retries.values().sum()
    }
}
