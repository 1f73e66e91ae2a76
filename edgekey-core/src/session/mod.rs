//! Authentication session state machine
//!
//! One attempt walks the VPN client through a fixed sequence of phases.
//! Observers follow progress through [`StatusSnapshot`]s published on every
//! transition.

pub mod context;
pub mod gate;
pub mod orchestrator;
pub mod publisher;

pub use context::AttemptContext;
pub use gate::{AttemptGate, AttemptPermit};
pub use orchestrator::{AttemptHandle, SessionOrchestrator};
pub use publisher::StatusPublisher;

use crate::error::AuthError;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

/// Current position of the orchestrator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Default)]
#[serde(tag = "state", content = "reason", rename_all = "snake_case")]
pub enum SessionState {
    #[default]
    Idle,
    Launching,
    #[serde(rename = "awaiting_ready_ui")]
    AwaitingReadyUI,
    EnteringCredentials,
    AwaitingTwoFactorCode,
    EnteringCode,
    AwaitingConnection,
    Connected,
    Failed(AuthError),
}

impl SessionState {
    /// True for `Connected` and `Failed`
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Connected | SessionState::Failed(_))
    }

    /// True while an attempt is running through its phases
    pub fn is_in_progress(&self) -> bool {
        self.phase().is_some()
    }

    /// Phase this state belongs to, if any
    pub fn phase(&self) -> Option<Phase> {
        match self {
            SessionState::Launching => Some(Phase::Launching),
            SessionState::AwaitingReadyUI => Some(Phase::AwaitingReadyUI),
            SessionState::EnteringCredentials => Some(Phase::EnteringCredentials),
            SessionState::AwaitingTwoFactorCode => Some(Phase::AwaitingTwoFactorCode),
            SessionState::EnteringCode => Some(Phase::EnteringCode),
            SessionState::AwaitingConnection => Some(Phase::AwaitingConnection),
            SessionState::Idle | SessionState::Connected | SessionState::Failed(_) => None,
        }
    }

    /// Whether `next` may directly follow this state
    ///
    /// Phases only move forward one step at a time. Any phase may fail,
    /// only the last may connect, and terminal states only return to idle.
    pub fn can_transition_to(&self, next: &SessionState) -> bool {
        match (self, next) {
            (SessionState::Idle, SessionState::Launching) => true,
            (current, SessionState::Idle) => current.is_terminal(),
            (SessionState::AwaitingConnection, SessionState::Connected) => true,
            (current, SessionState::Failed(_)) => current.is_in_progress(),
            (current, next) => match (current.phase(), next.phase()) {
                (Some(from), Some(to)) => from.next() == Some(to),
                _ => false,
            },
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Idle => write!(f, "idle"),
            SessionState::Connected => write!(f, "connected"),
            SessionState::Failed(reason) => write!(f, "failed: {}", reason),
            other => match other.phase() {
                Some(phase) => write!(f, "{}", phase),
                None => Ok(()),
            },
        }
    }
}

/// The in-progress steps of an attempt, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Phase {
    Launching,
    AwaitingReadyUI,
    EnteringCredentials,
    AwaitingTwoFactorCode,
    EnteringCode,
    AwaitingConnection,
}

impl Phase {
    pub const ALL: [Phase; 6] = [
        Phase::Launching,
        Phase::AwaitingReadyUI,
        Phase::EnteringCredentials,
        Phase::AwaitingTwoFactorCode,
        Phase::EnteringCode,
        Phase::AwaitingConnection,
    ];

    /// The phase that follows this one
    pub fn next(self) -> Option<Phase> {
        let index = Phase::ALL.iter().position(|p| *p == self)?;
        Phase::ALL.get(index + 1).copied()
    }

    /// State published while this phase runs
    pub fn state(self) -> SessionState {
        match self {
            Phase::Launching => SessionState::Launching,
            Phase::AwaitingReadyUI => SessionState::AwaitingReadyUI,
            Phase::EnteringCredentials => SessionState::EnteringCredentials,
            Phase::AwaitingTwoFactorCode => SessionState::AwaitingTwoFactorCode,
            Phase::EnteringCode => SessionState::EnteringCode,
            Phase::AwaitingConnection => SessionState::AwaitingConnection,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Launching => "launching",
            Phase::AwaitingReadyUI => "awaiting login form",
            Phase::EnteringCredentials => "entering credentials",
            Phase::AwaitingTwoFactorCode => "awaiting verification code",
            Phase::EnteringCode => "entering verification code",
            Phase::AwaitingConnection => "awaiting connection",
        };
        write!(f, "{}", name)
    }
}

/// Immutable record of one state transition
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusSnapshot {
    pub state: SessionState,
    pub timestamp: DateTime<Utc>,
    /// Attempt the transition belongs to; `None` for the initial idle state
    pub attempt_id: Option<u64>,
    /// Most recent failure, kept until the next attempt starts
    pub last_error: Option<AuthError>,
}

impl StatusSnapshot {
    pub fn new(state: SessionState, attempt_id: Option<u64>, last_error: Option<AuthError>) -> Self {
        Self {
            state,
            timestamp: Utc::now(),
            attempt_id,
            last_error,
        }
    }
}
