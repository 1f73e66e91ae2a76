//! External application driver
//!
//! The VPN client is a black box: the only way to learn anything about it is
//! to ask whether a control exists, and the only way to act on it is to
//! synthesize input. [`ExternalAppDriver`] captures that capability set so the
//! orchestrator stays platform-agnostic.
//!
//! Input operations (`set_text`, `invoke`, `press_key`, `type_text`) are
//! neither idempotent nor interruptible. Callers must issue each at most once
//! per phase.

pub mod osascript;

pub use osascript::OsaScriptDriver;

use crate::error::DriverError;
use async_trait::async_trait;
use std::fmt;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Kind of UI element to look for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlRole {
    TextField,
    Button,
}

impl ControlRole {
    /// Element class name as used by accessibility scripting
    pub fn as_str(&self) -> &'static str {
        match self {
            ControlRole::TextField => "text field",
            ControlRole::Button => "button",
        }
    }
}

/// How a control is identified within its role
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ControlMatch {
    /// 1-based position among controls of the same role
    Index(u32),
    /// Exact title
    Title(String),
}

/// Description of a control to look for in the front window
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ControlPredicate {
    pub role: ControlRole,
    pub matcher: ControlMatch,
}

impl ControlPredicate {
    pub fn text_field(index: u32) -> Self {
        Self {
            role: ControlRole::TextField,
            matcher: ControlMatch::Index(index),
        }
    }

    pub fn button(title: &str) -> Self {
        Self {
            role: ControlRole::Button,
            matcher: ControlMatch::Title(title.to_string()),
        }
    }
}

impl fmt::Display for ControlPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.matcher {
            ControlMatch::Index(index) => write!(f, "{} {}", self.role.as_str(), index),
            ControlMatch::Title(title) => write!(f, "{} \"{}\"", self.role.as_str(), title),
        }
    }
}

/// A control the driver has seen on screen
///
/// Handles are only ever produced by a driver and only mean "this predicate
/// matched at the time of the check".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlHandle {
    predicate: ControlPredicate,
}

impl ControlHandle {
    pub fn new(predicate: ControlPredicate) -> Self {
        Self { predicate }
    }

    pub fn predicate(&self) -> &ControlPredicate {
        &self.predicate
    }
}

/// Keys the orchestrator may synthesize
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Return,
}

/// Interval and attempt budget for a bounded poll
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl PollPolicy {
    pub fn new(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            max_attempts,
        }
    }

    /// Upper bound on the time spent waiting between checks
    pub fn budget(&self) -> Duration {
        self.interval * self.max_attempts
    }
}

/// Capability to control a GUI application this process does not own
#[async_trait]
pub trait ExternalAppDriver: Send + Sync {
    /// Bring the application to the foreground, launching it if needed
    async fn launch_or_activate(&self, app_id: &str) -> Result<(), DriverError>;

    /// Single check for a control matching `predicate`
    async fn find_control(
        &self,
        predicate: &ControlPredicate,
    ) -> Result<Option<ControlHandle>, DriverError>;

    /// Replace the contents of a text control
    async fn set_text(&self, control: &ControlHandle, value: &str) -> Result<(), DriverError>;

    /// Press a button or otherwise activate a control
    async fn invoke(&self, control: &ControlHandle) -> Result<(), DriverError>;

    /// Send a single key press to the frontmost window
    async fn press_key(&self, key: Key) -> Result<(), DriverError>;

    /// Type `value` into whatever control has focus in the frontmost window
    async fn type_text(&self, value: &str) -> Result<(), DriverError>;

    /// Check (and, if `prompt`, ask the host for) permission to automate
    async fn request_automation_permission(&self, prompt: bool) -> Result<bool, DriverError>;

    /// Wait for a control to appear
    ///
    /// Checks every `policy.interval` and returns as soon as the control is
    /// found. Fails with `ControlNotFound` after `policy.max_attempts` misses,
    /// or with `Cancelled` as soon as `cancel` fires. Transient automation
    /// errors count as a miss.
    async fn poll_for_control(
        &self,
        predicate: &ControlPredicate,
        policy: PollPolicy,
        cancel: &CancellationToken,
    ) -> Result<ControlHandle, DriverError> {
        for attempt in 1..=policy.max_attempts {
            if cancel.is_cancelled() {
                return Err(DriverError::Cancelled);
            }

            match self.find_control(predicate).await {
                Ok(Some(handle)) => {
                    debug!(control = %predicate, attempt, "Control found");
                    return Ok(handle);
                }
                Ok(None) => {
                    debug!(
                        control = %predicate,
                        "Waiting for control (attempt {}/{})",
                        attempt,
                        policy.max_attempts
                    );
                }
                Err(DriverError::Automation { detail }) => {
                    warn!(control = %predicate, attempt, "Control check failed: {}", detail);
                }
                Err(e) => return Err(e),
            }

            if attempt < policy.max_attempts {
                tokio::select! {
                    _ = cancel.cancelled() => return Err(DriverError::Cancelled),
                    _ = tokio::time::sleep(policy.interval) => {}
                }
            }
        }

        Err(DriverError::ControlNotFound {
            control: predicate.to_string(),
            attempts: policy.max_attempts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Driver whose control shows up on a given check
    struct AppearsOn {
        appears_on: u32,
        checks: AtomicU32,
    }

    #[async_trait]
    impl ExternalAppDriver for AppearsOn {
        async fn launch_or_activate(&self, _app_id: &str) -> Result<(), DriverError> {
            Ok(())
        }

        async fn find_control(
            &self,
            predicate: &ControlPredicate,
        ) -> Result<Option<ControlHandle>, DriverError> {
            let check = self.checks.fetch_add(1, Ordering::SeqCst) + 1;
            if check == 1 {
                return Err(DriverError::Automation {
                    detail: "window not ready".to_string(),
                });
            }
            Ok((check >= self.appears_on).then(|| ControlHandle::new(predicate.clone())))
        }

        async fn set_text(&self, _control: &ControlHandle, _value: &str) -> Result<(), DriverError> {
            Ok(())
        }

        async fn invoke(&self, _control: &ControlHandle) -> Result<(), DriverError> {
            Ok(())
        }

        async fn press_key(&self, _key: Key) -> Result<(), DriverError> {
            Ok(())
        }

        async fn type_text(&self, _value: &str) -> Result<(), DriverError> {
            Ok(())
        }

        async fn request_automation_permission(&self, _prompt: bool) -> Result<bool, DriverError> {
            Ok(true)
        }
    }

    #[test]
    fn test_predicate_display() {
        assert_eq!(ControlPredicate::text_field(2).to_string(), "text field 2");
        assert_eq!(ControlPredicate::button("Logon").to_string(), "button \"Logon\"");
    }

    #[test]
    fn test_poll_policy_budget() {
        let policy = PollPolicy::new(Duration::from_secs(5), 20);
        assert_eq!(policy.budget(), Duration::from_secs(100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_returns_as_soon_as_found() {
        let driver = AppearsOn {
            appears_on: 3,
            checks: AtomicU32::new(0),
        };
        let start = tokio::time::Instant::now();
        let handle = driver
            .poll_for_control(
                &ControlPredicate::text_field(1),
                PollPolicy::new(Duration::from_secs(5), 20),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(handle.predicate(), &ControlPredicate::text_field(1));
        assert_eq!(driver.checks.load(Ordering::SeqCst), 3);
        assert_eq!(start.elapsed(), Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_exhaustion_reports_attempts() {
        let driver = AppearsOn {
            appears_on: u32::MAX,
            checks: AtomicU32::new(0),
        };
        let err = driver
            .poll_for_control(
                &ControlPredicate::button("Logon"),
                PollPolicy::new(Duration::from_secs(1), 4),
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();

        assert_eq!(
            err,
            DriverError::ControlNotFound {
                control: "button \"Logon\"".to_string(),
                attempts: 4
            }
        );
        assert_eq!(driver.checks.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_stops_on_cancel() {
        let driver = AppearsOn {
            appears_on: u32::MAX,
            checks: AtomicU32::new(0),
        };
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(7)).await;
            trigger.cancel();
        });

        let start = tokio::time::Instant::now();
        let err = driver
            .poll_for_control(
                &ControlPredicate::text_field(1),
                PollPolicy::new(Duration::from_secs(5), 20),
                &cancel,
            )
            .await
            .unwrap_err();

        assert_eq!(err, DriverError::Cancelled);
        assert_eq!(start.elapsed(), Duration::from_secs(7));
    }
}
