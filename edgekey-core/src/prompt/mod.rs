//! Two-factor code prompts
//!
//! The orchestrator asks a [`TwoFactorPrompt`] for the one-time code once
//! the VPN client has accepted the username and secret. Where the code comes
//! from (a terminal, a status-bar popover) is the prompt's business.

pub mod channel;
pub mod terminal;

pub use channel::{ChannelPrompt, CodeRequest};
pub use terminal::TerminalPrompt;

use crate::error::PromptError;
use crate::types::OneTimeCode;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Source of one-time codes
#[async_trait]
pub trait TwoFactorPrompt: Send + Sync {
    /// Ask the operator for a code
    ///
    /// Resolves with the code, `PromptError::Cancelled` if the operator
    /// declines, or `PromptError::Timeout` once `timeout` elapses.
    async fn request_code(&self, timeout: Duration) -> Result<OneTimeCode, PromptError>;
}

/// What a code is expected to look like
///
/// This is a presentation hint only: codes that do not match are accepted
/// with a warning, since providers differ in length and alphabet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeExpectation {
    /// Expected number of characters, if known
    pub digits: Option<usize>,
}

impl CodeExpectation {
    pub fn new(digits: Option<usize>) -> Self {
        Self { digits }
    }

    /// Log a warning if `code` does not have the expected length
    pub fn check(&self, code: &OneTimeCode) {
        if let Some(digits) = self.digits {
            if code.len() != digits {
                warn!(
                    expected = digits,
                    actual = code.len(),
                    "One-time code length differs from the configured expectation"
                );
            }
        }
    }
}

impl Default for CodeExpectation {
    fn default() -> Self {
        Self { digits: Some(6) }
    }
}

/// Apply a prompt timeout to a pending answer
pub(crate) async fn within<F>(timeout: Duration, answer: F) -> Result<OneTimeCode, PromptError>
where
    F: Future<Output = Result<OneTimeCode, PromptError>>,
{
    tokio::time::timeout(timeout, answer)
        .await
        .map_err(|_| PromptError::Timeout {
            seconds: timeout.as_secs(),
        })?
}
