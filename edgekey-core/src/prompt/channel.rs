//! Prompt that delegates to an external UI over a channel
//!
//! Each request is handed to the receiving side (a status-bar popover, a
//! test) together with a one-shot responder. Dropping the request or
//! answering `None` counts as cancellation.

use super::{within, CodeExpectation, TwoFactorPrompt};
use crate::error::PromptError;
use crate::types::OneTimeCode;
use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

/// A pending request for a one-time code
#[derive(Debug)]
pub struct CodeRequest {
    /// Format hint to show the operator
    pub expectation: CodeExpectation,
    /// How long the orchestrator will wait for an answer
    pub timeout: Duration,
    responder: oneshot::Sender<Option<String>>,
}

impl CodeRequest {
    /// Answer with a code; returns false if the orchestrator stopped waiting
    pub fn respond(self, code: impl Into<String>) -> bool {
        self.responder.send(Some(code.into())).is_ok()
    }

    /// Decline to supply a code
    pub fn cancel(self) {
        let _ = self.responder.send(None);
    }

    /// True once the orchestrator has given up on this request
    pub fn is_abandoned(&self) -> bool {
        self.responder.is_closed()
    }
}

/// Prompt backed by an mpsc channel of [`CodeRequest`]s
#[derive(Debug, Clone)]
pub struct ChannelPrompt {
    requests: mpsc::Sender<CodeRequest>,
    expectation: CodeExpectation,
}

impl ChannelPrompt {
    /// Create the prompt and the receiver the UI side listens on
    pub fn new(expectation: CodeExpectation) -> (Self, mpsc::Receiver<CodeRequest>) {
        let (requests, rx) = mpsc::channel(4);
        (
            Self {
                requests,
                expectation,
            },
            rx,
        )
    }
}

#[async_trait]
impl TwoFactorPrompt for ChannelPrompt {
    async fn request_code(&self, timeout: Duration) -> Result<OneTimeCode, PromptError> {
        let (responder, answer) = oneshot::channel();
        let request = CodeRequest {
            expectation: self.expectation,
            timeout,
            responder,
        };

        within(timeout, async {
            self.requests
                .send(request)
                .await
                .map_err(|_| PromptError::Cancelled)?;
            debug!("Code request delivered to UI");

            match answer.await {
                Ok(Some(code)) => {
                    let code = OneTimeCode::new(&code).ok_or(PromptError::Cancelled)?;
                    self.expectation.check(&code);
                    Ok(code)
                }
                Ok(None) | Err(_) => Err(PromptError::Cancelled),
            }
        })
        .await
    }
}
