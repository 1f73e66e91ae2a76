//! Prompt that reads the code from the controlling terminal

use super::{within, CodeExpectation, TwoFactorPrompt};
use crate::error::PromptError;
use crate::types::OneTimeCode;
use async_trait::async_trait;
use std::io::{self, BufRead, BufReader, Write};
use std::thread;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, warn};

/// Reads one line per request; EOF or a blank line cancels
///
/// A single reader thread owns the input for the prompt's lifetime, so a
/// request that times out leaves nothing behind to swallow the next answer.
pub struct TerminalPrompt {
    expectation: CodeExpectation,
    lines: Mutex<mpsc::Receiver<io::Result<String>>>,
}

impl TerminalPrompt {
    /// Prompt on stderr, reading answers from stdin
    pub fn new(expectation: CodeExpectation) -> Self {
        Self::from_reader(expectation, BufReader::new(io::stdin()))
    }

    /// Prompt reading answers from `reader`
    pub fn from_reader<R>(expectation: CodeExpectation, reader: R) -> Self
    where
        R: BufRead + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(8);
        let spawned = thread::Builder::new()
            .name("edgekey-prompt".to_string())
            .spawn(move || forward_lines(reader, tx));
        if let Err(e) = spawned {
            // The sender went down with the closure, so requests cancel
            warn!("Could not start terminal reader: {}", e);
        }

        Self {
            expectation,
            lines: Mutex::new(rx),
        }
    }

    fn prompt_text(&self) -> String {
        match self.expectation.digits {
            Some(digits) => format!("Enter the {}-digit verification code: ", digits),
            None => "Enter the verification code: ".to_string(),
        }
    }
}

fn forward_lines<R: BufRead>(mut reader: R, lines: mpsc::Sender<io::Result<String>>) {
    loop {
        let mut line = String::new();
        let read = match reader.read_line(&mut line) {
            Ok(0) => return,
            Ok(_) => Ok(line),
            Err(e) => Err(e),
        };
        let failed = read.is_err();
        if lines.blocking_send(read).is_err() || failed {
            return;
        }
    }
}

#[async_trait]
impl TwoFactorPrompt for TerminalPrompt {
    async fn request_code(&self, timeout: Duration) -> Result<OneTimeCode, PromptError> {
        let mut lines = self.lines.lock().await;

        // Input typed while nobody was asking is not an answer to this prompt
        while lines.try_recv().is_ok() {
            debug!("Discarding input typed before the prompt");
        }

        let mut stderr = io::stderr();
        write!(stderr, "{}", self.prompt_text())
            .and_then(|()| stderr.flush())
            .map_err(|e| PromptError::Io {
                message: e.to_string(),
            })?;

        within(timeout, async {
            let line = match lines.recv().await {
                Some(line) => line.map_err(|e| PromptError::Io {
                    message: e.to_string(),
                })?,
                None => return Err(PromptError::Cancelled),
            };

            let code = OneTimeCode::new(&line).ok_or(PromptError::Cancelled)?;
            self.expectation.check(&code);
            Ok(code)
        })
        .await
    }
}
