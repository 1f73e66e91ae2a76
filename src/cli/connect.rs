//! Connect command implementation
//!
//! Runs one full login against the VPN client, asking for the one-time code
//! on the terminal. Ctrl-C cancels the attempt.

use super::{progress_line, record_successful_check, Services};
use colored::Colorize;
use edgekey_core::config::toml_config::load_config;
use edgekey_core::error::EdgekeyError;
use edgekey_core::prompt::TerminalPrompt;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

/// Run the connect command
pub async fn run_connect() -> Result<(), EdgekeyError> {
    let config = load_config()?;
    let services = Services::new(&config);
    let prompt = Arc::new(TerminalPrompt::new(config.two_factor.expectation()));
    let orchestrator = services.orchestrator(&config, prompt);

    let mut feed = orchestrator.subscribe();
    let progress = tokio::spawn(async move {
        loop {
            match feed.recv().await {
                Ok(snapshot) => {
                    if let Some(line) = progress_line(&snapshot) {
                        eprintln!("{}", line.dimmed());
                    }
                }
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            }
        }
    });

    println!("🔐 Logging in to {}", config.target.process_name.bold());
    let handle = orchestrator.start().await;
    let outcome = tokio::select! {
        outcome = handle.clone().wait() => outcome,
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted, cancelling login");
            orchestrator.cancel().await;
            handle.wait().await
        }
    };
    progress.abort();

    match outcome {
        Ok(()) => {
            if let Err(e) = record_successful_check() {
                warn!("Could not record successful check: {:#}", e);
            }
            println!("{} VPN connected", "✓".green());
            Ok(())
        }
        Err(e) => {
            eprintln!("{} {}", "✗".red(), e.user_message());
            Err(e.into())
        }
    }
}
