//! Watch command implementation
//!
//! Stays in the foreground, reporting connectivity changes and logging in
//! again every `check_interval_secs`. The first login happens as soon as the
//! previous successful one is older than the interval.

use super::{progress_line, record_successful_check, Services};
use chrono::Utc;
use colored::Colorize;
use edgekey_core::config::state::CheckRecord;
use edgekey_core::config::toml_config::load_config;
use edgekey_core::error::EdgekeyError;
use edgekey_core::probe::{Connectivity, StatusMonitor};
use edgekey_core::prompt::TerminalPrompt;
use edgekey_core::session::SessionOrchestrator;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Run the watch command until Ctrl-C
pub async fn run_watch() -> Result<(), EdgekeyError> {
    let config = load_config()?;
    let services = Services::new(&config);
    let prompt = Arc::new(TerminalPrompt::new(config.two_factor.expectation()));
    let orchestrator = services.orchestrator(&config, prompt);
    let check_interval = config.monitor.check_interval();

    let shutdown = CancellationToken::new();
    let monitor = StatusMonitor::new(
        services.probe.clone(),
        orchestrator.gate(),
        config.monitor.status_interval(),
    );
    let mut connectivity = monitor.subscribe();
    let monitor_task = tokio::spawn(monitor.run(shutdown.clone()));
    let progress_task = tokio::spawn(report_progress(orchestrator.clone(), shutdown.clone()));

    let record = CheckRecord::load(&CheckRecord::default_path()?)?;
    let first_check = record.due_in(check_interval, Utc::now());
    let mut next_check = Instant::now() + first_check;
    info!(
        check_interval_secs = check_interval.as_secs(),
        first_check_in_secs = first_check.as_secs(),
        "Watching VPN client"
    );
    println!(
        "👀 Watching {} (Ctrl-C to stop)",
        config.target.process_name.bold()
    );

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, shutting down");
                orchestrator.cancel().await;
                break;
            }
            changed = connectivity.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = *connectivity.borrow_and_update();
                print_connectivity(state);
            }
            _ = tokio::time::sleep_until(next_check) => {
                if !run_check(&orchestrator).await {
                    break;
                }
                next_check = Instant::now() + check_interval;
            }
        }
    }

    shutdown.cancel();
    let _ = tokio::join!(monitor_task, progress_task);
    Ok(())
}

/// Log in once; failures wait for the next interval
///
/// Returns false if Ctrl-C interrupted the login.
async fn run_check(orchestrator: &SessionOrchestrator) -> bool {
    println!("🔐 Scheduled login starting");
    let handle = orchestrator.start().await;
    let outcome = tokio::select! {
        outcome = handle.clone().wait() => outcome,
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted during login, cancelling");
            orchestrator.cancel().await;
            let _ = handle.wait().await;
            return false;
        }
    };

    match outcome {
        Ok(()) => {
            if let Err(e) = record_successful_check() {
                warn!("Could not record successful check: {:#}", e);
            }
            println!("{} VPN connected", "✓".green());
        }
        Err(e) => {
            error!("Scheduled login failed: {}", e);
            eprintln!("{} {}", "✗".red(), e.user_message());
        }
    }
    true
}

async fn report_progress(orchestrator: SessionOrchestrator, shutdown: CancellationToken) {
    let mut feed = orchestrator.subscribe();
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            received = feed.recv() => match received {
                Ok(snapshot) => {
                    if let Some(line) = progress_line(&snapshot) {
                        eprintln!("{}", line.dimmed());
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Progress display fell behind");
                }
                Err(RecvError::Closed) => break,
            }
        }
    }
}

fn print_connectivity(state: Connectivity) {
    match state {
        Connectivity::Connected => println!("{} VPN is up", "●".green()),
        Connectivity::Disconnected => println!("{} VPN is down", "●".red()),
        Connectivity::Unknown => println!("{} VPN state unknown", "●".yellow()),
    }
}
