//! Status command implementation

use super::Services;
use chrono::{DateTime, Local, Utc};
use colored::Colorize;
use edgekey_core::config::state::CheckRecord;
use edgekey_core::config::toml_config::load_config;
use edgekey_core::error::EdgekeyError;
use edgekey_core::probe::Connectivity;
use serde::Serialize;
use tracing::warn;

#[derive(Debug, Serialize)]
struct StatusReport {
    application: String,
    credentials_saved: bool,
    connectivity: Connectivity,
    last_successful_check: Option<DateTime<Utc>>,
    next_check_in_secs: u64,
}

/// Run the status command
pub async fn run_status(json: bool) -> Result<(), EdgekeyError> {
    let config = load_config()?;
    let services = Services::new(&config);

    let credentials_saved = services.store.exists()?;
    let connectivity = match services.probe.is_connected().await {
        Ok(true) => Connectivity::Connected,
        Ok(false) => Connectivity::Disconnected,
        Err(e) => {
            warn!("Status check failed: {}", e);
            Connectivity::Unknown
        }
    };
    let record = CheckRecord::load(&CheckRecord::default_path()?)?;
    let next_check = record.due_in(config.monitor.check_interval(), Utc::now());

    let report = StatusReport {
        application: config.target.process_name.clone(),
        credentials_saved,
        connectivity,
        last_successful_check: record.last_successful_check,
        next_check_in_secs: next_check.as_secs(),
    };

    if json {
        let rendered = serde_json::to_string_pretty(&report).map_err(|e| {
            EdgekeyError::Io(std::io::Error::new(std::io::ErrorKind::Other, e))
        })?;
        println!("{}", rendered);
    } else {
        print_report(&report);
    }
    Ok(())
}

fn print_report(report: &StatusReport) {
    let connectivity = match report.connectivity {
        Connectivity::Connected => "connected".green(),
        Connectivity::Disconnected => "disconnected".red(),
        Connectivity::Unknown => "unknown".yellow(),
    };
    println!("VPN client:   {}", report.application.bold());
    println!("Connection:   {}", connectivity);
    println!(
        "Credentials:  {}",
        if report.credentials_saved {
            "saved".green()
        } else {
            "not saved (run `edgekey setup`)".yellow()
        }
    );

    match report.last_successful_check {
        Some(at) => println!(
            "Last login:   {}",
            at.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S")
        ),
        None => println!("Last login:   never"),
    }
    println!("Next check:   {}", format_remaining(report.next_check_in_secs));
}

fn format_remaining(seconds: u64) -> String {
    if seconds == 0 {
        return "due now".to_string();
    }
    let minutes = seconds / 60;
    match (minutes / 60, minutes % 60) {
        (0, 0) => format!("in {}s", seconds),
        (0, m) => format!("in {}m", m),
        (h, m) => format!("in {}h {:02}m", h, m),
    }
}
