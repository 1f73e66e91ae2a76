//! edgekey - hands-free login for GUI-only VPN clients
//!
//! Types stored credentials into the VPN client's login window, asks for the
//! one-time code, and waits until the client reports the tunnel is up.

use edgekey_core::{
    error::{AuthError, EdgekeyError},
    init_logging,
};
use clap::{Parser, Subcommand};

mod cli;

#[derive(Parser)]
#[command(name = "edgekey")]
#[command(about = "Automatic login for GUI-only VPN clients with secure credential storage")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Configure the VPN client and store credentials securely
    Setup,
    /// Log in to the VPN once
    Connect,
    /// Show connection state and when the next login is due
    Status {
        /// Print machine-readable JSON
        #[arg(long)]
        json: bool,
    },
    /// Stay in the foreground and log in again periodically
    Watch,
    /// Remove stored credentials
    Forget,
}

#[tokio::main]
async fn main() {
    // Initialize logging
    if let Err(e) = init_logging() {
        eprintln!("Failed to initialize logging: {}", e);
        std::process::exit(2);
    }

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Setup => cli::setup::run_setup().await,
        Commands::Connect => cli::connect::run_connect().await,
        Commands::Status { json } => cli::status::run_status(json).await,
        Commands::Watch => cli::watch::run_watch().await,
        Commands::Forget => cli::forget::run_forget(),
    };

    match result {
        Ok(()) => std::process::exit(0),
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(exit_code(&e));
        }
    }
}

/// Map an error to the process exit code
///
/// 2 means the setup needs attention, 130 means the operator cancelled and
/// 1 covers everything that went wrong at runtime.
fn exit_code(error: &EdgekeyError) -> i32 {
    match error {
        // Configuration errors (exit code 2)
        EdgekeyError::Config(_) | EdgekeyError::Toml(_) | EdgekeyError::TomlSerialize(_) => 2,
        // Secure store errors (exit code 2 for setup issues)
        EdgekeyError::Store(_) => 2,
        EdgekeyError::Auth(auth_error) => match auth_error {
            AuthError::CredentialsNotFound
            | AuthError::InvalidCredentials
            | AuthError::VerificationFailed
            | AuthError::Store { .. }
            | AuthError::ApplicationNotFound { .. }
            | AuthError::PermissionDenied { .. } => 2,
            AuthError::Cancelled | AuthError::PromptCancelled => 130,
            AuthError::LoginFieldsNotFound { .. }
            | AuthError::ControlNotFound { .. }
            | AuthError::PromptTimeout { .. }
            | AuthError::ConnectionTimeout { .. }
            | AuthError::AutomationError { .. } => 1,
        },
        // Runtime errors (exit code 1)
        EdgekeyError::Probe(_) | EdgekeyError::Io(_) => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use edgekey_core::error::{ConfigError, StoreError};

    #[test]
    fn test_setup_problems_exit_with_2() {
        assert_eq!(exit_code(&AuthError::CredentialsNotFound.into()), 2);
        assert_eq!(exit_code(&AuthError::PermissionDenied { attempts: 3 }.into()), 2);
        assert_eq!(exit_code(&StoreError::VerificationFailed.into()), 2);
        assert_eq!(
            exit_code(
                &ConfigError::ValidationError {
                    message: "bad".to_string()
                }
                .into()
            ),
            2
        );
    }

    #[test]
    fn test_cancellation_exits_with_130() {
        assert_eq!(exit_code(&AuthError::Cancelled.into()), 130);
        assert_eq!(exit_code(&AuthError::PromptCancelled.into()), 130);
    }

    #[test]
    fn test_runtime_failures_exit_with_1() {
        assert_eq!(exit_code(&AuthError::ConnectionTimeout { seconds: 60 }.into()), 1);
        assert_eq!(
            exit_code(&AuthError::LoginFieldsNotFound { attempts: 20 }.into()),
            1
        );
    }

    #[test]
    fn test_cli_parses_status_json() {
        let cli = Cli::try_parse_from(["edgekey", "status", "--json"]).unwrap();
        assert!(matches!(cli.command, Commands::Status { json: true }));
    }
}
