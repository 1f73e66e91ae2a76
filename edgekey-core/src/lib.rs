//! Core library for edgekey
//!
//! Automates the login sequence of a GUI-only VPN client: credentials come
//! from the host's secure store, the client is driven through its UI, the
//! operator supplies the one-time code, and progress is published as a
//! stream of status snapshots.

pub mod error;
pub mod types;

pub mod config;
pub mod driver;
pub mod probe;
pub mod prompt;
pub mod session;
pub mod store;

/// Initialize logging infrastructure
///
/// Uses the systemd journal when running under systemd, stderr otherwise.
/// The level comes from `RUST_LOG` and defaults to `info`.
pub fn init_logging() -> Result<(), Box<dyn std::error::Error>> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = || EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    #[cfg(target_os = "linux")]
    {
        if std::env::var("JOURNAL_STREAM").is_ok() {
            let journal_layer = tracing_journald::layer()?;
            tracing_subscriber::registry()
                .with(journal_layer)
                .with(filter())
                .try_init()?;
            return Ok(());
        }
    }

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .with(filter())
        .try_init()?;

    Ok(())
}
