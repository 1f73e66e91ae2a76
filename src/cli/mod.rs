//! CLI command implementations
//!
//! This module contains the implementation of all CLI subcommands plus the
//! wiring they share.

pub mod connect;
pub mod forget;
pub mod setup;
pub mod status;
pub mod watch;

use anyhow::Context;
use chrono::Utc;
use edgekey_core::config::state::CheckRecord;
use edgekey_core::config::AppConfig;
use edgekey_core::driver::{ExternalAppDriver, OsaScriptDriver};
use edgekey_core::probe::{ConnectivityProbe, ControlProbe};
use edgekey_core::prompt::TwoFactorPrompt;
use edgekey_core::session::{SessionOrchestrator, SessionState, StatusSnapshot};
use edgekey_core::store::CredentialStore;
use std::sync::Arc;

/// Collaborators built from the configuration
pub struct Services {
    pub store: CredentialStore,
    pub driver: Arc<dyn ExternalAppDriver>,
    pub probe: Arc<dyn ConnectivityProbe>,
}

impl Services {
    pub fn new(config: &AppConfig) -> Self {
        let driver: Arc<dyn ExternalAppDriver> =
            Arc::new(OsaScriptDriver::new(&config.target.process_name));
        let probe = Arc::new(ControlProbe::new(
            driver.clone(),
            config.target.connected_indicator(),
        ));
        Self {
            store: CredentialStore::keyring(&config.store.service),
            driver,
            probe,
        }
    }

    pub fn orchestrator(
        &self,
        config: &AppConfig,
        prompt: Arc<dyn TwoFactorPrompt>,
    ) -> SessionOrchestrator {
        SessionOrchestrator::new(
            self.store.clone(),
            self.driver.clone(),
            self.probe.clone(),
            prompt,
            config.target.clone(),
            config.timing.clone(),
        )
    }
}

/// Persist the time of a successful login
pub fn record_successful_check() -> anyhow::Result<()> {
    let path = CheckRecord::default_path().context("Cannot locate state file")?;
    let mut record = CheckRecord::load(&path)
        .with_context(|| format!("Cannot read {}", path.display()))?;
    record.record_success(Utc::now());
    record
        .save(&path)
        .with_context(|| format!("Cannot write {}", path.display()))?;
    Ok(())
}

/// One progress line for a state transition, if it deserves one
pub fn progress_line(snapshot: &StatusSnapshot) -> Option<String> {
    match &snapshot.state {
        SessionState::Idle | SessionState::Failed(_) | SessionState::Connected => None,
        state => Some(format!("… {}", state)),
    }
}
