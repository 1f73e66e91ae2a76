//! Persisted run state
//!
//! Records when the last scheduled check completed successfully, so a
//! scheduler can work out when the next one is due across restarts.

use crate::config::toml_config::get_config_dir;
use crate::error::{ConfigError, EdgekeyError};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

const STATE_FILE_NAME: &str = "state.toml";

/// Timestamp of the last successful authentication check
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckRecord {
    #[serde(default)]
    pub last_successful_check: Option<DateTime<Utc>>,
}

impl CheckRecord {
    /// Default state file path, next to the config file
    pub fn default_path() -> Result<PathBuf, EdgekeyError> {
        Ok(get_config_dir()?.join(STATE_FILE_NAME))
    }

    /// Load the record; a missing file yields an empty record
    pub fn load(path: &Path) -> Result<Self, EdgekeyError> {
        match std::fs::read_to_string(path) {
            Ok(contents) => Ok(toml::from_str(&contents)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(EdgekeyError::Config(ConfigError::IoError {
                message: format!("Failed to read state file: {}", e),
            })),
        }
    }

    /// Write the record, creating the directory if needed
    pub fn save(&self, path: &Path) -> Result<(), EdgekeyError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, toml::to_string_pretty(self)?).map_err(|_| {
            EdgekeyError::Config(ConfigError::SaveFailed {
                path: path.to_string_lossy().to_string(),
            })
        })
    }

    /// Mark a successful check at `at`
    pub fn record_success(&mut self, at: DateTime<Utc>) {
        self.last_successful_check = Some(at);
    }

    /// Time remaining until the next check is due at `now`
    ///
    /// Zero when no check has ever succeeded or the interval has passed.
    pub fn due_in(&self, interval: Duration, now: DateTime<Utc>) -> Duration {
        let Some(last) = self.last_successful_check else {
            return Duration::ZERO;
        };
        let interval = ChronoDuration::from_std(interval).unwrap_or(ChronoDuration::MAX);
        let next = last.checked_add_signed(interval).unwrap_or(DateTime::<Utc>::MAX_UTC);
        (next - now).to_std().unwrap_or(Duration::ZERO)
    }
}
