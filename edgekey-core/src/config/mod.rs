//! Configuration module
//!
//! Everything here is non-sensitive: which VPN client to drive, how its login
//! form is laid out, and how long to wait for it. Credentials live in the
//! secure store only.

use crate::driver::{ControlPredicate, PollPolicy};
use crate::prompt::CodeExpectation;
use crate::types::KEYRING_SERVICE;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub mod state;
pub mod toml_config;

/// Complete configuration file contents
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub target: TargetConfig,

    #[serde(default)]
    pub timing: TimingPolicy,

    #[serde(default)]
    pub two_factor: TwoFactorConfig,

    #[serde(default)]
    pub monitor: MonitorConfig,

    #[serde(default)]
    pub store: StoreConfig,
}

impl AppConfig {
    /// Validate every section, reporting the first problem found
    pub fn validate(&self) -> Result<(), PolicyValidationError> {
        self.target.validate()?;
        self.timing.validate()?;
        self.two_factor.validate()?;
        self.monitor.validate()?;
        self.store.validate()?;
        Ok(())
    }
}

/// The VPN client to drive and the layout of its windows
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetConfig {
    /// Bundle identifier used to launch/activate the client
    #[serde(default = "default_bundle_id")]
    pub bundle_id: String,

    /// Process name as seen by the accessibility layer
    #[serde(default = "default_process_name")]
    pub process_name: String,

    /// Index of the username text field in the login window
    #[serde(default = "default_username_field")]
    pub username_field: u32,

    /// Index of the secret text field in the login window
    #[serde(default = "default_secret_field")]
    pub secret_field: u32,

    /// Title of the login submit button; Return is pressed when absent
    #[serde(default = "default_submit_button")]
    pub submit_button: String,

    /// Index of the one-time code text field
    #[serde(default = "default_code_field")]
    pub code_field: u32,

    /// Title of the code submit button, if the code window has one
    #[serde(default)]
    pub code_submit_button: Option<String>,

    /// Title of the control only shown while connected
    #[serde(default = "default_disconnect_button")]
    pub disconnect_button: String,
}

fn default_bundle_id() -> String {
    "com.f5networks.EdgeClient".to_string()
}
fn default_process_name() -> String {
    "BIG-IP Edge Client".to_string()
}
fn default_username_field() -> u32 {
    1
}
fn default_secret_field() -> u32 {
    2
}
fn default_submit_button() -> String {
    "Logon".to_string()
}
fn default_code_field() -> u32 {
    1
}
fn default_disconnect_button() -> String {
    "Disconnect".to_string()
}

impl TargetConfig {
    pub fn username_predicate(&self) -> ControlPredicate {
        ControlPredicate::text_field(self.username_field)
    }

    pub fn secret_predicate(&self) -> ControlPredicate {
        ControlPredicate::text_field(self.secret_field)
    }

    pub fn submit_predicate(&self) -> ControlPredicate {
        ControlPredicate::button(&self.submit_button)
    }

    pub fn code_predicate(&self) -> ControlPredicate {
        ControlPredicate::text_field(self.code_field)
    }

    pub fn code_submit_predicate(&self) -> Option<ControlPredicate> {
        self.code_submit_button
            .as_deref()
            .map(ControlPredicate::button)
    }

    pub fn connected_indicator(&self) -> ControlPredicate {
        ControlPredicate::button(&self.disconnect_button)
    }

    fn validate(&self) -> Result<(), PolicyValidationError> {
        if self.bundle_id.trim().is_empty() {
            return Err(PolicyValidationError::EmptyField("target.bundle_id"));
        }
        if self.process_name.trim().is_empty() {
            return Err(PolicyValidationError::EmptyField("target.process_name"));
        }
        if self.disconnect_button.trim().is_empty() {
            return Err(PolicyValidationError::EmptyField("target.disconnect_button"));
        }
        for (field, index) in [
            ("target.username_field", self.username_field),
            ("target.secret_field", self.secret_field),
            ("target.code_field", self.code_field),
        ] {
            if index == 0 {
                return Err(PolicyValidationError::ZeroIndex(field));
            }
        }
        if self.username_field == self.secret_field {
            return Err(PolicyValidationError::SameField(self.username_field));
        }
        Ok(())
    }
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            bundle_id: default_bundle_id(),
            process_name: default_process_name(),
            username_field: default_username_field(),
            secret_field: default_secret_field(),
            submit_button: default_submit_button(),
            code_field: default_code_field(),
            code_submit_button: None,
            disconnect_button: default_disconnect_button(),
        }
    }
}

/// Retry budgets and delays for each phase of an attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimingPolicy {
    /// Automation permission checks before giving up
    #[serde(default = "default_permission_attempts")]
    pub permission_attempts: u32,

    /// Seconds between permission checks
    #[serde(default = "default_poll_interval")]
    pub permission_interval_secs: u64,

    /// Checks for the login fields before giving up
    #[serde(default = "default_login_poll_attempts")]
    pub login_poll_attempts: u32,

    /// Seconds between login field checks
    #[serde(default = "default_poll_interval")]
    pub login_poll_interval_secs: u64,

    /// Seconds to let the client bring up its code prompt
    #[serde(default = "default_two_factor_settle")]
    pub two_factor_settle_secs: u64,

    /// Seconds the operator has to enter the code
    #[serde(default = "default_two_factor_timeout")]
    pub two_factor_timeout_secs: u64,

    /// Checks for the code field before giving up
    #[serde(default = "default_code_field_poll_attempts")]
    pub code_field_poll_attempts: u32,

    /// Seconds between code field checks
    #[serde(default = "default_code_field_poll_interval")]
    pub code_field_poll_interval_secs: u64,

    /// Connectivity checks after submitting the code
    #[serde(default = "default_connection_poll_attempts")]
    pub connection_poll_attempts: u32,

    /// Seconds between connectivity checks
    #[serde(default = "default_poll_interval")]
    pub connection_poll_interval_secs: u64,
}

fn default_permission_attempts() -> u32 {
    3
}
fn default_poll_interval() -> u64 {
    5
}
fn default_login_poll_attempts() -> u32 {
    20
}
fn default_two_factor_settle() -> u64 {
    5
}
fn default_two_factor_timeout() -> u64 {
    120
}
fn default_code_field_poll_attempts() -> u32 {
    10
}
fn default_code_field_poll_interval() -> u64 {
    1
}
fn default_connection_poll_attempts() -> u32 {
    12
}

impl TimingPolicy {
    pub fn permission_poll(&self) -> PollPolicy {
        PollPolicy::new(
            Duration::from_secs(self.permission_interval_secs),
            self.permission_attempts,
        )
    }

    pub fn login_poll(&self) -> PollPolicy {
        PollPolicy::new(
            Duration::from_secs(self.login_poll_interval_secs),
            self.login_poll_attempts,
        )
    }

    pub fn code_field_poll(&self) -> PollPolicy {
        PollPolicy::new(
            Duration::from_secs(self.code_field_poll_interval_secs),
            self.code_field_poll_attempts,
        )
    }

    pub fn connection_poll(&self) -> PollPolicy {
        PollPolicy::new(
            Duration::from_secs(self.connection_poll_interval_secs),
            self.connection_poll_attempts,
        )
    }

    pub fn two_factor_settle(&self) -> Duration {
        Duration::from_secs(self.two_factor_settle_secs)
    }

    pub fn two_factor_timeout(&self) -> Duration {
        Duration::from_secs(self.two_factor_timeout_secs)
    }

    /// Validate attempt counts (1-100), intervals (1-300s), settle (0-120s)
    /// and the code timeout (10-900s)
    pub fn validate(&self) -> Result<(), PolicyValidationError> {
        for (field, attempts) in [
            ("timing.permission_attempts", self.permission_attempts),
            ("timing.login_poll_attempts", self.login_poll_attempts),
            ("timing.code_field_poll_attempts", self.code_field_poll_attempts),
            ("timing.connection_poll_attempts", self.connection_poll_attempts),
        ] {
            if !(1..=100).contains(&attempts) {
                return Err(PolicyValidationError::InvalidAttempts(field, attempts));
            }
        }

        for (field, secs) in [
            ("timing.permission_interval_secs", self.permission_interval_secs),
            ("timing.login_poll_interval_secs", self.login_poll_interval_secs),
            ("timing.code_field_poll_interval_secs", self.code_field_poll_interval_secs),
            ("timing.connection_poll_interval_secs", self.connection_poll_interval_secs),
        ] {
            if !(1..=300).contains(&secs) {
                return Err(PolicyValidationError::InvalidInterval(field, secs));
            }
        }

        if self.two_factor_settle_secs > 120 {
            return Err(PolicyValidationError::InvalidSettle(self.two_factor_settle_secs));
        }

        if !(10..=900).contains(&self.two_factor_timeout_secs) {
            return Err(PolicyValidationError::InvalidCodeTimeout(
                self.two_factor_timeout_secs,
            ));
        }

        Ok(())
    }
}

impl Default for TimingPolicy {
    fn default() -> Self {
        Self {
            permission_attempts: default_permission_attempts(),
            permission_interval_secs: default_poll_interval(),
            login_poll_attempts: default_login_poll_attempts(),
            login_poll_interval_secs: default_poll_interval(),
            two_factor_settle_secs: default_two_factor_settle(),
            two_factor_timeout_secs: default_two_factor_timeout(),
            code_field_poll_attempts: default_code_field_poll_attempts(),
            code_field_poll_interval_secs: default_code_field_poll_interval(),
            connection_poll_attempts: default_connection_poll_attempts(),
            connection_poll_interval_secs: default_poll_interval(),
        }
    }
}

/// One-time code expectations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TwoFactorConfig {
    /// Expected code length; a hint, never enforced. 0 means unknown.
    #[serde(default = "default_expected_digits")]
    pub expected_digits: usize,
}

fn default_expected_digits() -> usize {
    6
}

impl TwoFactorConfig {
    pub fn expectation(&self) -> CodeExpectation {
        CodeExpectation::new((self.expected_digits > 0).then_some(self.expected_digits))
    }

    fn validate(&self) -> Result<(), PolicyValidationError> {
        if self.expected_digits > 32 {
            return Err(PolicyValidationError::InvalidExpectedDigits(
                self.expected_digits,
            ));
        }
        Ok(())
    }
}

impl Default for TwoFactorConfig {
    fn default() -> Self {
        Self {
            expected_digits: default_expected_digits(),
        }
    }
}

/// Background status polling and scheduled re-authentication
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Seconds between status polls while idle
    #[serde(default = "default_poll_interval")]
    pub status_interval_secs: u64,

    /// Seconds between scheduled re-authentications in watch mode
    #[serde(default = "default_check_interval")]
    pub check_interval_secs: u64,
}

fn default_check_interval() -> u64 {
    1800
}

impl MonitorConfig {
    pub fn status_interval(&self) -> Duration {
        Duration::from_secs(self.status_interval_secs)
    }

    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_secs)
    }

    fn validate(&self) -> Result<(), PolicyValidationError> {
        if !(1..=3600).contains(&self.status_interval_secs) {
            return Err(PolicyValidationError::InvalidStatusInterval(
                self.status_interval_secs,
            ));
        }
        if !(60..=86_400).contains(&self.check_interval_secs) {
            return Err(PolicyValidationError::InvalidCheckInterval(
                self.check_interval_secs,
            ));
        }
        Ok(())
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            status_interval_secs: default_poll_interval(),
            check_interval_secs: default_check_interval(),
        }
    }
}

/// Secure store settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Keyring service name entries are stored under
    #[serde(default = "default_service")]
    pub service: String,
}

fn default_service() -> String {
    KEYRING_SERVICE.to_string()
}

impl StoreConfig {
    fn validate(&self) -> Result<(), PolicyValidationError> {
        if self.service.trim().is_empty() {
            return Err(PolicyValidationError::EmptyField("store.service"));
        }
        Ok(())
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            service: default_service(),
        }
    }
}

/// Validation errors for configuration values
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PolicyValidationError {
    #[error("{0} must not be empty")]
    EmptyField(&'static str),

    #[error("{0} must be 1 or greater")]
    ZeroIndex(&'static str),

    #[error("username_field and secret_field must differ, both are {0}")]
    SameField(u32),

    #[error("{0} must be between 1 and 100, got: {1}")]
    InvalidAttempts(&'static str, u32),

    #[error("{0} must be between 1 and 300, got: {1}")]
    InvalidInterval(&'static str, u64),

    #[error("timing.two_factor_settle_secs must be at most 120, got: {0}")]
    InvalidSettle(u64),

    #[error("timing.two_factor_timeout_secs must be between 10 and 900, got: {0}")]
    InvalidCodeTimeout(u64),

    #[error("two_factor.expected_digits must be at most 32, got: {0}")]
    InvalidExpectedDigits(usize),

    #[error("monitor.status_interval_secs must be between 1 and 3600, got: {0}")]
    InvalidStatusInterval(u64),

    #[error("monitor.check_interval_secs must be between 60 and 86400, got: {0}")]
    InvalidCheckInterval(u64),
}
