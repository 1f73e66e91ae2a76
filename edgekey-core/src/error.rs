//! Error types for edgekey
//!
//! Each collaborator has its own error enum. They all fold into [`AuthError`],
//! the outcome of one authentication attempt, and into [`EdgekeyError`], the
//! top-level error the CLI reports and maps to an exit code.
//!
//! No variant ever carries a username, secret or one-time code.

use serde::Serialize;
use thiserror::Error;

/// Main error type for the edgekey application
#[derive(Error, Debug)]
pub enum EdgekeyError {
    /// Errors related to configuration loading/parsing
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Errors related to the secure credential store
    #[error("Credential store error: {0}")]
    Store(#[from] StoreError),

    /// An authentication attempt ended in failure
    #[error("Authentication failed: {0}")]
    Auth(#[from] AuthError),

    /// Errors from a one-off connectivity check
    #[error("Status check failed: {0}")]
    Probe(#[from] ProbeError),

    /// Generic I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing errors
    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    /// TOML serialization errors
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration file: {path}")]
    LoadFailed { path: String },

    #[error("Failed to save configuration file: {path}")]
    SaveFailed { path: String },

    #[error("Configuration validation error: {message}")]
    ValidationError { message: String },

    #[error("I/O error: {message}")]
    IoError { message: String },
}

/// Secure store errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Username and secret must both be non-empty")]
    InvalidCredentials,

    #[error("Stored credentials did not read back identically")]
    VerificationFailed,

    #[error("Secure store unavailable: {reason}")]
    ServiceUnavailable { reason: String },

    #[error("Failed to read '{key}' from secure store")]
    ReadFailed { key: String },

    #[error("Failed to write '{key}' to secure store")]
    WriteFailed { key: String },

    #[error("Failed to delete '{key}' from secure store")]
    DeleteFailed { key: String },
}

/// Errors raised while driving the external application
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DriverError {
    #[error("Application '{app}' is not installed")]
    ApplicationNotFound { app: String },

    #[error("{control} did not appear after {attempts} checks")]
    ControlNotFound { control: String, attempts: u32 },

    #[error("Automation failed: {detail}")]
    Automation { detail: String },

    #[error("Operation cancelled")]
    Cancelled,
}

/// Errors raised by a connectivity probe
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProbeError {
    #[error("Connection state unavailable: {reason}")]
    Unavailable { reason: String },

    #[error(transparent)]
    Driver(#[from] DriverError),
}

/// Errors raised while waiting for a one-time code
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PromptError {
    #[error("Code entry cancelled")]
    Cancelled,

    #[error("No code entered within {seconds} seconds")]
    Timeout { seconds: u64 },

    #[error("Prompt failed: {message}")]
    Io { message: String },
}

/// Outcome of a failed authentication attempt
///
/// Cloneable so that every caller joined to a single-flight attempt receives
/// the same value, and serializable so status observers can record it.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AuthError {
    #[error("No stored credentials")]
    CredentialsNotFound,

    #[error("Username and secret must both be non-empty")]
    InvalidCredentials,

    #[error("Application '{app}' is not installed")]
    ApplicationNotFound { app: String },

    #[error("Automation permission not granted after {attempts} checks")]
    PermissionDenied { attempts: u32 },

    #[error("Login fields did not appear after {attempts} checks")]
    LoginFieldsNotFound { attempts: u32 },

    #[error("{control} not found")]
    ControlNotFound { control: String },

    #[error("No one-time code entered within {seconds} seconds")]
    PromptTimeout { seconds: u64 },

    #[error("One-time code entry cancelled")]
    PromptCancelled,

    #[error("VPN did not report connected within {seconds} seconds")]
    ConnectionTimeout { seconds: u64 },

    #[error("Automation error: {detail}")]
    AutomationError { detail: String },

    #[error("Stored credentials did not read back identically")]
    VerificationFailed,

    #[error("Secure store error: {detail}")]
    Store { detail: String },

    #[error("Attempt cancelled")]
    Cancelled,
}

impl AuthError {
    /// Single human-readable line for status surfaces
    pub fn user_message(&self) -> String {
        match self {
            AuthError::CredentialsNotFound => {
                "No VPN credentials saved. Run setup first.".to_string()
            }
            AuthError::InvalidCredentials => {
                "Saved VPN credentials are incomplete. Run setup again.".to_string()
            }
            AuthError::ApplicationNotFound { app } => {
                format!("The VPN client ({}) is not installed.", app)
            }
            AuthError::PermissionDenied { .. } => {
                "Automation permission is missing. Allow it under Privacy & Security > Accessibility."
                    .to_string()
            }
            AuthError::LoginFieldsNotFound { .. } => {
                "The VPN client never showed its login form.".to_string()
            }
            AuthError::ControlNotFound { control } => {
                format!("Could not find {} in the VPN client.", control)
            }
            AuthError::PromptTimeout { .. } => "No verification code was entered in time.".to_string(),
            AuthError::PromptCancelled => "Verification code entry was cancelled.".to_string(),
            AuthError::ConnectionTimeout { .. } => {
                "The VPN client did not confirm the connection in time.".to_string()
            }
            AuthError::AutomationError { .. } => {
                "Typing into the VPN client failed.".to_string()
            }
            AuthError::VerificationFailed => {
                "The secure store returned different credentials than were saved.".to_string()
            }
            AuthError::Store { .. } => "The secure store could not be read.".to_string(),
            AuthError::Cancelled => "Login cancelled.".to_string(),
        }
    }
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::InvalidCredentials => AuthError::InvalidCredentials,
            StoreError::VerificationFailed => AuthError::VerificationFailed,
            other => AuthError::Store {
                detail: other.to_string(),
            },
        }
    }
}

impl From<DriverError> for AuthError {
    fn from(err: DriverError) -> Self {
        match err {
            DriverError::ApplicationNotFound { app } => AuthError::ApplicationNotFound { app },
            DriverError::ControlNotFound { control, .. } => AuthError::ControlNotFound { control },
            DriverError::Automation { detail } => AuthError::AutomationError { detail },
            DriverError::Cancelled => AuthError::Cancelled,
        }
    }
}

impl From<PromptError> for AuthError {
    fn from(err: PromptError) -> Self {
        match err {
            PromptError::Cancelled => AuthError::PromptCancelled,
            PromptError::Timeout { seconds } => AuthError::PromptTimeout { seconds },
            PromptError::Io { message } => AuthError::AutomationError {
                detail: format!("two-factor prompt failed: {}", message),
            },
        }
    }
}
