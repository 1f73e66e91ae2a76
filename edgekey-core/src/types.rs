//! Type definitions and wrappers for secure data handling
//!
//! Everything a user types into the VPN client passes through these
//! wrappers, which use the secrecy crate so values never show up in logs or
//! debug output.

use crate::error::StoreError;
use secrecy::{ExposeSecret, Secret};

/// Username and secret for the VPN client login form
///
/// Both fields are guaranteed non-empty. The username is wrapped as well:
/// neither half of the pair is ever logged.
#[derive(Clone, Debug)]
pub struct Credentials {
    username: Secret<String>,
    secret: Secret<String>,
}

impl Credentials {
    /// Create a credential pair
    ///
    /// # Errors
    ///
    /// Returns `StoreError::InvalidCredentials` if either value is empty
    pub fn new(username: String, secret: String) -> Result<Self, StoreError> {
        if username.is_empty() || secret.is_empty() {
            return Err(StoreError::InvalidCredentials);
        }

        Ok(Self {
            username: Secret::new(username),
            secret: Secret::new(secret),
        })
    }

    /// Expose the username (use with caution!)
    pub fn username(&self) -> &str {
        self.username.expose_secret()
    }

    /// Expose the secret (use with caution!)
    ///
    /// This should only be called when typing into the VPN client or
    /// comparing against the store during verification.
    pub fn secret(&self) -> &str {
        self.secret.expose_secret()
    }
}

/// One-time code supplied by the operator for the second factor
///
/// Codes are opaque: any non-empty string is accepted since the length and
/// alphabet depend on the VPN provider.
#[derive(Clone, Debug)]
pub struct OneTimeCode(Secret<String>);

impl OneTimeCode {
    /// Wrap a code, trimming surrounding whitespace
    ///
    /// Returns `None` when nothing is left after trimming.
    pub fn new(code: &str) -> Option<Self> {
        let trimmed = code.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(Secret::new(trimmed.to_string())))
        }
    }

    /// Expose the code value (use with caution!)
    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }

    /// Number of characters in the code, for format hints
    pub fn len(&self) -> usize {
        self.expose().chars().count()
    }

    /// Always false: empty codes cannot be constructed
    pub fn is_empty(&self) -> bool {
        false
    }
}

/// Default keyring service under which credentials are stored
pub const KEYRING_SERVICE: &str = "edgekey-vpn";

/// Secure store key for the VPN username
pub const KEY_USERNAME: &str = "username";

/// Secure store key for the VPN secret
pub const KEY_SECRET: &str = "secret";
