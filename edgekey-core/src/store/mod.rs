//! Credential storage
//!
//! [`CredentialStore`] keeps the VPN username and secret in an opaque secure
//! store behind the [`SecretBackend`] trait. It holds no automation logic: the
//! orchestrator only ever reads from it.

pub mod keyring;
pub mod memory;

pub use self::keyring::KeyringBackend;
pub use self::memory::MemoryBackend;

use crate::error::StoreError;
use crate::types::{Credentials, KEY_SECRET, KEY_USERNAME};
use std::sync::Arc;
use tracing::{debug, error, info};

/// Key/value access to a host secure store
pub trait SecretBackend: Send + Sync {
    /// Read a value, `Ok(None)` if the key has never been written
    fn read(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Write or overwrite a value
    fn write(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Remove a value; removing a missing key succeeds
    fn delete(&self, key: &str) -> Result<(), StoreError>;
}

/// Username + secret persistence with read-back verification
#[derive(Clone)]
pub struct CredentialStore {
    backend: Arc<dyn SecretBackend>,
}

impl CredentialStore {
    /// Create a store over the given backend
    pub fn new(backend: Arc<dyn SecretBackend>) -> Self {
        Self { backend }
    }

    /// Store backed by the system keyring under `service`
    pub fn keyring(service: &str) -> Self {
        Self::new(Arc::new(KeyringBackend::new(service)))
    }

    /// Save a credential pair and verify it reads back byte-for-byte
    ///
    /// # Errors
    ///
    /// - `InvalidCredentials` if either value is empty; nothing is written
    /// - `VerificationFailed` if the store returns something else afterwards
    pub fn save(&self, username: &str, secret: &str) -> Result<(), StoreError> {
        let credentials = Credentials::new(username.to_string(), secret.to_string())?;

        self.backend.write(KEY_USERNAME, credentials.username())?;
        self.backend.write(KEY_SECRET, credentials.secret())?;

        let verified = match self.load()? {
            Some(stored) => {
                stored.username().as_bytes() == credentials.username().as_bytes()
                    && stored.secret().as_bytes() == credentials.secret().as_bytes()
            }
            None => false,
        };

        if !verified {
            error!("Credential verification failed immediately after saving");
            return Err(StoreError::VerificationFailed);
        }

        info!("VPN credentials saved and verified");
        Ok(())
    }

    /// Load the stored credential pair
    ///
    /// Returns `None` when either field is unset or empty.
    pub fn load(&self) -> Result<Option<Credentials>, StoreError> {
        let username = self.backend.read(KEY_USERNAME)?;
        let secret = self.backend.read(KEY_SECRET)?;

        match (username, secret) {
            (Some(username), Some(secret)) => match Credentials::new(username, secret) {
                Ok(credentials) => Ok(Some(credentials)),
                Err(_) => {
                    debug!("Stored credentials present but empty");
                    Ok(None)
                }
            },
            _ => {
                debug!("Stored credentials not found");
                Ok(None)
            }
        }
    }

    /// Check whether a complete credential pair is stored
    pub fn exists(&self) -> Result<bool, StoreError> {
        Ok(self.load()?.is_some())
    }

    /// Remove both stored values
    pub fn erase(&self) -> Result<(), StoreError> {
        self.backend.delete(KEY_USERNAME)?;
        self.backend.delete(KEY_SECRET)?;
        info!("VPN credentials erased");
        Ok(())
    }
}

impl std::fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialStore").finish_non_exhaustive()
    }
}
