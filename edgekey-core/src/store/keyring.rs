//! Keyring operations for secure credential storage
//!
//! Uses the system keyring (macOS Keychain, Windows Credential Manager,
//! Secret Service on Linux) to store and retrieve VPN credentials.

use super::SecretBackend;
use crate::error::StoreError;
use keyring::Entry;
use tracing::debug;

/// Secret backend over the host keyring
///
/// Each key becomes its own keyring entry: `service` / `key`.
#[derive(Debug, Clone)]
pub struct KeyringBackend {
    service: String,
}

impl KeyringBackend {
    /// Create a backend storing entries under the given service name
    pub fn new(service: &str) -> Self {
        Self {
            service: service.to_string(),
        }
    }

    fn entry(&self, key: &str) -> Result<Entry, StoreError> {
        Entry::new(&self.service, key).map_err(|e| StoreError::ServiceUnavailable {
            reason: e.to_string(),
        })
    }
}

impl SecretBackend for KeyringBackend {
    fn read(&self, key: &str) -> Result<Option<String>, StoreError> {
        match self.entry(key)?.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => {
                debug!(service = %self.service, key, "Keyring entry not found");
                Ok(None)
            }
            Err(keyring::Error::NoStorageAccess(e)) => Err(StoreError::ServiceUnavailable {
                reason: e.to_string(),
            }),
            Err(_) => Err(StoreError::ReadFailed {
                key: key.to_string(),
            }),
        }
    }

    fn write(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.entry(key)?
            .set_password(value)
            .map_err(|_| StoreError::WriteFailed {
                key: key.to_string(),
            })
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        match self.entry(key)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(_) => Err(StoreError::DeleteFailed {
                key: key.to_string(),
            }),
        }
    }
}
