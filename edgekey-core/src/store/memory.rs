//! In-memory secret backend
//!
//! Keeps values in a process-local map. Used by tests and by dry runs where
//! no system keyring is reachable.

use super::SecretBackend;
use crate::error::StoreError;
use std::collections::HashMap;
use std::sync::Mutex;

/// Secret backend held entirely in memory
#[derive(Debug, Default)]
pub struct MemoryBackend {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryBackend {
    /// Create an empty backend
    pub fn new() -> Self {
        Self::default()
    }
}

impl SecretBackend for MemoryBackend {
    fn read(&self, key: &str) -> Result<Option<String>, StoreError> {
        let entries = self.entries.lock().map_err(|_| StoreError::ReadFailed {
            key: key.to_string(),
        })?;
        Ok(entries.get(key).cloned())
    }

    fn write(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().map_err(|_| StoreError::WriteFailed {
            key: key.to_string(),
        })?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().map_err(|_| StoreError::DeleteFailed {
            key: key.to_string(),
        })?;
        entries.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store_and_retrieve() {
        let backend = MemoryBackend::new();
        assert_eq!(backend.read("username").unwrap(), None);

        backend.write("username", "alice").unwrap();
        assert_eq!(backend.read("username").unwrap().as_deref(), Some("alice"));

        backend.delete("username").unwrap();
        assert_eq!(backend.read("username").unwrap(), None);

        // Deleting again is not an error
        backend.delete("username").unwrap();
    }
}
