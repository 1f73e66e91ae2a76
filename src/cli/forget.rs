//! Forget command implementation

use edgekey_core::config::toml_config::load_config;
use edgekey_core::error::EdgekeyError;
use edgekey_core::store::CredentialStore;

/// Remove the saved username and secret from the secure store
pub fn run_forget() -> Result<(), EdgekeyError> {
    let config = load_config()?;
    let store = CredentialStore::keyring(&config.store.service);

    if !store.exists()? {
        println!("No saved credentials.");
        return Ok(());
    }

    store.erase()?;
    println!("✅ Credentials removed from the secure store.");
    Ok(())
}
