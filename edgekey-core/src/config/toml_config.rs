//! TOML configuration file I/O
//!
//! Handles loading and saving the configuration to/from a TOML file in the
//! user's configuration directory.

use crate::config::AppConfig;
use crate::error::{ConfigError, EdgekeyError};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Default configuration file name
const CONFIG_FILE_NAME: &str = "config.toml";

/// Get the default configuration directory
///
/// Returns ~/.config/edgekey, or EDGEKEY_CONFIG_DIR if set
pub fn get_config_dir() -> Result<PathBuf, EdgekeyError> {
    // Allow tests to override config directory via environment variable
    if let Ok(config_dir) = std::env::var("EDGEKEY_CONFIG_DIR") {
        return Ok(PathBuf::from(config_dir));
    }

    let home = std::env::var("HOME").map_err(|_| {
        EdgekeyError::Config(ConfigError::IoError {
            message: "HOME environment variable not set".to_string(),
        })
    })?;

    Ok(PathBuf::from(home).join(".config").join("edgekey"))
}

/// Get the default configuration file path
pub fn get_config_path() -> Result<PathBuf, EdgekeyError> {
    Ok(get_config_dir()?.join(CONFIG_FILE_NAME))
}

/// Check if a configuration file exists
pub fn config_exists() -> Result<bool, EdgekeyError> {
    Ok(get_config_path()?.exists())
}

/// Load configuration from the default file, falling back to defaults
///
/// A missing file is not an error: every setting has a default.
pub fn load_config() -> Result<AppConfig, EdgekeyError> {
    let path = get_config_path()?;
    if !path.exists() {
        debug!("No configuration file at {:?}, using defaults", path);
        return Ok(AppConfig::default());
    }
    load_config_from_path(&path)
}

/// Load configuration from a specific TOML file
pub fn load_config_from_path<P: AsRef<Path>>(path: P) -> Result<AppConfig, EdgekeyError> {
    let contents = std::fs::read_to_string(&path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => EdgekeyError::Config(ConfigError::LoadFailed {
            path: path.as_ref().to_string_lossy().to_string(),
        }),
        _ => EdgekeyError::Config(ConfigError::IoError {
            message: format!("Failed to read config file: {}", e),
        }),
    })?;

    let config: AppConfig = toml::from_str(&contents)?;

    config.validate().map_err(|e| {
        EdgekeyError::Config(ConfigError::ValidationError {
            message: e.to_string(),
        })
    })?;

    info!(
        "Loaded configuration: target={}, login_poll={}x{}s, connection_poll={}x{}s, settle={}s",
        config.target.bundle_id,
        config.timing.login_poll_attempts,
        config.timing.login_poll_interval_secs,
        config.timing.connection_poll_attempts,
        config.timing.connection_poll_interval_secs,
        config.timing.two_factor_settle_secs
    );

    Ok(config)
}

/// Save configuration to the default TOML file
pub fn save_config(config: &AppConfig) -> Result<(), EdgekeyError> {
    let path = get_config_path()?;
    save_config_to_path(config, &path)
}

/// Save configuration to a specific TOML file
pub fn save_config_to_path<P: AsRef<Path>>(config: &AppConfig, path: P) -> Result<(), EdgekeyError> {
    config.validate().map_err(|e| {
        EdgekeyError::Config(ConfigError::ValidationError {
            message: e.to_string(),
        })
    })?;

    // Ensure config directory exists
    if let Some(parent) = path.as_ref().parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
            EdgekeyError::Config(ConfigError::IoError {
                message: format!("Failed to create config directory: {}", e),
            })
        })?;
    }

    let contents = toml::to_string_pretty(config)?;

    std::fs::write(&path, contents).map_err(|_| {
        EdgekeyError::Config(ConfigError::SaveFailed {
            path: path.as_ref().to_string_lossy().to_string(),
        })
    })?;

    info!("Saved configuration to {:?}", path.as_ref());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_config_roundtrip() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("config.toml");

        let mut original = AppConfig::default();
        original.target.process_name = "F5 Networks VPN".to_string();
        original.target.code_submit_button = Some("Verify".to_string());
        original.timing.two_factor_settle_secs = 0;

        save_config_to_path(&original, &config_path).unwrap();
        let loaded = load_config_from_path(&config_path).unwrap();

        assert_eq!(original, loaded);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("config.toml");
        std::fs::write(
            &config_path,
            "[target]\nbundle_id = \"com.example.vpn\"\n\n[timing]\nlogin_poll_attempts = 8\n",
        )
        .unwrap();

        let loaded = load_config_from_path(&config_path).unwrap();
        assert_eq!(loaded.target.bundle_id, "com.example.vpn");
        assert_eq!(loaded.target.submit_button, "Logon");
        assert_eq!(loaded.timing.login_poll_attempts, 8);
        assert_eq!(loaded.timing.connection_poll_attempts, 12);
    }

    #[test]
    fn test_invalid_values_rejected_on_load() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("config.toml");
        std::fs::write(&config_path, "[timing]\nconnection_poll_interval_secs = 0\n").unwrap();

        let err = load_config_from_path(&config_path).unwrap_err();
        assert!(matches!(
            err,
            EdgekeyError::Config(ConfigError::ValidationError { .. })
        ));
    }

    #[test]
    fn test_missing_file_is_load_failed() {
        let temp_dir = tempdir().unwrap();
        let err = load_config_from_path(temp_dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, EdgekeyError::Config(ConfigError::LoadFailed { .. })));
    }
}
