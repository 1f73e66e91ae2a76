//! Setup command implementation
//!
//! Interactive command for first-time configuration: which VPN client to
//! drive, and the credentials to type into it.

use super::Services;
use edgekey_core::{
    config::{toml_config, AppConfig},
    error::{ConfigError, EdgekeyError, StoreError},
};
use secrecy::{ExposeSecret, Secret};
use std::io::{self, Write};
use tracing::warn;

/// Run the setup command
pub async fn run_setup() -> Result<(), EdgekeyError> {
    println!("🔐 edgekey Setup");
    println!("================");
    println!();
    println!("This will configure automatic login for your VPN client.");
    println!("Credentials will be stored in your system's secure store.");
    println!("Settings will be saved to ~/.config/edgekey/config.toml");
    println!();

    // Check if already configured
    let configured = toml_config::config_exists()?;
    if configured {
        println!("⚠️  Existing configuration detected.");
        if !prompt_yes_no("Overwrite existing setup?", false)? {
            println!("Setup cancelled.");
            return Ok(());
        }
        println!();
    }

    let mut config = toml_config::load_config()?;
    let services = Services::new(&config);

    if !configured && services.store.exists()? {
        println!("⚠️  Saved credentials detected.");
        if !prompt_yes_no("Overwrite existing setup?", false)? {
            println!("Setup cancelled.");
            return Ok(());
        }
        println!();
    }

    collect_target(&mut config)?;
    let (username, secret) = collect_credentials()?;

    config.validate().map_err(|e| {
        EdgekeyError::Config(ConfigError::ValidationError {
            message: format!("Configuration validation failed: {}", e),
        })
    })?;

    println!();
    println!("💾 Saving configuration...");
    toml_config::save_config(&config)?;

    // Store under the (possibly new) service name
    let services = Services::new(&config);
    match services.store.save(&username, secret.expose_secret()) {
        Ok(()) => {}
        Err(StoreError::ServiceUnavailable { reason }) => {
            println!("❌ The secure store is not available or locked.");
            println!("Please unlock it and run setup again.");
            return Err(StoreError::ServiceUnavailable { reason }.into());
        }
        Err(e) => return Err(e.into()),
    }

    println!();
    println!("Checking automation permission...");
    match services.driver.request_automation_permission(true).await {
        Ok(true) => println!("✅ Automation permission granted."),
        Ok(false) => {
            println!("⚠️  Automation permission is not granted yet.");
            println!("   Allow your terminal under Privacy & Security > Accessibility.");
        }
        Err(e) => warn!("Could not check automation permission: {}", e),
    }

    println!("✅ Setup complete!");
    println!();
    println!("You can now use:");
    println!("  edgekey connect  - Log in once");
    println!("  edgekey watch    - Stay logged in, re-checking periodically");
    println!("  edgekey status   - Show connection and check status");

    Ok(())
}

/// Collect the target application interactively
fn collect_target(config: &mut AppConfig) -> Result<(), EdgekeyError> {
    println!("VPN Client:");
    println!("-----------");

    config.target.process_name = prompt_required("Application name", &config.target.process_name)?;
    config.target.bundle_id = prompt_required("Bundle identifier", &config.target.bundle_id)?;

    let digits = prompt_optional(
        "Verification code length (0 if it varies)",
        &config.two_factor.expected_digits.to_string(),
    )?;
    config.two_factor.expected_digits = digits.parse().map_err(|_| {
        EdgekeyError::Config(ConfigError::ValidationError {
            message: "Invalid code length".to_string(),
        })
    })?;

    Ok(())
}

/// Collect username and secret interactively
fn collect_credentials() -> Result<(String, Secret<String>), EdgekeyError> {
    println!();
    println!("Credentials:");
    println!("------------");
    println!("These will be stored securely and typed into the VPN client for you.");
    println!();

    let username = prompt_required("Username", "")?;

    loop {
        match prompt_password("Password: ")? {
            Some(secret) => return Ok((username, secret)),
            None => println!("❌ Password cannot be empty. Please try again."),
        }
    }
}

/// Prompt for a secret without echoing it; `None` if nothing was entered
fn prompt_password(prompt: &str) -> Result<Option<Secret<String>>, EdgekeyError> {
    let entered = rpassword::prompt_password(prompt).map_err(EdgekeyError::Io)?;
    Ok(non_empty_secret(entered))
}

fn non_empty_secret(entered: String) -> Option<Secret<String>> {
    let secret = Secret::new(entered);
    (!secret.expose_secret().is_empty()).then_some(secret)
}

/// Prompt for a required value with default
fn prompt_required(prompt: &str, default: &str) -> Result<String, EdgekeyError> {
    let prompt_text = if default.is_empty() {
        format!("{}: ", prompt)
    } else {
        format!("{} [{}]: ", prompt, default)
    };

    loop {
        let input = prompt_input(&prompt_text)?;

        if input.trim().is_empty() {
            if !default.is_empty() {
                return Ok(default.to_string());
            }
            println!("❌ This field is required. Please enter a value.");
            continue;
        }

        return Ok(input.trim().to_string());
    }
}

/// Prompt for an optional value
fn prompt_optional(prompt: &str, default: &str) -> Result<String, EdgekeyError> {
    let prompt_text = format!("{} [{}]: ", prompt, default);
    let input = prompt_input(&prompt_text)?;

    if input.trim().is_empty() {
        Ok(default.to_string())
    } else {
        Ok(input.trim().to_string())
    }
}

/// Prompt for yes/no with default
fn prompt_yes_no(prompt: &str, default_yes: bool) -> Result<bool, EdgekeyError> {
    let default_indicator = if default_yes { "[Y/n]" } else { "[y/N]" };
    let prompt_text = format!("{} {}: ", prompt, default_indicator);

    loop {
        let input = prompt_input(&prompt_text)?.to_lowercase();

        match input.as_str() {
            "y" | "yes" => return Ok(true),
            "n" | "no" => return Ok(false),
            "" => return Ok(default_yes),
            _ => {
                println!("Please enter 'y' for yes or 'n' for no.");
                continue;
            }
        }
    }
}

/// Low-level input prompting
fn prompt_input(prompt: &str) -> Result<String, EdgekeyError> {
    print!("{}", prompt);
    io::stdout().flush().map_err(EdgekeyError::Io)?;

    let mut input = String::new();
    if io::stdin().read_line(&mut input).map_err(EdgekeyError::Io)? == 0 {
        return Err(EdgekeyError::Io(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "input closed",
        )));
    }

    Ok(input.trim_end_matches(['\r', '\n']).to_string())
}
