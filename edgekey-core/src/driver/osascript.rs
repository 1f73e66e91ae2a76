//! AppleScript-backed driver for macOS
//!
//! Launches the VPN client with `open -b` and talks to its UI through System
//! Events via `osascript`. Scripts are piped over stdin so values typed into
//! the client never appear in the process argument list, and any script that
//! carries a value reports failures without echoing osascript's stderr.

use super::{ControlHandle, ControlMatch, ControlPredicate, ExternalAppDriver, Key};
use crate::error::DriverError;
use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Deep link to the Accessibility pane of System Settings
const ACCESSIBILITY_SETTINGS_URL: &str =
    "x-apple.systempreferences:com.apple.preference.security?Privacy_Accessibility";

/// Driver that scripts the VPN client through System Events
#[derive(Debug, Clone)]
pub struct OsaScriptDriver {
    /// Process name as shown by System Events (e.g. "BIG-IP Edge Client")
    process_name: String,
}

impl OsaScriptDriver {
    pub fn new(process_name: &str) -> Self {
        Self {
            process_name: process_name.to_string(),
        }
    }

    fn locate(binary: &str) -> Result<PathBuf, DriverError> {
        which::which(binary).map_err(|_| DriverError::Automation {
            detail: format!("'{}' not found on PATH", binary),
        })
    }

    /// Run a script and return its trimmed stdout
    ///
    /// When `sensitive` is set the script text contains typed input, so the
    /// error detail is generic rather than osascript's stderr.
    async fn run_script(&self, script: &str, sensitive: bool) -> Result<String, DriverError> {
        let osascript = Self::locate("osascript")?;

        let mut child = Command::new(osascript)
            .arg("-")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| DriverError::Automation {
                detail: format!("Failed to spawn osascript: {}", e),
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(script.as_bytes())
                .await
                .map_err(|e| DriverError::Automation {
                    detail: format!("Failed to write script to osascript: {}", e),
                })?;
            // Dropping stdin closes it so osascript starts executing
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| DriverError::Automation {
                detail: format!("osascript did not complete: {}", e),
            })?;

        if !output.status.success() {
            let detail = if sensitive {
                format!("script exited with {}", output.status)
            } else {
                String::from_utf8_lossy(&output.stderr).trim().to_string()
            };
            return Err(DriverError::Automation { detail });
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    fn tell_process(&self, body: &str) -> String {
        tell_process_script(&self.process_name, body)
    }

    /// Run an input script and require it to report delivery
    ///
    /// The process guard answers "false" with a zero exit status, so success
    /// is only what the script itself confirms.
    async fn run_input(
        &self,
        body: &str,
        action: &str,
        sensitive: bool,
    ) -> Result<(), DriverError> {
        let script = input_script(&self.process_name, body);
        let stdout = self
            .run_script(&script, sensitive)
            .await
            .map_err(|e| match e {
                DriverError::Automation { detail } if !sensitive => DriverError::Automation {
                    detail: format!("Failed to {}: {}", action, detail),
                },
                _ => DriverError::Automation {
                    detail: format!("Failed to {}", action),
                },
            })?;
        confirm_delivery(&stdout, &self.process_name, action)
    }
}

/// Escape a value for use inside an AppleScript string literal
pub fn escape_applescript(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len() + 2);
    for c in value.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '"' => escaped.push_str("\\\""),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Object specifier for a control in the front window
pub fn element_specifier(predicate: &ControlPredicate) -> String {
    let element = match &predicate.matcher {
        ControlMatch::Index(index) => format!("{} {}", predicate.role.as_str(), index),
        ControlMatch::Title(title) => {
            format!("{} \"{}\"", predicate.role.as_str(), escape_applescript(title))
        }
    };

    format!("{} of window 1", element)
}

fn tell_process_script(process_name: &str, body: &str) -> String {
    format!(
        "tell application \"System Events\"\n\
         \tif not (exists process \"{name}\") then return \"false\"\n\
         \ttell process \"{name}\"\n{body}\n\tend tell\n\
         end tell\n",
        name = escape_applescript(process_name),
        body = body
    )
}

fn input_script(process_name: &str, body: &str) -> String {
    tell_process_script(process_name, &format!("{}\n\t\treturn \"true\"", body))
}

fn confirm_delivery(stdout: &str, process_name: &str, action: &str) -> Result<(), DriverError> {
    if stdout == "true" {
        return Ok(());
    }
    Err(DriverError::Automation {
        detail: format!("Failed to {}: {} is not running", action, process_name),
    })
}

fn key_code(key: Key) -> u8 {
    match key {
        Key::Return => 36,
    }
}

#[async_trait]
impl ExternalAppDriver for OsaScriptDriver {
    #[tracing::instrument(skip(self))]
    async fn launch_or_activate(&self, app_id: &str) -> Result<(), DriverError> {
        let open = Self::locate("open")?;

        // `open -b` activates a running instance and launches otherwise
        let output = Command::new(open)
            .args(["-b", app_id])
            .output()
            .await
            .map_err(|e| DriverError::Automation {
                detail: format!("Failed to run open: {}", e),
            })?;

        if output.status.success() {
            info!("VPN client launched or activated");
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        if stderr.contains("Unable to find application") {
            return Err(DriverError::ApplicationNotFound {
                app: app_id.to_string(),
            });
        }

        Err(DriverError::Automation {
            detail: stderr.trim().to_string(),
        })
    }

    async fn find_control(
        &self,
        predicate: &ControlPredicate,
    ) -> Result<Option<ControlHandle>, DriverError> {
        let body = format!(
            "\t\tif exists ({}) then return \"true\"\n\t\treturn \"false\"",
            element_specifier(predicate)
        );
        let stdout = self.run_script(&self.tell_process(&body), false).await?;
        debug!(control = %predicate, found = %stdout, "Control check");

        Ok((stdout == "true").then(|| ControlHandle::new(predicate.clone())))
    }

    async fn set_text(&self, control: &ControlHandle, value: &str) -> Result<(), DriverError> {
        let element = element_specifier(control.predicate());
        let body = format!(
            "\t\tset frontmost to true\n\
             \t\tset focused of ({element}) to true\n\
             \t\tset value of ({element}) to \"{value}\"",
            element = element,
            value = escape_applescript(value)
        );

        let action = format!("fill {}", control.predicate());
        self.run_input(&body, &action, true).await?;
        debug!(control = %control.predicate(), "Text entered");
        Ok(())
    }

    async fn invoke(&self, control: &ControlHandle) -> Result<(), DriverError> {
        let body = format!(
            "\t\tset frontmost to true\n\t\tclick ({})",
            element_specifier(control.predicate())
        );
        let action = format!("click {}", control.predicate());
        self.run_input(&body, &action, false).await?;
        debug!(control = %control.predicate(), "Control invoked");
        Ok(())
    }

    async fn press_key(&self, key: Key) -> Result<(), DriverError> {
        let body = format!("\t\tset frontmost to true\n\t\tkey code {}", key_code(key));
        self.run_input(&body, &format!("press {:?}", key), false).await?;
        debug!(?key, "Key pressed");
        Ok(())
    }

    async fn type_text(&self, value: &str) -> Result<(), DriverError> {
        let body = format!(
            "\t\tset frontmost to true\n\t\tkeystroke \"{}\"",
            escape_applescript(value)
        );
        self.run_input(&body, "type into the focused control", true).await?;
        debug!("Text typed into focused control");
        Ok(())
    }

    async fn request_automation_permission(&self, prompt: bool) -> Result<bool, DriverError> {
        let script = "tell application \"System Events\" to return UI elements enabled";
        let granted = match self.run_script(script, false).await {
            Ok(stdout) => stdout == "true",
            Err(DriverError::Automation { detail }) => {
                // Not authorized to send Apple events shows up as a script error
                debug!("Automation permission check failed: {}", detail);
                false
            }
            Err(e) => return Err(e),
        };

        if !granted && prompt {
            warn!("Automation permission missing, opening Accessibility settings");
            let open = Self::locate("open")?;
            if let Err(e) = Command::new(open).arg(ACCESSIBILITY_SETTINGS_URL).status().await {
                warn!("Failed to open Accessibility settings: {}", e);
            }
        }

        Ok(granted)
    }
}
