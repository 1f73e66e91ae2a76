//! Integration tests for the command-line surface
//!
//! These only exercise paths that stop before the secure store or the VPN
//! client is touched, so they run anywhere.

use std::io::Write;
use std::process::{Command, Stdio};
use tempfile::tempdir;

const EDGEKEY_BINARY: &str = env!("CARGO_BIN_EXE_edgekey");

#[test]
fn test_help_lists_commands() {
    let output = Command::new(EDGEKEY_BINARY)
        .arg("--help")
        .output()
        .expect("Failed to run edgekey --help");

    assert!(output.status.success(), "Help command should succeed");
    let stdout = String::from_utf8_lossy(&output.stdout);
    for command in ["setup", "connect", "status", "watch", "forget"] {
        assert!(stdout.contains(command), "Help should mention {}", command);
    }
}

#[test]
fn test_status_help_mentions_json() {
    let output = Command::new(EDGEKEY_BINARY)
        .args(["status", "--help"])
        .output()
        .expect("Failed to run edgekey status --help");

    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("--json"));
}

#[test]
fn test_invalid_config_exits_with_2() {
    let config_dir = tempdir().unwrap();
    std::fs::write(
        config_dir.path().join("config.toml"),
        "[timing]\nlogin_poll_attempts = 0\n",
    )
    .unwrap();

    let output = Command::new(EDGEKEY_BINARY)
        .arg("connect")
        .env("EDGEKEY_CONFIG_DIR", config_dir.path())
        .output()
        .expect("Failed to run edgekey connect");

    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Configuration"), "stderr was: {}", stderr);
}

#[test]
fn test_malformed_config_exits_with_2() {
    let config_dir = tempdir().unwrap();
    std::fs::write(config_dir.path().join("config.toml"), "[target\n").unwrap();

    let output = Command::new(EDGEKEY_BINARY)
        .args(["status", "--json"])
        .env("EDGEKEY_CONFIG_DIR", config_dir.path())
        .output()
        .expect("Failed to run edgekey status");

    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn test_unknown_command_fails() {
    let output = Command::new(EDGEKEY_BINARY)
        .arg("vpn")
        .output()
        .expect("Failed to run edgekey");

    assert!(!output.status.success());
}

#[test]
fn test_setup_keeps_existing_configuration_when_declined() {
    let config_dir = tempdir().unwrap();
    let config_path = config_dir.path().join("config.toml");
    std::fs::write(&config_path, "[target]\nprocess_name = \"Custom VPN\"\n").unwrap();

    let mut child = Command::new(EDGEKEY_BINARY)
        .arg("setup")
        .env("EDGEKEY_CONFIG_DIR", config_dir.path())
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("Failed to run edgekey setup");
    child.stdin.take().unwrap().write_all(b"n\n").unwrap();
    let output = child.wait_with_output().unwrap();

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Existing configuration detected"), "stdout was: {}", stdout);
    assert!(stdout.contains("Setup cancelled"));
    assert_eq!(
        std::fs::read_to_string(&config_path).unwrap(),
        "[target]\nprocess_name = \"Custom VPN\"\n"
    );
}
