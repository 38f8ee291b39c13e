//! Integration tests for the `wsload` binary.
//!
//! Argument parsing, help output, shell completions, and startup
//! validation. No test here opens a network connection: every invocation
//! either exits before dialing or fails validation.
#![allow(clippy::unwrap_used)]

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;

// ── Helpers ─────────────────────────────────────────────────────────

/// Build a [`Command`] for the `wsload` binary with env isolation.
///
/// Clears all `WSLOAD_*` env vars and points config directories at a
/// nonexistent path so tests never read the user's real configuration.
fn wsload_cmd() -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("wsload");
    cmd.env("HOME", "/tmp/wsload-cli-test-nonexistent")
        .env("XDG_CONFIG_HOME", "/tmp/wsload-cli-test-nonexistent")
        .env("NO_COLOR", "1")
        .env_remove("WSLOAD_SERVICE")
        .env_remove("WSLOAD_APP_ID")
        .env_remove("WSLOAD_API_KEY")
        .env_remove("WSLOAD_API_KEY_ENV")
        .env_remove("WSLOAD_SUBSCRIPTIONS")
        .env_remove("WSLOAD_COUNT")
        .env_remove("WSLOAD_ENDPOINT_TEMPLATE")
        .env_remove("WSLOAD_SUPPORTED_SERVICES")
        .env_remove("WSLOAD_LOG_FILE");
    cmd
}

/// Concatenate stdout + stderr from a command output for flexible matching.
fn combined_output(output: &std::process::Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    format!("{stdout}{stderr}")
}

// ── Basic invocation ────────────────────────────────────────────────

#[test]
fn test_help_flag() {
    wsload_cmd().arg("--help").assert().success().stdout(
        predicate::str::contains("--app-id")
            .and(predicate::str::contains("--api-key"))
            .and(predicate::str::contains("--subs"))
            .and(predicate::str::contains("--count"))
            .and(predicate::str::contains("completions")),
    );
}

#[test]
fn test_version_flag() {
    wsload_cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("wsload"));
}

// ── Shell completions ───────────────────────────────────────────────

#[test]
fn test_completions_bash() {
    wsload_cmd()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty().not());
}

#[test]
fn test_completions_zsh() {
    wsload_cmd()
        .args(["completions", "zsh"])
        .assert()
        .success()
        .stdout(predicate::str::contains("#compdef"));
}

// ── Usage errors (clap) ─────────────────────────────────────────────

#[test]
fn test_unknown_flag_is_usage_error() {
    let output = wsload_cmd().arg("--bogus").output().unwrap();
    assert_eq!(output.status.code(), Some(2));
    assert!(combined_output(&output).contains("--bogus"));
}

#[test]
fn test_invalid_output_format() {
    let output = wsload_cmd().args(["--output", "yaml"]).output().unwrap();
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn test_non_numeric_count() {
    let output = wsload_cmd().args(["--count", "many"]).output().unwrap();
    assert_eq!(output.status.code(), Some(2));
}

// ── Startup validation (exit 1) ─────────────────────────────────────

#[test]
fn test_unsupported_service() {
    let output = wsload_cmd()
        .args(["--service", "ethereum", "-a", "app", "-k", "key"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
    let text = combined_output(&output);
    assert!(text.contains("ethereum"), "Expected service in error:\n{text}");
    assert!(text.contains("xrplevm"), "Expected supported list in help:\n{text}");
}

#[test]
fn test_missing_app_id() {
    let output = wsload_cmd().args(["-k", "key"]).output().unwrap();
    assert_eq!(output.status.code(), Some(1));
    assert!(combined_output(&output).contains("app_id"));
}

#[test]
fn test_missing_api_key() {
    let output = wsload_cmd()
        .args(["-s", "wsload-test-service-without-keyring", "-a", "app"])
        .env("WSLOAD_SUPPORTED_SERVICES", "[\"wsload-test-service-without-keyring\"]")
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
    let text = combined_output(&output);
    assert!(text.contains("No API key"), "Expected credential error:\n{text}");
}

#[test]
fn test_zero_count() {
    let output = wsload_cmd()
        .args(["-a", "app", "-k", "key", "-c", "0"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
    assert!(combined_output(&output).contains("count"));
}

#[test]
fn test_malformed_url_override() {
    let output = wsload_cmd()
        .args(["--url", "not a url"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
    assert!(combined_output(&output).contains("url"));
}

#[test]
#[cfg(target_os = "linux")]
fn test_config_file_in_xdg_dir_is_read() {
    let dir = tempfile::tempdir().unwrap();
    let config_dir = dir.path().join("wsload");
    std::fs::create_dir_all(&config_dir).unwrap();
    std::fs::write(config_dir.join("config.toml"), "supported_services = [\"other\"]\n").unwrap();

    let output = wsload_cmd()
        .env("XDG_CONFIG_HOME", dir.path())
        .args(["-a", "app", "-k", "key"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
    let text = combined_output(&output);
    assert!(text.contains("Unsupported service 'xrplevm'"), "Expected allow-list from file:\n{text}");
}
