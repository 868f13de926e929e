//! Integration tests for the modsite CLI

use std::path::Path;
use std::process::{Command, Output};

fn modsite(db: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_modsite"))
        .arg("--db")
        .arg(db)
        .args(args)
        .env_remove("MODSITE_PROXY_URL")
        .env_remove("MODSITE_DB_PATH")
        .env_remove("MODSITE_WORKERS")
        .env_remove("MODSITE_MAX_IN_FLIGHT_ZIP_MI")
        .env_remove("MODSITE_FETCH_TIMEOUT")
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to execute modsite")
}

#[test]
fn test_cli_version() {
    let output = Command::new(env!("CARGO_BIN_EXE_modsite"))
        .arg("--version")
        .output()
        .expect("Failed to execute modsite");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("modsite"));
}

#[test]
fn test_cli_help() {
    let output = Command::new(env!("CARGO_BIN_EXE_modsite"))
        .arg("--help")
        .output()
        .expect("Failed to execute modsite");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    for command in ["fetch", "enqueue", "state", "exclude", "inflight"] {
        assert!(stdout.contains(command), "help is missing {command}");
    }
}

#[test]
fn test_cli_invalid_command() {
    let output = Command::new(env!("CARGO_BIN_EXE_modsite"))
        .arg("invalid-command")
        .output()
        .expect("Failed to execute modsite");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("unrecognized subcommand"));
}

#[test]
fn test_enqueue_requires_module_at_version() {
    let dir = tempfile::tempdir().unwrap();
    let output = modsite(&dir.path().join("state.sqlite"), &["enqueue", "example.com/m"]);
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("module@version"));
}

#[test]
fn test_state_of_unknown_module() {
    let dir = tempfile::tempdir().unwrap();
    let output = modsite(
        &dir.path().join("state.sqlite"),
        &["--json", "state", "example.com/m", "v1.0.0"],
    );
    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["kind"], "state");
    assert!(json["result"]["module"].is_null());
    assert!(json["result"]["version_map"].is_null());
}

#[test]
fn test_excluded_module_is_recorded_without_fetching() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("state.sqlite");
    // Unroutable proxy: an excluded module must never reach it
    let proxy = ["--proxy", "http://127.0.0.1:9"];

    let output = modsite(&db, &["exclude", "example.com/", "--reason", "spam"]);
    assert!(output.status.success());

    let mut args = proxy.to_vec();
    args.extend(["--json", "fetch", "example.com/m", "v1.0.0"]);
    let output = modsite(&db, &args);
    assert_eq!(output.status.code(), Some(2));
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["kind"], "fetch");
    assert_eq!(json["result"]["status"], 403);
    assert_eq!(json["result"]["units"], 0);

    let output = modsite(&db, &["--json", "state", "example.com/m", "v1.0.0"]);
    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["result"]["module"]["status"], 403);
    assert_eq!(json["result"]["module"]["try_count"], 1);
}
