//! Integration tests for the `junjian` binary.

use std::fs;

use assert_cmd::{Command, cargo::cargo_bin_cmd};
use predicates::prelude::PredicateBooleanExt;
use serde_json::json;
use tempfile::TempDir;

const UNREACHABLE: &str = "http://127.0.0.1:9/api";

fn junjian(dir: &TempDir) -> Command {
    let mut cmd = cargo_bin_cmd!("junjian");
    cmd.current_dir(dir.path())
        .env("JUNJIAN_SESSION_PATH", dir.path().join("auth-storage.json"))
        .env_remove("JUNJIAN_API_BASE_URL")
        .env_remove("JUNJIAN_TIMEOUT_SECS")
        .env_remove("RUST_LOG")
        .env_remove("JUNJIAN_LOG_LEVEL")
        .timeout(std::time::Duration::from_secs(10));
    cmd
}

fn write_live_session(dir: &TempDir) {
    let record = json!({
        "state": {
            "user": {
                "id": 1,
                "email": "u@x.com",
                "nickname": "u",
                "role": "OWNER",
                "status": "ACTIVE",
                "emailVerified": true
            },
            "token": "abc",
            "isAuthenticated": true
        },
        "version": 0
    });
    fs::write(
        dir.path().join("auth-storage.json"),
        serde_json::to_vec_pretty(&record).unwrap(),
    )
    .unwrap();
}

#[test]
fn test_help_lists_commands() {
    let dir = TempDir::new().unwrap();
    junjian(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicates::str::contains("login"))
        .stdout(predicates::str::contains("register"))
        .stdout(predicates::str::contains("send-code"))
        .stdout(predicates::str::contains("--server"));
}

#[test]
fn test_config_generates_toml() {
    let dir = TempDir::new().unwrap();
    junjian(&dir)
        .args(["config", "--format", "toml"])
        .assert()
        .success()
        .stdout(predicates::str::contains("config.toml"));

    let contents = fs::read_to_string(dir.path().join("config.toml")).unwrap();
    assert!(contents.contains("api_base_url = \"http://localhost:8080/api\""));
    assert!(contents.contains("timeout_secs = 10"));
}

#[test]
fn test_config_rejects_unknown_format() {
    let dir = TempDir::new().unwrap();
    junjian(&dir)
        .args(["config", "--format", "ini"])
        .assert()
        .failure()
        .stderr(predicates::str::contains("unsupported format 'ini'"));
}

#[test]
fn test_completion_for_bash() {
    let dir = TempDir::new().unwrap();
    junjian(&dir)
        .args(["completion", "--shell", "bash"])
        .assert()
        .success()
        .stdout(predicates::str::contains("junjian"));
}

#[test]
fn test_status_without_session() {
    let dir = TempDir::new().unwrap();
    junjian(&dir)
        .arg("status")
        .assert()
        .success()
        .stdout(predicates::str::contains("Not logged in"));
}

#[test]
fn test_status_reads_persisted_session() {
    let dir = TempDir::new().unwrap();
    write_live_session(&dir);
    junjian(&dir)
        .arg("status")
        .assert()
        .success()
        .stdout(predicates::str::contains("Logged in as u@x.com (u)"))
        .stdout(predicates::str::contains("role: OWNER"))
        .stdout(predicates::str::contains("abc").not());
}

#[test]
fn test_logout_clears_persisted_session() {
    let dir = TempDir::new().unwrap();
    write_live_session(&dir);
    junjian(&dir)
        .arg("logout")
        .assert()
        .success()
        .stdout(predicates::str::contains("Logged out."));

    let record: serde_json::Value =
        serde_json::from_slice(&fs::read(dir.path().join("auth-storage.json")).unwrap()).unwrap();
    assert_eq!(record["state"]["isAuthenticated"], false);
    assert!(record["state"]["token"].is_null());

    junjian(&dir)
        .arg("logout")
        .assert()
        .success()
        .stdout(predicates::str::contains("No active session."));
}

#[test]
fn test_login_rejects_malformed_email_before_sending() {
    let dir = TempDir::new().unwrap();
    junjian(&dir)
        .args(["--server", UNREACHABLE, "login", "--email", "not-an-email", "--password-stdin"])
        .write_stdin("secret1\n")
        .assert()
        .failure()
        .stderr(predicates::str::contains("please enter a valid email address"))
        .stderr(predicates::str::contains("Network connection failed").not());
}

#[test]
fn test_login_reports_unreachable_server() {
    let dir = TempDir::new().unwrap();
    junjian(&dir)
        .args(["--server", UNREACHABLE, "login", "--email", "u@x.com", "--password-stdin"])
        .write_stdin("secret1\n")
        .assert()
        .failure()
        .stderr(predicates::str::contains("login failed"))
        .stderr(predicates::str::contains("Network connection failed"));

    assert!(!dir.path().join("auth-storage.json").exists());
}

#[test]
fn test_register_requires_both_codes() {
    let dir = TempDir::new().unwrap();
    junjian(&dir)
        .args(["register", "--email", "d@x.com", "--invite-code", "INVITE"])
        .assert()
        .failure()
        .stderr(predicates::str::contains("--verification-code"));
}

#[test]
fn test_whoami_requires_session() {
    let dir = TempDir::new().unwrap();
    junjian(&dir)
        .args(["--server", UNREACHABLE, "whoami"])
        .assert()
        .failure()
        .stderr(predicates::str::contains("no active session found"));
}

#[test]
fn test_send_code_rejects_unknown_kind() {
    let dir = TempDir::new().unwrap();
    junjian(&dir)
        .args(["send-code", "--email", "d@x.com", "--kind", "newsletter"])
        .assert()
        .failure()
        .stderr(predicates::str::contains("unsupported verification type"));
}

#[test]
fn test_debug_log_level_reports_session_path() {
    let dir = TempDir::new().unwrap();
    junjian(&dir)
        .env("JUNJIAN_LOG_LEVEL", "debug")
        .arg("status")
        .assert()
        .success()
        .stderr(predicates::str::contains("opening session"))
        .stderr(predicates::str::contains("auth-storage.json"));
}
