// SPDX-License-Identifier: Apache-2.0

use std::path::Path;

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;

const STORE: &str = "def save(item):\n    db.add(item)\n    return item\n";

/// A `check` command isolated from the caller's git repository and config.
fn check_in(dir: &Path) -> Command {
    let mut cmd = cargo_bin_cmd!("guardrail");
    cmd.current_dir(dir)
        .env("XDG_CONFIG_HOME", dir.join(".config"))
        .env("GIT_DIR", dir.join("no-such-git-dir"))
        .env_remove("RUST_LOG")
        .arg("check");
    cmd
}

fn project() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("app")).unwrap();
    std::fs::write(dir.path().join("app/store.py"), STORE).unwrap();
    dir
}

#[test]
fn test_version() {
    let mut cmd = cargo_bin_cmd!("guardrail");
    cmd.arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("guardrail"));
}

#[test]
fn test_help_contains_all_commands() {
    let mut cmd = cargo_bin_cmd!("guardrail");
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("check"))
        .stdout(predicate::str::contains("patterns"))
        .stdout(predicate::str::contains("completion"));
}

#[test]
fn test_patterns_json_output() {
    let output = cargo_bin_cmd!("guardrail")
        .args(["patterns", "--output", "json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let patterns = json["patterns"].as_array().unwrap();
    assert_eq!(patterns.len(), 15);
    assert_eq!(patterns[0]["id"], "authentication_check");
    assert_eq!(patterns[0]["severity"], "critical");
}

#[test]
fn test_patterns_text_table() {
    let mut cmd = cargo_bin_cmd!("guardrail");
    cmd.arg("patterns")
        .assert()
        .success()
        .stdout(predicate::str::contains("role_check"))
        .stdout(predicate::str::contains("capability"));
}

#[test]
fn test_completion_bash() {
    let mut cmd = cargo_bin_cmd!("guardrail");
    cmd.args(["completion", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("guardrail"));
}

#[test]
fn test_untested_write_blocks() {
    let dir = project();
    let output = check_in(dir.path())
        .args(["app/store.py", "--worktree", "-o", "json"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["verdict"], "BLOCK");
    assert_eq!(json["findings"][0]["pattern"]["pattern_type"], "persistence_write");
    assert_eq!(json["findings"][0]["change_kind"], "ADDED");
}

#[test]
fn test_tested_write_passes() {
    let dir = project();
    std::fs::create_dir_all(dir.path().join("tests")).unwrap();
    std::fs::write(
        dir.path().join("tests/test_store.py"),
        "def test_save(fake_db):\n    save(item)\n    assert fake_db.added\n",
    )
    .unwrap();

    check_in(dir.path())
        .args(["app/store.py", "--worktree"])
        .assert()
        .code(0)
        .stdout(predicate::str::contains("Verdict: PASS"));
}

#[test]
fn test_sarif_output() {
    let dir = project();
    let output = check_in(dir.path())
        .args(["app/store.py", "--worktree", "-o", "sarif"])
        .output()
        .unwrap();

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["version"], "2.1.0");
    assert_eq!(json["runs"][0]["results"][0]["ruleId"], "persistence_write");
    assert_eq!(json["runs"][0]["results"][0]["level"], "error");
}

#[test]
fn test_staged_files_outside_repository_is_internal_error() {
    let dir = project();
    check_in(dir.path())
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Error:"));
}

#[test]
fn test_invalid_project_config_is_internal_error() {
    let dir = project();
    std::fs::write(
        dir.path().join(".guardrail.toml"),
        "[policy]\nescalate_deletions = \"maybe\"\n",
    )
    .unwrap();

    check_in(dir.path())
        .args(["app/store.py", "--worktree"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Tip:"));
}
