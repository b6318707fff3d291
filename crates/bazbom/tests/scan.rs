//! End-to-end CLI tests for `depscan scan` (§8), exercised through the
//! compiled binary via `assert_cmd` the way the teacher's own CLI crate
//! drives its integration suite.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;

fn depscan() -> Command {
    Command::cargo_bin("depscan").expect("binary built")
}

#[test]
fn scan_of_directory_with_no_manifest_files_fails_outright() {
    // No ecosystem produces any dependency here, which is the "contradictory
    // or empty input set" case that fails the scan rather than reporting an
    // empty, successful one (§7).
    let dir = tempfile::tempdir().unwrap();
    depscan()
        .arg("scan")
        .arg(dir.path())
        .assert()
        .code(2)
        .stderr(predicate::str::contains("error:"));
}

#[test]
fn scan_on_clean_manifest_exits_zero() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("package.json"), r#"{"dependencies": {}}"#).unwrap();
    depscan().arg("scan").arg(dir.path()).assert().success();
}

#[test]
fn scan_writes_json_report_when_requested() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("package.json"), r#"{"dependencies": {}}"#).unwrap();
    let report_path = dir.path().join("report.json");

    depscan()
        .arg("scan")
        .arg(dir.path())
        .arg("--json")
        .arg(&report_path)
        .assert()
        .success();

    let body = fs::read_to_string(&report_path).unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(parsed["status"], "COMPLETED");
}

#[test]
fn scan_root_with_no_discoverable_files_exits_with_code_two() {
    depscan()
        .arg("scan")
        .arg("/nonexistent/path/that/does/not/exist")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("error:"));
}

#[test]
fn ignore_severity_flag_is_accepted_repeatedly() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("package.json"), r#"{"dependencies": {}}"#).unwrap();
    depscan()
        .arg("scan")
        .arg(dir.path())
        .arg("--ignore-severity")
        .arg("LOW")
        .arg("--ignore-severity")
        .arg("MEDIUM")
        .assert()
        .success();
}
