//! CLI integration tests
//!
//! These tests run the classmark binary over JSON class pools written to a
//! temporary directory.

use assert_cmd::Command;
use classmark::classfile::{access, Clazz, LibraryClass, ProgramClassBuilder};
use predicates::prelude::*;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Main calls Util.helper; Util.dead and the Dead class are never reached
fn classes() -> Vec<Clazz> {
    let object = LibraryClass::new(access::PUBLIC, "java/lang/Object", None)
        .with_method(access::PUBLIC, "<init>", "()V")
        .into();
    let main = ProgramClassBuilder::new(access::PUBLIC, "app/Main", Some("java/lang/Object"))
        .method_with_code(access::PUBLIC | access::STATIC, "main", "([Ljava/lang/String;)V", |code| {
            code.invokestatic("app/Util", "helper", "()V").return_();
        })
        .build();
    let util = ProgramClassBuilder::new(access::PUBLIC, "app/Util", Some("java/lang/Object"))
        .method(access::PUBLIC | access::STATIC, "helper", "()V")
        .method(access::PUBLIC | access::STATIC, "dead", "()V")
        .build();
    let dead = ProgramClassBuilder::new(access::PUBLIC, "app/Dead", Some("java/lang/Object"))
        .method(access::PUBLIC, "run", "()V")
        .build();
    vec![object, main, util, dead]
}

fn write_pool(dir: &Path) -> PathBuf {
    let path = dir.join("pool.json");
    fs::write(&path, serde_json::to_string(&classes()).unwrap()).unwrap();
    path
}

fn classmark() -> Command {
    let mut cmd = Command::cargo_bin("classmark").unwrap();
    cmd.env("NO_COLOR", "1");
    cmd
}

fn json_output(args: &[&str]) -> Value {
    let output = classmark().args(args).arg("--format").arg("json").output().unwrap();
    assert!(output.status.success(), "classmark failed: {}", String::from_utf8_lossy(&output.stderr));
    serde_json::from_slice(&output.stdout).unwrap()
}

// ============================================================================
// Basic CLI Tests
// ============================================================================

#[test]
fn test_cli_help() {
    classmark()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("classmark"))
        .stdout(predicate::str::contains("--keep"))
        .stdout(predicate::str::contains("--why"))
        .stdout(predicate::str::contains("--print-usage"));
}

#[test]
fn test_cli_version() {
    classmark()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_cli_missing_pool_fails() {
    let temp = TempDir::new().unwrap();
    classmark()
        .arg(temp.path().join("missing.json"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read class pool file"));
}

#[test]
fn test_cli_invalid_mode_fails() {
    let temp = TempDir::new().unwrap();
    let pool = write_pool(temp.path());
    classmark().arg(&pool).args(["--mode", "optimizing"]).assert().failure();
}

// ============================================================================
// Marking
// ============================================================================

#[test]
fn test_cli_json_report() {
    let temp = TempDir::new().unwrap();
    let pool = write_pool(temp.path());

    let report = json_output(&[pool.to_str().unwrap(), "--keep", "app.Main#main", "--quiet"]);

    assert_eq!(report["version"], "1.0");
    assert_eq!(report["mode"], "shrinking");
    assert_eq!(report["unused_classes"], 1);
    assert_eq!(report["unused_members"], 1);
    assert_eq!(report["summary"]["program_classes"], 3);
    assert_eq!(report["summary"]["roots"]["classes"], 1);
    assert_eq!(report["unused"][0]["name"], "app.Dead");
    assert_eq!(report["unused"][1]["members"][0], "public static void dead()");
}

#[test]
fn test_cli_without_keep_rules_reports_everything() {
    let temp = TempDir::new().unwrap();
    let pool = write_pool(temp.path());

    let report = json_output(&[pool.to_str().unwrap(), "--quiet"]);

    assert_eq!(report["unused_classes"], 3);
    assert_eq!(report["summary"]["used_classes"], 0);
}

#[test]
fn test_cli_obfuscation_mode() {
    let temp = TempDir::new().unwrap();
    let pool = write_pool(temp.path());

    let report = json_output(&[pool.to_str().unwrap(), "--keep", "app.Main#main", "--mode", "obfuscation"]);

    assert_eq!(report["mode"], "obfuscation");
}

#[test]
fn test_cli_print_usage() {
    let temp = TempDir::new().unwrap();
    let pool = write_pool(temp.path());
    let usage = temp.path().join("usage.txt");

    classmark()
        .arg(&pool)
        .args(["--keep", "app.Main#main", "--print-usage"])
        .arg(&usage)
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage written to"));

    let content = fs::read_to_string(&usage).unwrap();
    assert_eq!(content, "app.Dead\napp.Util\n    public static void dead()\n");
}

#[test]
fn test_cli_why_are_you_keeping() {
    let temp = TempDir::new().unwrap();
    let pool = write_pool(temp.path());

    let report = json_output(&[
        pool.to_str().unwrap(),
        "--keep",
        "app.Main#main",
        "--why",
        "app.Util",
        "--why",
        "app.Dead",
    ]);

    let explanations = report["explanations"].as_array().unwrap();
    assert_eq!(explanations.len(), 2);

    let util = &explanations[0];
    assert_eq!(util["entity"], "app.Util");
    assert_eq!(util["state"], "used");
    let steps = util["steps"].as_array().unwrap();
    let root = steps.last().unwrap()["reason"].as_str().unwrap();
    assert!(root.starts_with("is kept by a directive in the configuration"));

    let dead = &explanations[1];
    assert_eq!(dead["entity"], "app.Dead");
    assert!(dead["state"].is_null());
}

#[test]
fn test_cli_why_unknown_class_fails() {
    let temp = TempDir::new().unwrap();
    let pool = write_pool(temp.path());

    classmark()
        .arg(&pool)
        .args(["--why", "app.Nowhere"])
        .assert()
        .failure();
}

#[test]
fn test_cli_terminal_report() {
    let temp = TempDir::new().unwrap();
    let pool = write_pool(temp.path());

    classmark()
        .arg(&pool)
        .args(["--keep", "app.Main#main"])
        .assert()
        .success()
        .stdout(predicate::str::contains("app.Dead"))
        .stdout(predicate::str::contains("app.Util"));
}

// ============================================================================
// Configuration
// ============================================================================

#[test]
fn test_cli_default_config_next_to_pool() {
    let temp = TempDir::new().unwrap();
    let pool = write_pool(temp.path());
    fs::write(
        temp.path().join("classmark.yml"),
        "keep:\n  - class: app.Main\n    members:\n      - name: main\nreport:\n  format: json\n",
    )
    .unwrap();

    let output = classmark().arg(&pool).arg("--quiet").output().unwrap();
    assert!(output.status.success());

    let report: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["unused_classes"], 1);
}

#[test]
fn test_cli_explicit_toml_config() {
    let temp = TempDir::new().unwrap();
    let pool = write_pool(temp.path());
    let config = temp.path().join("rules.toml");
    fs::write(
        &config,
        "[[keep]]\nclass = \"app.*\"\nmembers = [{ name = \"*\" }]\n",
    )
    .unwrap();

    let report = json_output(&[pool.to_str().unwrap(), "--config", config.to_str().unwrap()]);

    assert_eq!(report["unused_classes"], 0);
    assert_eq!(report["unused_members"], 0);
}
