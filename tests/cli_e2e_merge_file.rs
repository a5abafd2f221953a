//! End-to-end tests for the `merge-file` command
//!
//! These tests invoke the actual CLI binary and validate its behavior
//! from a user's perspective.

use assert_cmd::cargo::cargo_bin_cmd;
use assert_fs::prelude::*;
use predicates::prelude::*;

/// Write the three inputs and return their paths as strings.
fn inputs(
    temp: &assert_fs::TempDir,
    name: &str,
    current: &str,
    baseline: &str,
    generated: &str,
) -> [std::path::PathBuf; 3] {
    let ext = std::path::Path::new(name)
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    let c = temp.child(name);
    let b = temp.child(format!("baseline{}", ext));
    let g = temp.child(format!("generated{}", ext));
    c.write_str(current).unwrap();
    b.write_str(baseline).unwrap();
    g.write_str(generated).unwrap();
    [c.to_path_buf(), b.to_path_buf(), g.to_path_buf()]
}

#[test]
fn test_merge_file_help() {
    let mut cmd = cargo_bin_cmd!("gensync");

    cmd.arg("merge-file")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Three-way merge"));
}

#[test]
fn test_merge_file_clean_to_stdout() {
    let temp = assert_fs::TempDir::new().unwrap();
    let [current, baseline, generated] =
        inputs(&temp, "notes.txt", "A\nb\nc\n", "a\nb\nc\n", "a\nb\nC\n");

    let mut cmd = cargo_bin_cmd!("gensync");
    cmd.arg("merge-file")
        .arg(&current)
        .arg(&baseline)
        .arg(&generated)
        .assert()
        .code(0)
        .stdout("A\nb\nC\n");
}

#[test]
fn test_merge_file_conflict_exits_one() {
    let temp = assert_fs::TempDir::new().unwrap();
    let [current, baseline, generated] = inputs(&temp, "notes.txt", "y\n", "x\n", "z\n");

    let mut cmd = cargo_bin_cmd!("gensync");
    cmd.arg("merge-file")
        .arg(&current)
        .arg(&baseline)
        .arg(&generated)
        .arg("--diff3")
        .assert()
        .code(1)
        .stdout(predicate::str::contains("<<<<<<< current"))
        .stdout(predicate::str::contains("||||||| baseline"))
        .stderr(predicate::str::contains("conflict: baseline line 1"));
}

#[test]
fn test_merge_file_writes_output_in_place() {
    let temp = assert_fs::TempDir::new().unwrap();
    let [current, baseline, generated] = inputs(
        &temp,
        "config.json",
        r#"{"a":1,"b":3}"#,
        r#"{"a":1,"b":2}"#,
        r#"{"a":1,"b":2,"c":4}"#,
    );

    let mut cmd = cargo_bin_cmd!("gensync");
    cmd.arg("merge-file")
        .arg(&current)
        .arg(&baseline)
        .arg(&generated)
        .arg("--output")
        .arg(&current)
        .assert()
        .code(0)
        .stdout("");

    let merged: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&current).unwrap()).unwrap();
    assert_eq!(merged, serde_json::json!({"a": 1, "b": 3, "c": 4}));
}

#[test]
fn test_merge_file_text_strategy_override() {
    let temp = assert_fs::TempDir::new().unwrap();
    let [current, baseline, generated] = inputs(
        &temp,
        "config.json",
        "{\"a\":1,\"b\":3}\n",
        "{\"a\":1,\"b\":2}\n",
        "{\"a\":1,\"b\":2,\"c\":4}\n",
    );

    // Line-wise, both sides rewrote the only line.
    let mut cmd = cargo_bin_cmd!("gensync");
    cmd.arg("merge-file")
        .arg(&current)
        .arg(&baseline)
        .arg(&generated)
        .arg("--strategy")
        .arg("text")
        .assert()
        .code(1);
}

#[test]
fn test_merge_file_unknown_strategy_is_usage_error() {
    let temp = assert_fs::TempDir::new().unwrap();
    let [current, baseline, generated] = inputs(&temp, "a.txt", "a\n", "a\n", "a\n");

    let mut cmd = cargo_bin_cmd!("gensync");
    cmd.arg("merge-file")
        .arg(&current)
        .arg(&baseline)
        .arg(&generated)
        .arg("--strategy")
        .arg("xml")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Unknown merge strategy 'xml'"));
}

#[test]
fn test_merge_file_missing_input() {
    let temp = assert_fs::TempDir::new().unwrap();

    let mut cmd = cargo_bin_cmd!("gensync");
    cmd.arg("merge-file")
        .arg(temp.path().join("a.txt"))
        .arg(temp.path().join("b.txt"))
        .arg(temp.path().join("c.txt"))
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Failed to read"));
}
