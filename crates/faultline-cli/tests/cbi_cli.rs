use assert_cmd::cargo::cargo_bin_cmd;
use predicates::str::contains;
use serde_json::{json, Value};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn write_log(dir: &Path, name: &str, observations: Value) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, observations.to_string()).expect("write log");
    path
}

fn log_dirs(temp: &TempDir) -> (PathBuf, PathBuf) {
    let success = temp.path().join("success");
    let failure = temp.path().join("failure");
    fs::create_dir(&success).expect("create success dir");
    fs::create_dir(&failure).expect("create failure dir");
    (success, failure)
}

#[test]
fn cbi_scores_logs_and_ranks_the_failing_branch_first() {
    let temp = TempDir::new().expect("tmp dir");
    let (success, failure) = log_dirs(&temp);
    write_log(
        &success,
        "run1.json",
        json!([{"kind": "branch", "line": 3, "column": 5, "value": false}]),
    );
    write_log(
        &failure,
        "run1.json",
        json!([{"kind": "branch", "line": 3, "column": 5, "value": true}]),
    );

    let output = cargo_bin_cmd!("faultline")
        .args([
            "cbi",
            "--success-logs",
            success.to_str().unwrap(),
            "--failure-logs",
            failure.to_str().unwrap(),
            "--format",
            "json",
        ])
        .output()
        .expect("run faultline");
    assert!(output.status.success());

    let json: Value = serde_json::from_slice(&output.stdout).expect("parse json");
    assert_eq!(json["invocation"]["command"], "cbi");
    assert_eq!(json["result"]["success_runs"], Value::from(1));
    assert_eq!(json["result"]["failure_runs"], Value::from(1));

    let predicates = json["result"]["predicates"].as_array().expect("predicates");
    assert_eq!(predicates.len(), 2);

    let taken = predicates
        .iter()
        .find(|info| info["predicate"]["polarity"] == "branch_true")
        .expect("branch_true entry");
    assert_eq!(taken["num_true_in_failure"], Value::from(1));
    assert_eq!(taken["num_observed_in_failure"], Value::from(1));
    assert_eq!(taken["num_observed_in_success"], Value::from(1));

    let ranking = json["result"]["ranking"].as_array().expect("ranking");
    assert_eq!(ranking[0]["predicate"]["polarity"], "branch_true");
    assert!(ranking[0]["increase"].as_f64().expect("increase") > 0.0);
}

#[test]
fn cbi_text_output_lists_top_predicates() {
    let temp = TempDir::new().expect("tmp dir");
    let (success, failure) = log_dirs(&temp);
    write_log(
        &success,
        "run1.json",
        json!([{"kind": "branch", "line": 3, "column": 5, "value": false}]),
    );
    write_log(
        &failure,
        "run1.json",
        json!([{"kind": "branch", "line": 3, "column": 5, "value": true}]),
    );

    cargo_bin_cmd!("faultline")
        .args([
            "cbi",
            "--success-logs",
            success.to_str().unwrap(),
            "--failure-logs",
            failure.to_str().unwrap(),
            "--top",
            "1",
        ])
        .assert()
        .code(0)
        .stdout(contains("runs: success=1 failure=1"))
        .stdout(contains("3:5 branch_true"));
}

#[test]
fn cbi_reads_multiple_runs_per_directory() {
    let temp = TempDir::new().expect("tmp dir");
    let (success, failure) = log_dirs(&temp);
    for idx in 0..3 {
        write_log(
            &success,
            &format!("run{idx}.json"),
            json!([{"kind": "return", "line": 8, "column": 2, "value": true}]),
        );
    }
    write_log(
        &failure,
        "run0.json",
        json!([{"kind": "return", "line": 8, "column": 2, "value": false}]),
    );

    let output = cargo_bin_cmd!("faultline")
        .args([
            "cbi",
            "--success-logs",
            success.to_str().unwrap(),
            "--failure-logs",
            failure.to_str().unwrap(),
            "--jobs",
            "2",
            "--format",
            "json",
        ])
        .output()
        .expect("run faultline");
    assert!(output.status.success());

    let json: Value = serde_json::from_slice(&output.stdout).expect("parse json");
    assert_eq!(json["result"]["success_runs"], Value::from(3));
    assert_eq!(json["result"]["failure_runs"], Value::from(1));
    assert_eq!(json["invocation"]["jobs"], Value::from(2));

    let predicates = json["result"]["predicates"].as_array().expect("predicates");
    let nonzero = predicates
        .iter()
        .find(|info| info["predicate"]["polarity"] == "return_true")
        .expect("return_true entry");
    assert_eq!(nonzero["num_true_in_success"], Value::from(3));
    assert_eq!(nonzero["num_observed_in_failure"], Value::from(1));
}

#[test]
fn jobs_must_be_at_least_one() {
    let temp = TempDir::new().expect("tmp dir");
    let (success, failure) = log_dirs(&temp);

    cargo_bin_cmd!("faultline")
        .args([
            "cbi",
            "--success-logs",
            success.to_str().unwrap(),
            "--failure-logs",
            failure.to_str().unwrap(),
            "--jobs",
            "0",
        ])
        .assert()
        .code(2)
        .stderr(contains("--jobs must be >= 1"));
}

#[test]
fn missing_log_directory_exits_one() {
    let temp = TempDir::new().expect("tmp dir");
    let (success, _failure) = log_dirs(&temp);

    cargo_bin_cmd!("faultline")
        .args([
            "cbi",
            "--success-logs",
            success.to_str().unwrap(),
            "--failure-logs",
            temp.path().join("no-such-dir").to_str().unwrap(),
        ])
        .assert()
        .code(1)
        .stderr(contains("not found"));
}

#[test]
fn malformed_log_is_a_tool_error() {
    let temp = TempDir::new().expect("tmp dir");
    let (success, failure) = log_dirs(&temp);
    fs::write(success.join("run1.json"), "not json").expect("write log");
    write_log(
        &failure,
        "run1.json",
        json!([{"kind": "branch", "line": 1, "column": 1, "value": true}]),
    );

    cargo_bin_cmd!("faultline")
        .args([
            "cbi",
            "--success-logs",
            success.to_str().unwrap(),
            "--failure-logs",
            failure.to_str().unwrap(),
        ])
        .assert()
        .code(2)
        .stderr(contains("tool error"));
}
