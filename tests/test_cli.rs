//! End-to-end tests for the command-line interface

use assert_cmd::Command;
use polars::prelude::*;
use predicates::prelude::*;
use tempfile::TempDir;

#[path = "common/mod.rs"]
mod common;

use common::{create_classification_dataframe, write_csv};

fn creditpipe(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("creditpipe").unwrap();
    cmd.current_dir(dir.path())
        .env_remove("ZIP_FILE_URL")
        .env_remove("RAW_DATA_PATH")
        .env_remove("PROCESSED_DATA_PATH")
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_help_lists_commands() {
    let dir = TempDir::new().unwrap();
    creditpipe(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("fetch"))
        .stdout(predicate::str::contains("merge"))
        .stdout(predicate::str::contains("search"));
}

#[test]
fn test_fetch_without_configuration_fails() {
    let dir = TempDir::new().unwrap();
    creditpipe(&dir)
        .arg("fetch")
        .assert()
        .failure()
        .stderr(predicate::str::contains("ZIP_FILE_URL"));
}

#[test]
fn test_merge_reports_missing_base_table() {
    let dir = TempDir::new().unwrap();
    creditpipe(&dir)
        .arg("merge")
        .env("ZIP_FILE_URL", "http://example.test/data.zip")
        .env("RAW_DATA_PATH", dir.path().join("raw"))
        .env("PROCESSED_DATA_PATH", dir.path().join("processed"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("application_test.csv"));
}

#[test]
fn test_invalid_test_size_rejected() {
    let dir = TempDir::new().unwrap();
    creditpipe(&dir)
        .args(["search", "-i", "x.csv", "-t", "TARGET", "--test-size", "1.5"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("test_size"));
}

#[test]
fn test_clean_applies_constraints_and_outliers() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("in.csv");
    let output = dir.path().join("out.csv");
    let constraints = dir.path().join("constraints.json");

    let mut df = df! {
        "DAYS_BIRTH" => [-10000i64, -12000, 5, -15000, -11000, -13000],
        "AMT" => [1.0f64, 2.0, 3.0, 4.0, 1000.0, 2.5],
    }
    .unwrap();
    write_csv(&input, &mut df);
    std::fs::write(&constraints, r#"{"DAYS_BIRTH": {"min": -30000, "max": 0}}"#).unwrap();

    creditpipe(&dir)
        .args(["clean", "-i"])
        .arg(&input)
        .arg("-o")
        .arg(&output)
        .arg("--constraints")
        .arg(&constraints)
        .args(["--outliers", "AMT"])
        .assert()
        .success();

    let cleaned = creditpipe::pipeline::load_dataset(&output).unwrap();
    assert_eq!(cleaned.height(), 5);
    assert_eq!(cleaned.column("AMT").unwrap().null_count(), 1);
}

#[test]
fn test_search_writes_report() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("train.csv");
    let grid = dir.path().join("grid.json");
    let report = dir.path().join("report").join("search.json");

    write_csv(&input, &mut create_classification_dataframe(120));
    std::fs::write(&grid, r#"{"learning_rate": [0.1, 0.5], "max_iter": [100, 200]}"#).unwrap();

    creditpipe(&dir)
        .args(["search", "-t", "TARGET", "-i"])
        .arg(&input)
        .arg("--grid")
        .arg(&grid)
        .arg("-o")
        .arg(&report)
        .assert()
        .success();

    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&report).unwrap()).unwrap();
    assert_eq!(json["metadata"]["target_column"], "TARGET");
    assert_eq!(json["metadata"]["estimator"], "LogisticRegression");
    let score = json["best_score"].as_f64().unwrap();
    assert!((0.0..=1.0).contains(&score));
    assert!(json["holdout"]["roc_auc_score"].as_f64().unwrap() > 0.9);
}

#[test]
fn test_profile_exports_json() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("data.csv");
    let plots = dir.path().join("plots.json");
    write_csv(&input, &mut create_classification_dataframe(30));

    creditpipe(&dir)
        .args(["profile", "--categorical", "TARGET", "--pca", "2", "-i"])
        .arg(&input)
        .arg("--json")
        .arg(&plots)
        .assert()
        .success()
        .stdout(predicate::str::contains("Empty Values"));

    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&plots).unwrap()).unwrap();
    assert_eq!(json["pca"]["components"].as_array().unwrap().len(), 2);
    assert_eq!(json["box_statistics"].as_array().unwrap().len(), 6);
}
