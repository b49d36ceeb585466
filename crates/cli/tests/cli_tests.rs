//! CLI integration tests

use std::fs;
use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

fn rul(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_rul"))
        .args(args)
        .env_remove("RUL_CONFIG")
        .env("RUST_LOG", "warn")
        .output()
        .expect("Failed to execute command")
}

fn raw_line(unit: u32, cycle: u32, life: u32) -> String {
    let wear = cycle as f64 / life as f64;
    let mut tokens = vec![unit.to_string(), cycle.to_string()];
    for s in 0..24u32 {
        let value = match s % 3 {
            0 => 200.0 + 40.0 * wear + s as f64,
            1 => 8.0 - 2.0 * wear,
            _ => ((unit * 5 + cycle * 7 + s) % 6) as f64,
        };
        tokens.push(format!("{:.3}", value));
    }
    format!("{} ", tokens.join(" "))
}

/// Write a small dataset and a config pointing at it; returns the config path
fn write_project(dir: &Path) -> String {
    let mut train = String::new();
    for unit in 1..=4 {
        let life = 20 + unit * 4;
        for cycle in 1..=life {
            train.push_str(&raw_line(unit, cycle, life));
            train.push('\n');
        }
    }
    let mut test = String::new();
    for unit in 1..=3 {
        for cycle in 1..=(8 + unit) {
            test.push_str(&raw_line(unit, cycle, 30));
            test.push('\n');
        }
    }
    fs::write(dir.join("train.txt"), train).unwrap();
    fs::write(dir.join("test.txt"), test).unwrap();
    fs::write(dir.join("truth.txt"), "21\n20\n19\n").unwrap();

    let d = dir.display();
    let config = format!(
        r#"
[paths]
raw_train = "{d}/train.txt"
raw_test = "{d}/test.txt"
truth = "{d}/truth.txt"
train_with_rul = "{d}/out/train_with_rul.csv"
train_selected = "{d}/out/train_selected.csv"
test_selected = "{d}/out/test_selected.csv"
model_output = "{d}/out/model.json"

[selection]
top_n = 6
top_k = 3

[selection.importance_forest]
n_estimators = 4

[forest]
n_estimators = 6
max_depth = 6
"#
    );
    let path = dir.join("rul.toml");
    fs::write(&path, config).unwrap();
    path.display().to_string()
}

fn json(output: &Output) -> serde_json::Value {
    assert!(
        output.status.success(),
        "command failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("stdout is JSON")
}

/// Test that the CLI shows help
#[test]
fn test_cli_help() {
    let output = rul(&["--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI help should succeed");
    assert!(stdout.contains("Remaining Useful Life"), "Should show app description");
    for command in ["prepare", "select", "train", "evaluate", "predict", "inspect", "sample"] {
        assert!(stdout.contains(command), "Should show {} command", command);
    }
}

/// Test that the CLI shows version
#[test]
fn test_cli_version() {
    let output = rul(&["--version"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI version should succeed");
    assert!(stdout.contains("rul"), "Should show binary name");
}

#[test]
fn test_predict_help() {
    let output = rul(&["predict", "--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success());
    assert!(stdout.contains("--input"));
    assert!(stdout.contains("--feature"));
    assert!(stdout.contains("--emit-metrics"));
}

#[test]
fn test_predict_requires_input() {
    let dir = TempDir::new().unwrap();
    let config = write_project(dir.path());
    let output = rul(&["--config", &config, "predict"]);

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Nothing to predict"));
}

#[test]
fn test_missing_raw_input_fails() {
    let dir = TempDir::new().unwrap();
    let config = write_project(dir.path());
    fs::remove_file(dir.path().join("train.txt")).unwrap();

    let output = rul(&["--config", &config, "prepare"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("train.txt"));
}

#[test]
fn test_train_then_predict() {
    let dir = TempDir::new().unwrap();
    let config = write_project(dir.path());

    let trained = json(&rul(&["--config", &config, "--format", "json", "train"]));
    let features: Vec<String> = serde_json::from_value(trained["features"].clone()).unwrap();
    assert_eq!(features.len(), 3);
    assert_eq!(trained["units"].as_array().unwrap().len(), 3);
    assert!(trained["rmse"].as_f64().unwrap().is_finite());
    assert!(dir.path().join("out/model.json").exists());

    // One feature supplied, the others default to 0.0
    let feature_arg = format!("{}=1.0", features[0]);
    let predicted = json(&rul(&[
        "--config", &config, "--format", "json", "predict", "--feature", &feature_arg,
    ]));
    assert!(trained["run_id"].as_str().unwrap().starts_with("run-"));

    let first = &predicted.as_array().unwrap()[0];
    assert_eq!(first["input"], "manual");
    assert!(["urgent", "moderate", "healthy"].contains(&first["advice"].as_str().unwrap()));
    assert!(!first["advice_message"].as_str().unwrap().is_empty());
    assert_eq!(first["missing_features"].as_array().unwrap().len(), 2);

    // Sample file round-trips through predict
    let sample_path = dir.path().join("sample.csv");
    let sample = sample_path.display().to_string();
    json(&rul(&[
        "--config", &config, "--format", "json", "sample", "--output", &sample, "--rows", "3",
    ]));
    let predicted = json(&rul(&[
        "--config", &config, "--format", "json", "predict", "--input", &sample,
    ]));
    let rows = predicted.as_array().unwrap();
    assert_eq!(rows.len(), 3);
    assert!(rows.iter().all(|r| r["missing_features"].as_array().unwrap().is_empty()));

    let inspected = json(&rul(&["--config", &config, "--format", "json", "inspect"]));
    assert_eq!(inspected["feature_order"], trained["features"]);
    assert_eq!(inspected["checksum"], trained["checksum"]);

    let evaluated = json(&rul(&["--config", &config, "--format", "json", "evaluate"]));
    assert_eq!(evaluated["rmse"], trained["rmse"]);
}

#[test]
fn test_predict_csv_with_text_columns() {
    let dir = TempDir::new().unwrap();
    let config = write_project(dir.path());
    let trained = json(&rul(&["--config", &config, "--format", "json", "train"]));
    let features: Vec<String> = serde_json::from_value(trained["features"].clone()).unwrap();

    // Text id and timestamp columns around the features, one feature left empty
    let mut csv = format!("engine_id,{},recorded_at\n", features.join(","));
    csv.push_str(&format!("E-17,{},2024-05-01T10:00\n", vec!["1.5"; features.len()].join(",")));
    csv.push_str(&format!("E-18,,{},late shift\n", vec!["2.5"; features.len() - 1].join(",")));
    let input = dir.path().join("upload.csv");
    fs::write(&input, csv).unwrap();

    let predicted = json(&rul(&[
        "--config",
        &config,
        "--format",
        "json",
        "predict",
        "--input",
        &input.display().to_string(),
    ]));
    let rows = predicted.as_array().unwrap();
    assert_eq!(rows.len(), 2);
    assert!(rows[0]["missing_features"].as_array().unwrap().is_empty());
    assert_eq!(rows[1]["missing_features"], serde_json::json!([features[0].clone()]));
}

#[test]
fn test_predict_advice_follows_configured_thresholds() {
    let dir = TempDir::new().unwrap();
    let config = write_project(dir.path());
    json(&rul(&["--config", &config, "--format", "json", "train"]));

    // Every prediction is non-negative, so a zero urgent cutoff and a huge
    // moderate cutoff make everything moderate
    let output = Command::new(env!("CARGO_BIN_EXE_rul"))
        .args(["--config", &config, "--format", "json", "predict", "--feature", "sensor_1=3.0"])
        .env("RUST_LOG", "warn")
        .env("RUL_MAINTENANCE__URGENT_BELOW", "0")
        .env("RUL_MAINTENANCE__MODERATE_BELOW", "100000")
        .output()
        .expect("Failed to execute command");
    let predicted = json(&output);
    assert_eq!(predicted[0]["advice"], "moderate");
}

#[test]
fn test_predict_emits_metrics() {
    let dir = TempDir::new().unwrap();
    let config = write_project(dir.path());
    json(&rul(&["--config", &config, "--format", "json", "train"]));

    let output = rul(&[
        "--config", &config, "predict", "--feature", "sensor_1=3.0", "--emit-metrics",
    ]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("rul_rows_predicted_total 1"));
    assert!(stdout.contains("total_predictions=1"));
}
