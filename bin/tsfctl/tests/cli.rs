//! ---
//! tsf_section: "05-networking-external-interfaces"
//! tsf_subsection: "binary"
//! tsf_type: "source"
//! tsf_scope: "code"
//! tsf_description: "Operator CLI for inspecting TSF configuration."
//! tsf_version: "v0.0.0-prealpha"
//! tsf_owner: "tbd"
//! ---
use std::fs;
use std::path::Path;

use assert_cmd::Command;
use serde_json::Value;
use tempfile::TempDir;

const SNAPSHOT: &str = r#"{
  "tables": [
    {
      "name": "ActiveMeasurements",
      "columns": ["ID", "PointTag", "SignalType"],
      "rows": [
        ["PPA:1", "SUB1:FREQ", "FREQ"],
        ["PPA:2", "SUB1:VPHM", "VPHM"],
        ["PPA:3", "SUB2:FREQ", "FREQ"]
      ]
    },
    {
      "name": "OutputAdapters",
      "columns": ["ID", "AdapterName", "TypeName", "ConnectionString"],
      "rows": [[1, "archive", "Archive", ""], [2, "display", "Display", ""]]
    },
    {
      "name": "TemporalSupport",
      "columns": ["Source", "ID"],
      "rows": [["OutputAdapters", 1]]
    }
  ]
}"#;

fn tsfctl() -> Command {
    let mut cmd = Command::cargo_bin("tsfctl").unwrap();
    cmd.env("TSF_LOG", "error").env_remove("TSF_CONFIG");
    cmd
}

fn write_snapshot(dir: &Path) -> String {
    let path = dir.join("snapshot.json");
    fs::write(&path, SNAPSHOT).unwrap();
    path.display().to_string()
}

fn stdout_json(output: std::process::Output) -> Value {
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    serde_json::from_slice(&output.stdout).unwrap()
}

#[test]
fn relative_time_tags_resolve_against_reference() {
    let output = tsfctl()
        .args(["parse-time-tag", "*-20s", "--now", "2024-03-01T12:00:00Z"])
        .output()
        .unwrap();
    assert!(output.status.success());
    assert_eq!(
        String::from_utf8_lossy(&output.stdout).trim(),
        "2024-03-01T11:59:40.000Z"
    );
}

#[test]
fn malformed_time_tag_fails() {
    tsfctl().args(["parse-time-tag", "*-20q"]).assert().failure();
}

#[test]
fn select_filters_and_sorts_rows() {
    let dir = TempDir::new().unwrap();
    let snapshot = write_snapshot(dir.path());
    let output = tsfctl()
        .args([
            "select",
            "--snapshot",
            &snapshot,
            "--filter",
            "SignalType = 'FREQ'",
            "--sort",
            "PointTag DESC",
        ])
        .output()
        .unwrap();
    let rows = stdout_json(output);
    let tags: Vec<&str> = rows
        .as_array()
        .unwrap()
        .iter()
        .map(|row| row["PointTag"].as_str().unwrap())
        .collect();
    assert_eq!(tags, ["SUB2:FREQ", "SUB1:FREQ"]);
}

#[test]
fn select_rejects_unknown_columns() {
    let dir = TempDir::new().unwrap();
    let snapshot = write_snapshot(dir.path());
    tsfctl()
        .args(["select", "--snapshot", &snapshot, "--filter", "Missing = 1"])
        .assert()
        .failure();
}

#[test]
fn extract_temporal_keeps_supported_adapters() {
    let dir = TempDir::new().unwrap();
    let snapshot = write_snapshot(dir.path());
    let target = dir.path().join("temporal.json");
    tsfctl()
        .args(["extract-temporal", "--snapshot", &snapshot, "--output"])
        .arg(&target)
        .assert()
        .success();

    let reduced: Value = serde_json::from_str(&fs::read_to_string(&target).unwrap()).unwrap();
    let outputs = reduced["tables"]
        .as_array()
        .unwrap()
        .iter()
        .find(|table| table["name"] == "OutputAdapters")
        .unwrap();
    assert_eq!(outputs["rows"].as_array().unwrap().len(), 1);
    assert_eq!(outputs["rows"][0][1], "archive");
}

#[test]
fn validate_config_reports_thresholds() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("tsf.toml");
    fs::write(
        &config,
        "[session]\nname = \"edge\"\nmeasurement_warning_threshold = 10\nmeasurement_dumping_threshold = 40\n",
    )
    .unwrap();
    let output = tsfctl()
        .args(["validate-config", "--config"])
        .arg(&config)
        .output()
        .unwrap();
    let summary = stdout_json(output);
    assert_eq!(summary["session"], "edge");
    assert_eq!(summary["measurement_dumping_threshold"], 40);
    assert_eq!(summary["use_measurement_routing"], true);
}

#[test]
fn validate_config_rejects_inverted_thresholds() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("tsf.toml");
    fs::write(
        &config,
        "[session]\nmeasurement_warning_threshold = 50\nmeasurement_dumping_threshold = 40\n",
    )
    .unwrap();
    tsfctl()
        .args(["validate-config", "--config"])
        .arg(&config)
        .assert()
        .failure();
}
