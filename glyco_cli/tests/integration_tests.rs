//! Integration tests for the glyco binary.
//!
//! These tests verify end-to-end behavior including:
//! - Manual readings, meals and doses
//! - Alerts printed for out-of-range readings
//! - Summary, export and compaction
//! - Persistence across invocations

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// Helper to create a test data directory
fn setup_test_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp dir")
}

/// CLI pointed at `data_dir`, isolated from the user's config
fn cli(data_dir: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("glyco"));
    cmd.env("XDG_CONFIG_HOME", data_dir.join("config"))
        .env_remove("RUST_LOG")
        .arg("--data-dir")
        .arg(data_dir);
    cmd
}

fn journal_lines(data_dir: &Path) -> Vec<serde_json::Value> {
    let contents = fs::read_to_string(data_dir.join("journal/events.wal")).unwrap_or_default();
    contents
        .lines()
        .map(|line| serde_json::from_str(line).expect("journal line should be valid JSON"))
        .collect()
}

#[test]
fn test_cli_help() {
    Command::new(assert_cmd::cargo::cargo_bin!("glyco"))
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Glucose monitoring and alerting"));
}

#[test]
fn test_reading_logged_to_journal() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path();

    cli(data_dir)
        .args(["reading", "--value", "123", "--trend", "up", "--note", "after coffee"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Reading logged: 123 mg/dL ↑"))
        .stdout(predicate::str::contains("ALERT").not());

    let events = journal_lines(data_dir);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0]["type"], "reading");
    assert_eq!(events[0]["value"], 123);
    assert_eq!(events[0]["trend"], "up");
    assert_eq!(events[0]["note"], "after coffee");
}

#[test]
fn test_low_reading_prints_critical_alert() {
    let temp_dir = setup_test_dir();

    cli(temp_dir.path())
        .args(["reading", "--value", "62", "--trend", "down"])
        .assert()
        .success()
        .stdout(predicate::str::contains("CRITICAL ALERT"))
        .stdout(predicate::str::contains("62 mg/dL"));
}

#[test]
fn test_out_of_range_reading_rejected() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path();

    cli(data_dir)
        .args(["reading", "--value", "500"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("reading must be within [40, 400]"));

    assert!(!data_dir.join("journal/events.wal").exists());
}

#[test]
fn test_unknown_trend_rejected() {
    let temp_dir = setup_test_dir();

    cli(temp_dir.path())
        .args(["reading", "--value", "100", "--trend", "sideways"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown trend"));
}

#[test]
fn test_meal_with_and_without_macros() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path();

    cli(data_dir)
        .args(["meal", "--description", "pasta", "--carbs", "60", "--protein", "15", "--fat", "12"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Meal logged: pasta (60 g carbs)"));

    cli(data_dir)
        .args(["meal", "--description", "apple"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Meal logged: apple (0 g carbs)"));

    // Macros come as a set
    cli(data_dir)
        .args(["meal", "--description", "toast", "--carbs", "20"])
        .assert()
        .failure();

    let events = journal_lines(data_dir);
    assert_eq!(events.len(), 2);
    assert_eq!(events[0]["macros"]["carbs"], 60.0);
    assert!(events[1]["macros"].is_null());
}

#[test]
fn test_dose_then_iob() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path();

    cli(data_dir)
        .args(["dose", "--kind", "bolus", "--units", "3"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Dose logged: 3.0 U bolus"));

    // Basal doses are recorded but do not count towards IOB
    cli(data_dir)
        .args(["dose", "--kind", "basal", "--units", "12"])
        .assert()
        .success();

    cli(data_dir)
        .arg("iob")
        .assert()
        .success()
        .stdout(predicate::str::contains("Insulin on board: 3.00 U"));
}

#[test]
fn test_zero_unit_dose_rejected() {
    let temp_dir = setup_test_dir();

    cli(temp_dir.path())
        .args(["dose", "--kind", "bolus", "--units", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("dose units must be positive"));
}

#[test]
fn test_summary_over_logged_readings() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path();

    for value in ["70", "100", "190"] {
        cli(data_dir).args(["reading", "--value", value]).assert().success();
    }

    cli(data_dir)
        .args(["summary", "--days", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Readings:          3"))
        .stdout(predicate::str::contains("Average BGL:       120 mg/dL"))
        .stdout(predicate::str::contains("Time in range:     67%"))
        .stdout(predicate::str::contains("Time above range:  33%"))
        .stdout(predicate::str::contains("Time below range:  0%"));
}

#[test]
fn test_latest_on_empty_data_dir() {
    let temp_dir = setup_test_dir();

    cli(temp_dir.path())
        .arg("latest")
        .assert()
        .success()
        .stdout(predicate::str::contains("Reading: none"))
        .stdout(predicate::str::contains("Meal:    none"))
        .stdout(predicate::str::contains("Dose:    none"));
}

#[test]
fn test_simulate_backfills_readings() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path();

    cli(data_dir)
        .args(["simulate", "--cycles", "12", "--seed", "7"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Simulated 12 readings"));

    let events = journal_lines(data_dir);
    assert_eq!(events.len(), 12);
    for event in &events {
        let value = event["value"].as_u64().unwrap();
        assert!((40..=400).contains(&value));
    }

    cli(data_dir)
        .arg("summary")
        .assert()
        .success()
        .stdout(predicate::str::contains("Readings:          12"));
}

#[test]
fn test_simulate_ignores_readings_after_backfill_start() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path();

    cli(data_dir).args(["reading", "--value", "400"]).assert().success();

    cli(data_dir)
        .args(["simulate", "--cycles", "2", "--seed", "3"])
        .assert()
        .success();

    // The first backfilled reading predates the 400 and starts from the
    // configured initial value (120) instead
    let events = journal_lines(data_dir);
    assert_eq!(events.len(), 3);
    let first_simulated = events[1]["value"].as_u64().unwrap();
    assert!(
        (110..=130).contains(&first_simulated),
        "expected a value near 120, got {}",
        first_simulated
    );
}

#[test]
fn test_export_writes_csv() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path();
    let out = data_dir.join("reports/readings.csv");

    for value in ["95", "150"] {
        cli(data_dir).args(["reading", "--value", value]).assert().success();
    }

    cli(data_dir)
        .arg("export")
        .arg("--out")
        .arg(&out)
        .assert()
        .success()
        .stdout(predicate::str::contains("Exported 2 readings"));

    let csv_content = fs::read_to_string(&out).expect("Failed to read CSV");
    assert!(csv_content.starts_with("id,timestamp,value_mg_dl,trend,insulin_on_board,note"));
    assert_eq!(csv_content.lines().count(), 3);
}

#[test]
fn test_compact_folds_journal_into_snapshot() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path();

    cli(data_dir).args(["reading", "--value", "111"]).assert().success();
    cli(data_dir)
        .args(["meal", "--description", "salad"])
        .assert()
        .success();

    cli(data_dir)
        .args(["compact", "--cleanup"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Compacted 2 events"))
        .stdout(predicate::str::contains("Cleaned up 1 processed journal"));

    assert!(data_dir.join("snapshot.json").exists());
    assert!(!data_dir.join("journal/events.wal").exists());

    // Data survives through the snapshot alone
    cli(data_dir)
        .arg("latest")
        .assert()
        .success()
        .stdout(predicate::str::contains("Reading: 111 mg/dL"))
        .stdout(predicate::str::contains("Meal:    salad"));
}

#[test]
fn test_empty_compact() {
    let temp_dir = setup_test_dir();

    cli(temp_dir.path())
        .arg("compact")
        .assert()
        .success()
        .stdout(predicate::str::contains("nothing to compact"));
}

#[test]
fn test_retention_bound_from_config() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path();
    let config_path = data_dir.join("glyco.toml");
    fs::write(&config_path, "[store]\nmax_readings = 2\n").unwrap();

    for value in ["101", "102", "103"] {
        cli(data_dir)
            .arg("--config")
            .arg(&config_path)
            .args(["reading", "--value", value])
            .assert()
            .success();
    }

    cli(data_dir)
        .arg("--config")
        .arg(&config_path)
        .arg("summary")
        .assert()
        .success()
        .stdout(predicate::str::contains("Readings:          2"));
}
