//! CLI tests for gc-core: commands, formats and exit codes.

mod common;

use assert_cmd::Command;
use common::{write_artifacts, write_rates};
use predicates::prelude::*;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Get a Command for gc-core binary.
fn gc_core() -> Command {
    let mut cmd = Command::cargo_bin("gc-core").expect("gc-core binary should exist");
    cmd.env_remove("GC_CONFIG")
        .env_remove("GC_CONFIG_DIR")
        .env_remove("GC_LOG")
        .env_remove("GC_LOG_FORMAT")
        .env_remove("RUST_LOG");
    cmd
}

/// Artifact tree plus a config file applying a uniform signal efficiency.
fn workspace(energy_bins: usize, zenith_bins: usize) -> (TempDir, PathBuf) {
    let dir = TempDir::new().unwrap();
    let root = dir.path().join("artifacts");
    write_artifacts(&root, energy_bins, zenith_bins);
    let config = write_config(
        dir.path(),
        serde_json::json!({
            "artifacts": {"root": root, "energy_bins": energy_bins, "zenith_bins": zenith_bins},
            "policy": {"default": {"signal_efficiency": 0.5}}
        }),
    );
    (dir, config)
}

fn write_config(dir: &Path, value: serde_json::Value) -> PathBuf {
    let path = dir.join("gamma_cuts.json");
    std::fs::write(&path, serde_json::to_string_pretty(&value).unwrap()).unwrap();
    path
}

// ============================================================================
// Version and help
// ============================================================================

mod version {
    use super::*;

    #[test]
    fn json_version_lists_schema_versions() {
        gc_core()
            .args(["version", "--format", "json"])
            .assert()
            .success()
            .stdout(predicate::str::contains("config_schema_version"))
            .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
    }

    #[test]
    fn summary_version_is_one_line() {
        gc_core()
            .args(["version", "-f", "summary"])
            .assert()
            .success()
            .stdout(predicate::str::starts_with("gc-core "));
    }

    #[test]
    fn unknown_subcommand_fails() {
        gc_core().arg("train").assert().failure();
    }
}

// ============================================================================
// resolve
// ============================================================================

mod resolve {
    use super::*;

    #[test]
    fn prints_bin_records_in_envelope() {
        let (_dir, config) = workspace(3, 2);
        let output = gc_core()
            .args(["resolve", "--config"])
            .arg(&config)
            .output()
            .unwrap();
        assert!(output.status.success());
        let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
        assert_eq!(value["command"], "resolve");
        let bins = value["result"]["bins"].as_array().unwrap();
        assert_eq!(bins.len(), 6);
        assert_eq!(bins[0]["provenance"], "signal_efficiency");
        assert!(value["config_id"].is_string());
    }

    #[test]
    fn jsonl_prints_one_record_per_line() {
        let (_dir, config) = workspace(2, 1);
        let output = gc_core()
            .args(["resolve", "-f", "jsonl", "--config"])
            .arg(&config)
            .output()
            .unwrap();
        assert!(output.status.success());
        let stdout = String::from_utf8(output.stdout).unwrap();
        let lines: Vec<&str> = stdout.lines().collect();
        assert_eq!(lines.len(), 2);
        for line in lines {
            let record: serde_json::Value = serde_json::from_str(line).unwrap();
            assert!(record["threshold"].is_number());
        }
    }

    #[test]
    fn json_format_logs_jsonl_to_stderr() {
        let (_dir, config) = workspace(2, 1);
        gc_core()
            .args(["resolve", "--config"])
            .arg(&config)
            .assert()
            .success()
            .stderr(predicate::str::contains("\"event\":\"load.catalog_loaded\""));
    }

    #[test]
    fn artifacts_flag_overrides_config() {
        let (dir, config) = workspace(2, 1);
        let other = dir.path().join("other");
        write_artifacts(&other, 4, 1);
        let output = gc_core()
            .args(["resolve", "-f", "jsonl", "--config"])
            .arg(&config)
            .arg("--artifacts")
            .arg(&other)
            .output()
            .unwrap();
        assert!(output.status.success());
        // Declared grid still limits the load to two bins.
        assert_eq!(String::from_utf8(output.stdout).unwrap().lines().count(), 2);
    }

    #[test]
    fn optimization_without_rates_is_a_config_error() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("artifacts");
        write_artifacts(&root, 2, 1);
        let config = write_config(dir.path(), serde_json::json!({"artifacts": {"root": root}}));
        gc_core()
            .args(["resolve", "--config"])
            .arg(&config)
            .assert()
            .code(11);
    }

    #[test]
    fn optimization_with_rates_succeeds_or_reports_unresolved() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("artifacts");
        write_artifacts(&root, 3, 1);
        let rates = write_rates(dir.path(), 0.1, 0.03);
        let config = write_config(dir.path(), serde_json::json!({"artifacts": {"root": root}}));
        gc_core()
            .args(["resolve", "-f", "summary", "--config"])
            .arg(&config)
            .arg("--rates")
            .arg(&rates)
            .assert()
            .code(predicate::in_iter([0, 1]))
            .stdout(predicate::str::contains("3 optimized"));
    }

    #[test]
    fn missing_interior_artifact_is_a_catalog_error() {
        let (dir, config) = workspace(3, 1);
        std::fs::remove_dir_all(dir.path().join("artifacts").join("e1")).unwrap();
        gc_core()
            .args(["resolve", "--config"])
            .arg(&config)
            .assert()
            .code(12);
    }
}

// ============================================================================
// evaluate
// ============================================================================

mod evaluate {
    use super::*;

    const EVENTS: &str = concat!(
        "{\"event_id\": 1, \"energy_tev\": 2.0, \"zenith_deg\": 25.0, \"values\": {\"score\": 0.9}}\n",
        "{\"event_id\": 2, \"energy_tev\": 2.0, \"zenith_deg\": 25.0, \"values\": {\"score\": 0.1}}\n",
        "not json\n",
        "\n",
        "{\"event_id\": 3, \"energy_tev\": -1.0, \"zenith_deg\": 25.0}\n",
    );

    #[test]
    fn verdicts_stream_as_jsonl() {
        let (_dir, config) = workspace(3, 2);
        let output = gc_core()
            .args(["evaluate", "-f", "jsonl", "--config"])
            .arg(&config)
            .write_stdin(EVENTS)
            .output()
            .unwrap();
        assert!(output.status.success());
        let stdout = String::from_utf8(output.stdout).unwrap();
        let verdicts: Vec<serde_json::Value> = stdout
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(verdicts.len(), 3);
        assert_eq!(verdicts[0]["accepted"], true);
        assert_eq!(verdicts[1]["reason"], "below_threshold");
        assert_eq!(verdicts[2]["reason"], "non_positive_energy");

        let stderr = String::from_utf8(output.stderr).unwrap();
        assert!(stderr.contains("evaluate.event_malformed"));
    }

    #[test]
    fn json_output_includes_stats() {
        let (dir, config) = workspace(3, 2);
        let events = dir.path().join("events.jsonl");
        std::fs::write(&events, EVENTS).unwrap();
        let output = gc_core()
            .args(["evaluate", "--config"])
            .arg(&config)
            .arg(&events)
            .output()
            .unwrap();
        assert!(output.status.success());
        let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
        assert_eq!(value["result"]["stats"]["evaluated"], 3);
        assert_eq!(value["result"]["stats"]["accepted"], 1);
        assert_eq!(value["result"]["verdicts"].as_array().unwrap().len(), 3);
    }

    #[test]
    fn summary_counts_malformed_lines() {
        let (_dir, config) = workspace(3, 2);
        gc_core()
            .args(["evaluate", "-f", "summary", "--config"])
            .arg(&config)
            .write_stdin(EVENTS)
            .assert()
            .success()
            .stdout(predicate::str::contains("3 events: 1 accepted"))
            .stdout(predicate::str::contains("1 malformed"));
    }

    #[test]
    fn missing_event_file_is_an_io_error() {
        let (dir, config) = workspace(2, 1);
        gc_core()
            .args(["evaluate", "--config"])
            .arg(&config)
            .arg(dir.path().join("absent.jsonl"))
            .assert()
            .code(21);
    }
}

// ============================================================================
// check and schema
// ============================================================================

mod check {
    use super::*;

    #[test]
    fn healthy_workspace_passes() {
        let (_dir, config) = workspace(2, 2);
        gc_core()
            .args(["check", "--config"])
            .arg(&config)
            .assert()
            .success()
            .stdout(predicate::str::contains("\"status\": \"ok\""))
            .stdout(predicate::str::contains("\"settings_sha256\""))
            .stdout(predicate::str::contains("\"file_sha256\""));
    }

    #[test]
    fn missing_config_file_is_reported() {
        gc_core()
            .args(["check", "--config", "/nonexistent/gamma_cuts.json"])
            .assert()
            .code(11)
            .stdout(predicate::str::contains("not found"));
    }

    #[test]
    fn invalid_config_is_reported() {
        let dir = TempDir::new().unwrap();
        let config = write_config(dir.path(), serde_json::json!({"optimizer": {"alpha": -1.0}}));
        gc_core()
            .args(["check", "--config"])
            .arg(&config)
            .assert()
            .code(11);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn unwritable_stdout_is_an_io_error() {
        let (_dir, config) = workspace(2, 2);
        let full = std::fs::OpenOptions::new()
            .write(true)
            .open("/dev/full")
            .unwrap();
        let status = std::process::Command::new(assert_cmd::cargo::cargo_bin("gc-core"))
            .env_remove("GC_CONFIG")
            .env_remove("GC_CONFIG_DIR")
            .env_remove("GC_LOG")
            .env_remove("RUST_LOG")
            .args(["check", "--config"])
            .arg(&config)
            .stdout(full)
            .stderr(std::process::Stdio::null())
            .status()
            .unwrap();
        assert_eq!(status.code(), Some(21));
    }
}

mod schema {
    use super::*;

    #[test]
    fn list_names_types() {
        gc_core()
            .args(["schema", "--list"])
            .assert()
            .success()
            .stdout(predicate::str::contains("TrainingArtifact"))
            .stdout(predicate::str::contains("EventVerdict"));
    }

    #[test]
    fn named_schema_is_json() {
        let output = gc_core()
            .args(["schema", "BinRecord", "--compact"])
            .output()
            .unwrap();
        assert!(output.status.success());
        let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
        assert!(value["properties"]["provenance"].is_object());
    }

    #[test]
    fn unknown_schema_is_an_argument_error() {
        gc_core().args(["schema", "Nope"]).assert().code(10);
    }
}
