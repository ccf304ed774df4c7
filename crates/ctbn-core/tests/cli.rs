//! CLI tests for ctbn-cluster.
//!
//! These tests verify exit codes and output shapes of the `demo` and
//! `check-config` commands.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

/// Get a Command for the ctbn-cluster binary.
fn ctbn_cluster() -> Command {
    let mut cmd = Command::cargo_bin("ctbn-cluster").expect("ctbn-cluster binary should exist");
    cmd.env_remove("CTBN_LOG")
        .env_remove("RUST_LOG")
        .env_remove("CTBN_LOG_FORMAT");
    cmd
}

fn write_config(dir: &TempDir, name: &str, body: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, body).expect("write config");
    path
}

const VALID_CONFIG: &str = r#"{
    "schema_version": "1.0.0",
    "description": "small test run",
    "priors": { "mxx_prior": 1.0, "tx_prior": 0.005, "px_prior": 1.0 },
    "stop": { "max_iteration": 20, "changed_bound": 0.05 },
    "seed": 11
}"#;

// ============================================================================
// check-config
// ============================================================================

mod check_config {
    use super::*;

    #[test]
    fn valid_file_is_echoed() {
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, "valid.json", VALID_CONFIG);
        ctbn_cluster()
            .arg("check-config")
            .arg(&path)
            .assert()
            .success()
            .stdout(predicate::str::contains("\"valid\": true"))
            .stdout(predicate::str::contains("\"max_iteration\": 20"));
    }

    #[test]
    fn negative_prior_is_a_config_error() {
        let dir = TempDir::new().unwrap();
        let body = VALID_CONFIG.replace("\"mxx_prior\": 1.0", "\"mxx_prior\": -1.0");
        let path = write_config(&dir, "negative.json", &body);
        ctbn_cluster()
            .arg("check-config")
            .arg(&path)
            .assert()
            .code(11)
            .stderr(predicate::str::contains("mxx_prior"));
    }

    #[test]
    fn wrong_schema_version_is_a_config_error() {
        let dir = TempDir::new().unwrap();
        let body = VALID_CONFIG.replace("1.0.0", "0.9.0");
        let path = write_config(&dir, "old.json", &body);
        ctbn_cluster().arg("check-config").arg(&path).assert().code(11);
    }

    #[test]
    fn malformed_json_is_a_config_error() {
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, "broken.json", "{ \"priors\": ");
        ctbn_cluster().arg("check-config").arg(&path).assert().code(11);
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let dir = TempDir::new().unwrap();
        ctbn_cluster()
            .arg("check-config")
            .arg(dir.path().join("absent.json"))
            .assert()
            .code(21);
    }

    #[test]
    fn jsonl_format_prints_structured_error() {
        let dir = TempDir::new().unwrap();
        ctbn_cluster()
            .args(["--log-format", "jsonl", "check-config"])
            .arg(dir.path().join("absent.json"))
            .assert()
            .code(21)
            .stderr(predicate::str::contains("\"code\""));
    }
}

// ============================================================================
// demo
// ============================================================================

mod demo {
    use super::*;

    #[test]
    fn seeded_soft_run_reports_iterations() {
        let output = ctbn_cluster()
            .args(["--log-level", "off", "demo", "--trajectories", "80", "--seed", "4"])
            .output()
            .expect("run demo");
        assert!(output.status.success());
        let report: serde_json::Value =
            serde_json::from_slice(&output.stdout).expect("report is JSON");
        assert_eq!(report["mode"], "soft");
        assert_eq!(report["trajectories"], 80);
        let iterations = report["iterations"].as_u64().expect("iterations");
        assert!((1..=101).contains(&iterations));
        let sizes: u64 = report["cluster_sizes"]
            .as_array()
            .expect("cluster sizes")
            .iter()
            .filter_map(|v| v.as_u64())
            .sum();
        assert_eq!(sizes, 80);
        let agreement = report["label_agreement"].as_f64().expect("agreement");
        assert!((0.5..=1.0).contains(&agreement));
    }

    #[test]
    fn hard_run_with_config_file() {
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir, "run.json", VALID_CONFIG);
        ctbn_cluster()
            .args(["--log-level", "off", "demo", "--trajectories", "40", "--hard", "--config"])
            .arg(&path)
            .assert()
            .success()
            .stdout(predicate::str::contains("\"mode\": \"hard\""))
            .stdout(predicate::str::contains("\"seed\": 11"));
    }

    #[test]
    fn zero_trajectories_is_an_argument_error() {
        ctbn_cluster()
            .args(["demo", "--trajectories", "0"])
            .assert()
            .code(10);
    }

    #[test]
    fn invalid_stop_bound_is_a_config_error() {
        ctbn_cluster()
            .args(["demo", "--trajectories", "10", "--changed-bound", "2.0"])
            .assert()
            .code(11);
    }

    #[test]
    fn unknown_flag_fails() {
        ctbn_cluster()
            .args(["demo", "--nonexistent-flag"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("error"));
    }
}
