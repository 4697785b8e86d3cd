//! CLI subprocess integration tests.
//!
//! These tests invoke the `plumb` binary as a subprocess and verify
//! exit codes, stdout content, and JSON output shape.

use std::path::{Path, PathBuf};
use std::process::Command;

fn plumb_bin() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_plumb"));
    cmd.env_remove("PLUMB_LOG");
    cmd
}

fn write_config(dir: &Path, content: &str) -> PathBuf {
    let path = dir.join("plumb.toml");
    std::fs::write(&path, content).unwrap();
    path
}

// Settles and reclaims on the first poll so runs finish without sleeping.
const FAST_PXD: &str = r#"
config_version = 1

[driver]
name = "pxd"
provisioner = "csi"

[driver.credentials]
token = "secret"

[validation.volumes]
timeout_secs = 2
retry_interval_secs = 1

[validation.app_ready]
timeout_secs = 2
retry_interval_secs = 1

[validation.cleanup]
timeout_secs = 2
retry_interval_secs = 1

[cluster]
settle_polls = 0
reclaim_polls = 0
storage_nodes = ["10.0.0.1"]

[[apps]]
name = "mysql"
namespace = "mysql-ns"
claims = ["mysql-data"]

[[apps]]
name = "redis"
namespace = "cache"
claims = ["redis-data"]
"#;

#[test]
fn cli_version_exits_zero() {
    let output = plumb_bin().arg("--version").output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("plumb"), "version output: {stdout}");
}

#[test]
fn cli_help_lists_commands() {
    let output = plumb_bin().arg("--help").output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    for cmd in ["drivers", "resolve", "check", "run", "completions", "man-pages"] {
        assert!(stdout.contains(cmd), "help should mention '{cmd}': {stdout}");
    }
}

#[test]
fn cli_drivers_json_lists_builtins() {
    let output = plumb_bin().args(["drivers", "--json"]).output().unwrap();
    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let names: Vec<&str> = json
        .as_array()
        .unwrap()
        .iter()
        .map(|d| d["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, ["linstor", "ocp", "pso", "pxd"]);
}

#[test]
fn cli_resolve_alias_to_driver() {
    let output = plumb_bin()
        .args(["resolve", "csi", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["driver"], "pxd");
    assert_eq!(json["storage_provisioner"], "pxd.portworx.com");
}

#[test]
fn cli_resolve_unknown_exits_driver_error() {
    let output = plumb_bin().args(["resolve", "nfs"]).output().unwrap();
    assert_eq!(output.status.code(), Some(3));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("nfs"), "stderr: {stderr}");
}

#[test]
fn cli_resolve_falls_back_to_default() {
    let output = plumb_bin()
        .args(["resolve", "nfs", "--default-provisioner", "pso", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["driver"], "pso");
    assert_eq!(json["provisioner_type"], "pso");
    assert_eq!(json["storage_provisioner"], "pure-csi");
}

#[test]
fn cli_check_valid_config() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(dir.path(), FAST_PXD);
    let output = plumb_bin()
        .args(["check", path.to_str().unwrap(), "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["driver"], "pxd");
    assert_eq!(json["apps"].as_array().unwrap().len(), 2);
    assert_eq!(json["apps"][0]["app"], "mysql-ns/mysql");
}

#[test]
fn cli_check_invalid_config_exits_config_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(dir.path(), "config_version = 1\n[driver]\nname = \"\"\n");
    let output = plumb_bin()
        .args(["check", path.to_str().unwrap()])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn cli_check_missing_config_exits_config_error() {
    let dir = tempfile::tempdir().unwrap();
    let output = plumb_bin()
        .args(["check", dir.path().join("absent.toml").to_str().unwrap()])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn cli_run_passing_scenarios() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(dir.path(), FAST_PXD);
    let output = plumb_bin()
        .args(["run", path.to_str().unwrap(), "--workers", "2", "--json"])
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let reports = json.as_array().unwrap();
    assert_eq!(reports.len(), 2);
    assert_eq!(reports[0]["app"], "mysql-ns/mysql");
    assert_eq!(reports[1]["app"], "cache/redis");
    for report in reports {
        assert_eq!(report["status"], "succeeded");
        assert_eq!(report["state"], "Destroyed");
    }
}

#[test]
fn cli_run_linstor_without_controllers_exits_driver_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(
        dir.path(),
        r#"
config_version = 1

[driver]
name = "linstor"

[[apps]]
name = "pg"
namespace = "db"
claims = ["pg-data"]
"#,
    );
    let output = plumb_bin()
        .args(["run", path.to_str().unwrap()])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(3));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("controllers"), "stderr: {stderr}");
}

#[test]
fn cli_run_unsettled_volumes_exits_failure() {
    let dir = tempfile::tempdir().unwrap();
    let config = FAST_PXD
        .replace("settle_polls = 0", "settle_polls = 5")
        .replace(
            "[validation.volumes]\ntimeout_secs = 2",
            "[validation.volumes]\ntimeout_secs = 0",
        );
    let path = write_config(dir.path(), &config);
    let output = plumb_bin()
        .args(["run", path.to_str().unwrap(), "--json"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let report = &json[0];
    assert_ne!(report["status"], "succeeded");
    assert_eq!(report["outcomes"][0]["name"], "volumes");
    assert_eq!(report["outcomes"][0]["attempts"], 1);
}

#[test]
fn cli_completions_bash() {
    let output = plumb_bin().args(["completions", "bash"]).output().unwrap();
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("plumb"));
}

#[test]
fn cli_man_pages_written() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("man");
    let output = plumb_bin()
        .args(["man-pages", out.to_str().unwrap()])
        .output()
        .unwrap();
    assert!(output.status.success());
    assert!(out.join("plumb.1").exists());
    assert!(out.join("plumb-run.1").exists());
}
