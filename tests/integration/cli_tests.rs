//! CLI integration tests

use std::io::Write;
use std::process::{Command, Output};

fn hub_utils() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_hub-utils"));
    for (key, _) in std::env::vars() {
        if key.starts_with("HUB_") || key == "RUST_LOG" {
            cmd.env_remove(key);
        }
    }
    cmd
}

fn run(cmd: &mut Command) -> (String, String, bool) {
    let Output { stdout, stderr, status } = cmd.output().expect("failed to run hub-utils");
    (
        String::from_utf8_lossy(&stdout).to_string(),
        String::from_utf8_lossy(&stderr).to_string(),
        status.success(),
    )
}

#[test]
fn test_lcm_command() {
    let (stdout, _, success) = run(hub_utils().args(["lcm", "4", "6"]));
    assert!(success);
    assert_eq!(stdout.trim(), "12");

    let (_, stderr, success) = run(hub_utils().args(["lcm", "4", "0"]));
    assert!(!success);
    assert!(stderr.contains("Invalid input"), "stderr: {stderr}");
}

#[test]
fn test_batch_command() {
    let (stdout, _, success) = run(hub_utils().args(["batch", "--size", "2", "a", "b", "c", "d", "e"]));
    assert!(success);
    assert_eq!(stdout.lines().collect::<Vec<_>>(), vec!["a b", "c d", "e"]);

    let (stdout, _, success) = run(hub_utils().args(["batch", "--size", "3"]));
    assert!(success);
    assert!(stdout.is_empty());
}

#[test]
fn test_shape_command() {
    let (stdout, _, success) = run(hub_utils().args(["shape", "[3, null, 7]"]));
    assert!(success);
    assert_eq!(stdout.trim(), "(3, None, 7)");

    let (stdout, _, success) = run(hub_utils().args(["shape", "null"]));
    assert!(success);
    assert_eq!(stdout.trim(), "(None,)");

    let (_, stderr, success) = run(hub_utils().args(["shape", "\"x\""]));
    assert!(!success);
    assert!(stderr.contains("Type mismatch"), "stderr: {stderr}");
}

#[test]
fn test_cache_command() {
    let (stdout, _, success) = run(hub_utils().args(["cache", "null"]));
    assert!(success);
    assert_eq!(stdout.trim(), "0");

    let (_, stderr, success) = run(hub_utils().args(["cache", "\"5\""]));
    assert!(!success);
    assert!(stderr.contains("Type mismatch"), "stderr: {stderr}");
}

#[test]
fn test_probe_command_json() {
    let home = tempfile::tempdir().unwrap();
    let (stdout, stderr, success) = run(hub_utils()
        .args(["probe", "--json", "--only", "azure,hub"])
        .env("HOME", home.path())
        .env("ACCOUNT_KEY", "key")
        .env_remove("ACTIVELOOP_HUB_PASSWORD"));
    assert!(success, "stderr: {stderr}");

    let report: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    let results = report["results"].as_array().unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0]["name"], "azure");
    assert_eq!(results[0]["available"], true);
    assert_eq!(results[1]["name"], "hub");
    assert_eq!(results[1]["available"], false);
}

#[test]
fn test_config_layers() {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    writeln!(file, "[probes]\npython = \"python3.12\"\n\n[batch]\ndefault_size = 2").unwrap();

    let (stdout, stderr, success) = run(hub_utils()
        .arg("--config")
        .arg(file.path())
        .arg("config")
        .env("HUB_BATCH__DEFAULT_SIZE", "5"));
    assert!(success, "stderr: {stderr}");
    assert!(stdout.contains("python: python3.12"), "stdout: {stdout}");
    assert!(stdout.contains("default_size: 5"), "stdout: {stdout}");
}

#[test]
fn test_disabled_list_from_environment() {
    let (stdout, stderr, success) = run(hub_utils()
        .arg("config")
        .env("HUB_PROBES__DISABLED", "ray,dask"));
    assert!(success, "stderr: {stderr}");

    let settings: serde_yaml::Value = serde_yaml::from_str(&stdout).unwrap();
    let disabled: Vec<&str> = settings["probes"]["disabled"]
        .as_sequence()
        .unwrap()
        .iter()
        .filter_map(|v| v.as_str())
        .collect();
    assert_eq!(disabled, vec!["ray", "dask"]);
}

#[test]
fn test_timing_goes_to_stderr() {
    let (stdout, stderr, success) = run(hub_utils().args(["--timing", "lcm", "3"]));
    assert!(success);
    assert_eq!(stdout.trim(), "3");
    assert!(stderr.contains("hub-utils lcm: "), "stderr: {stderr}");
}
