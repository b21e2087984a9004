// SPDX-License-Identifier: MIT

//! Binary-level specs: exit codes and an end-to-end run driven through the
//! process executor with stub scripts.

use assert_cmd::Command;
use serial_test::serial;
use std::path::Path;

fn fleetbench() -> Command {
    let mut cmd = Command::cargo_bin("fleetbench").expect("binary");
    cmd.env("LB_HEADLESS_UI", "1");
    cmd.env_remove("LB_CONFIG_PATH");
    cmd
}

fn write_script(dir: &Path, name: &str, body: &str) {
    std::fs::write(dir.join(name), format!("#!/bin/sh\n{body}")).expect("script");
}

/// A config whose scripts run locally through `sh`.
fn write_stub_project(dir: &Path, run_body: &str, stop_secs: f64) -> std::path::PathBuf {
    let scripts = dir.join("scripts");
    std::fs::create_dir_all(&scripts).expect("scripts dir");
    write_script(&scripts, "setup.sh", "exit 0\n");
    write_script(&scripts, "run.sh", run_body);
    write_script(&scripts, "collect.sh", "exit 0\n");
    write_script(&scripts, "teardown.sh", "exit 0\n");

    let config_path = dir.join("config.toml");
    let body = format!(
        r#"
repetitions = 1
output_root = "{out}"
report_root = "{reports}"
data_export_root = "{exports}"
hosts = [{{ name = "h1", address = "127.0.0.1" }}]

[workloads.cpu]
plugin = "p"

[remote_execution]
setup_script = "{scripts}/setup.sh"
run_script = "{scripts}/run.sh"
collect_script = "{scripts}/collect.sh"
teardown_script = "{scripts}/teardown.sh"
workdir = "{workdir}"

[timeouts]
stop_secs = {stop_secs}
"#,
        out = dir.join("out").display(),
        reports = dir.join("reports").display(),
        exports = dir.join("exports").display(),
        scripts = scripts.display(),
        workdir = dir.join("workdir").display(),
    );
    std::fs::write(&config_path, body).expect("config");
    config_path
}

fn journal_for(dir: &Path) -> (std::path::PathBuf, serde_json::Value) {
    let out = dir.join("out");
    let run_dir = std::fs::read_dir(&out)
        .expect("output root")
        .flatten()
        .map(|e| e.path())
        .find(|p| p.is_dir())
        .expect("run dir");
    let path = run_dir.join("run_journal.json");
    let journal: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).expect("journal")).expect("json");
    (path, journal)
}

#[test]
fn no_arguments_is_a_usage_error() {
    fleetbench().assert().failure().code(2);
}

#[test]
fn unknown_flag_is_a_usage_error() {
    fleetbench().args(["run", "--frobnicate"]).assert().failure().code(2);
}

#[test]
fn invalid_intensity_is_a_usage_error() {
    fleetbench()
        .args(["run", "--intensity", "extreme", "--skip-connectivity-check"])
        .assert()
        .failure()
        .code(2);
}

#[test]
fn missing_config_file_fails() {
    fleetbench()
        .args(["run", "--config", "/nonexistent/bench.toml", "--skip-connectivity-check"])
        .assert()
        .failure()
        .code(1);
}

#[test]
#[serial]
fn end_to_end_run_completes_journal() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = write_stub_project(
        dir.path(),
        concat!(
            "echo 'LB_EVENT {\"host\":\"h1\",\"workload\":\"cpu\",\"repetition\":1,",
            "\"status\":\"running\",\"message\":\"starting\"}'\n",
            "echo 'LB_EVENT {\"host\":\"h1\",\"workload\":\"cpu\",\"repetition\":1,",
            "\"status\":\"done\"}'\n",
            "exit 0\n"
        ),
        30.0,
    );

    fleetbench()
        .args(["run", "--config"])
        .arg(&config)
        .arg("--skip-connectivity-check")
        .assert()
        .success();

    let (path, journal) = journal_for(dir.path());
    assert_eq!(journal["metadata"]["controller_state"], "finished");
    let tasks = journal["tasks"].as_array().expect("tasks");
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0]["status"], "COMPLETED");
    // The run directory carries the rest of the layout.
    let run_dir = path.parent().expect("run dir");
    assert!(run_dir.join("run.log").is_file());
    assert!(run_dir.join("h1").is_dir());
}

#[test]
#[serial]
fn resume_after_completion_short_circuits() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = write_stub_project(dir.path(), "exit 0\n", 30.0);

    fleetbench()
        .args(["run", "--config"])
        .arg(&config)
        .args(["--run-id", "run-20260101-000000", "--skip-connectivity-check"])
        .assert()
        .success();

    // Nothing pending: the resume exits successfully without dispatching.
    fleetbench()
        .args(["resume", "run-20260101-000000", "--config"])
        .arg(&config)
        .arg("--skip-connectivity-check")
        .assert()
        .success();
}

#[test]
#[serial]
fn stop_file_drop_ends_in_stop_failed() {
    let dir = tempfile::tempdir().expect("tempdir");
    let stop_file = dir.path().join("STOP");
    // The workload drops the stop sentinel and dies; nobody ever confirms,
    // so the stop protocol times out.
    let config = write_stub_project(
        dir.path(),
        &format!("touch {}\nexit 1\n", stop_file.display()),
        0.2,
    );

    fleetbench()
        .args(["run", "--config"])
        .arg(&config)
        .args(["--skip-connectivity-check", "--stop-file"])
        .arg(&stop_file)
        .assert()
        .failure()
        .code(1);

    let (_, journal) = journal_for(dir.path());
    assert_eq!(journal["metadata"]["controller_state"], "stop_failed");
    let tasks = journal["tasks"].as_array().expect("tasks");
    assert_eq!(tasks[0]["status"], "FAILED");
}
