// SPDX-License-Identifier: MIT

//! Application-facade specs: resume validation at the top level.

use fleetbench::{App, AppError, RunHooks, RunRequest};
use fleetbench_core::{ControllerState, RunId};
use fleetbench_journal::{JournalError, RunJournal};
use std::path::Path;
use std::sync::Arc;

struct QuietHooks;

impl RunHooks for QuietHooks {
    fn on_status(&self, _state: ControllerState, _reason: Option<&str>) {}
    fn on_warning(&self, _message: &str) {}
    fn on_info(&self, _message: &str) {}
    fn on_event_line(&self, _line: &str, _source: &str) {}
}

fn write_config(dir: &Path, repetitions: u32) -> std::path::PathBuf {
    let path = dir.join("config.toml");
    let body = format!(
        r#"
repetitions = {repetitions}
output_root = "{out}"
report_root = "{reports}"
data_export_root = "{exports}"
hosts = [{{ name = "h1", address = "127.0.0.1" }}]

[workloads.cpu]
plugin = "p"
"#,
        out = dir.join("out").display(),
        reports = dir.join("reports").display(),
        exports = dir.join("exports").display(),
    );
    std::fs::write(&path, body).expect("config");
    path
}

#[test]
fn app_refuses_resume_when_hash_differs_and_dump_is_gone() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config_path = write_config(dir.path(), 1);

    // The journal on disk was written by a different configuration, and its
    // dump has been stripped, so rehydration cannot reconcile.
    let old_config = fleetbench_core::RunConfig::load(&write_config(dir.path(), 3)).expect("old");
    let journal = RunJournal::initialize(
        RunId::new("run-20260101-000000"),
        &old_config,
        &["cpu".to_string()],
        0.0,
    );
    let journal_path = dir
        .path()
        .join("out")
        .join("run-20260101-000000")
        .join("run_journal.json");
    journal.save(&journal_path).expect("save");
    let mut raw: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&journal_path).expect("read")).expect("json");
    raw["metadata"]["config_dump"] = serde_json::Value::Null;
    std::fs::write(&journal_path, raw.to_string()).expect("write");

    // Restore the current config file (write_config reused the same path).
    write_config(dir.path(), 1);

    let app = App::new(Arc::new(QuietHooks));
    let request = RunRequest {
        config_path: Some(config_path),
        resume: Some("run-20260101-000000".to_string()),
        skip_connectivity_check: true,
        ..RunRequest::default()
    };
    let err = app.start_run(request).expect_err("resume must be refused");
    match err {
        AppError::Journal(JournalError::ResumeMismatch {
            journal_hash,
            config_hash,
        }) => {
            assert_ne!(journal_hash, config_hash);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn app_rejects_run_id_that_contradicts_resume_journal() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config_path = write_config(dir.path(), 1);
    let config = fleetbench_core::RunConfig::load(&config_path).expect("config");
    let journal = RunJournal::initialize(
        RunId::new("run-20260101-000000"),
        &config,
        &["cpu".to_string()],
        0.0,
    );
    let journal_path = dir
        .path()
        .join("out")
        .join("run-20260101-000000")
        .join("run_journal.json");
    journal.save(&journal_path).expect("save");

    let app = App::new(Arc::new(QuietHooks));
    let request = RunRequest {
        config_path: Some(config_path),
        run_id: Some(RunId::new("run-20990101-000000")),
        resume: Some("run-20260101-000000".to_string()),
        skip_connectivity_check: true,
        ..RunRequest::default()
    };
    let err = app.start_run(request).expect_err("id mismatch");
    assert!(matches!(err, AppError::RunIdMismatch { .. }));
}
