// SPDX-License-Identifier: MIT

//! Run sequencing specs: happy path, resume, resume validation.

use crate::prelude::*;
use fleetbench_core::{ControllerState, RunId};
use fleetbench_journal::{RunJournal, TaskStatus, TaskUpdate};

#[test]
fn happy_path_single_host_single_workload_two_reps() {
    let scenario = Scenario::new(&["h"], &["w"], 2);
    let session = scenario.session(&["w"]);
    let summary = scenario.orchestrator().run(&session, false).expect("run");

    assert!(summary.success);
    assert_eq!(summary.controller_state, ControllerState::Finished);
    for phase in ["setup_global", "setup_w", "run_w", "collect_w", "teardown_w", "teardown_global"] {
        let result = &summary.phases[phase];
        assert!(
            result.success(),
            "phase {phase} did not succeed: {result:?}"
        );
    }
    session.journal.with(|journal| {
        assert_eq!(journal.task_count(), 2);
        for rep in 1..=2 {
            let task = journal.get_task("h", "w", rep).expect("task");
            assert_eq!(task.status, TaskStatus::Completed);
            // Terminal tasks carry consistent timing.
            assert!(task.started_at.expect("started") <= task.finished_at.expect("finished"));
            assert!(task.duration_seconds.expect("duration") >= 0.0);
        }
    });
}

#[test]
fn resume_skips_completed_repetitions() {
    let scenario = Scenario::new(&["h"], &["w"], 2);

    let mut journal = RunJournal::initialize(
        RunId::new(RUN_ID),
        &scenario.config,
        &["w".to_string()],
        0.0,
    );
    journal.update_task("h", "w", 1, TaskUpdate::status(TaskStatus::Completed), 1.0);
    let journal_path = scenario
        .config
        .output_root
        .join(RUN_ID)
        .join("run_journal.json");
    let tests = ["w".to_string()];
    let session = fleetbench_engine::SessionBuilder::new(&scenario.config)
        .build(&tests, None, Some((journal, journal_path)))
        .expect("session");

    let summary = scenario.orchestrator().run(&session, true).expect("run");
    assert!(summary.success);

    // The run script was dispatched exactly once, with only rep 2 pending.
    let run_calls = scenario.executor.calls_for("run.sh");
    assert_eq!(run_calls.len(), 1);
    assert_eq!(
        run_calls[0].extravars["pending_repetitions"],
        serde_json::json!({"h": [2]})
    );

    session.journal.with(|journal| {
        assert_eq!(journal.get_task("h", "w", 1).expect("rep1").status, TaskStatus::Completed);
        assert_eq!(journal.get_task("h", "w", 2).expect("rep2").status, TaskStatus::Completed);
    });
}

#[test]
fn resume_fails_on_config_hash_mismatch_without_dump() {
    let scenario = Scenario::new(&["h"], &["w"], 2);
    let journal = RunJournal::initialize(
        RunId::new(RUN_ID),
        &scenario.config,
        &["w".to_string()],
        0.0,
    );
    let journal_path = scenario
        .config
        .output_root
        .join(RUN_ID)
        .join("run_journal.json");
    journal.save(&journal_path).expect("save");

    // Strip the stored dump and change the config, so neither validation nor
    // rehydration can reconcile.
    let mut raw: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&journal_path).expect("read")).expect("json");
    raw["metadata"]["config_dump"] = serde_json::Value::Null;
    std::fs::write(&journal_path, raw.to_string()).expect("write");

    let mut changed = scenario.config.clone();
    changed.hosts[0].address = "10.1.1.1".to_string();

    let err = RunJournal::load(&journal_path, Some(&changed)).expect_err("must fail");
    match err {
        fleetbench_journal::JournalError::ResumeMismatch {
            journal_hash,
            config_hash,
        } => {
            assert_eq!(journal_hash, scenario.config.config_hash());
            assert_eq!(config_hash, changed.config_hash());
        }
        other => panic!("unexpected error: {other}"),
    }
    // And the app-level resume path refuses the same way.
    let loaded = RunJournal::load(&journal_path, None).expect("load without validation");
    assert!(loaded.rehydrate_config().is_none());
    // No task was ever dispatched.
    assert!(scenario.executor.calls().is_empty());
}

#[test]
fn journal_save_load_roundtrip_after_run() {
    let scenario = Scenario::new(&["h1", "h2"], &["w"], 2);
    let session = scenario.session(&["w"]);
    scenario.orchestrator().run(&session, false).expect("run");

    let on_disk = RunJournal::load(session.journal.path(), None).expect("load");
    assert_eq!(on_disk, session.journal.snapshot());
    assert_eq!(on_disk.metadata.controller_state, "finished");
}
