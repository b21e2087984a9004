// SPDX-License-Identifier: MIT

//! Event pipeline specs: multi-source ingest and deduplication.

use crate::prelude::*;
use fleetbench_core::{FakeClock, RunId};
use fleetbench_engine::{EventPipeline, JsonlTailer, OutputTee, StopCoordinator};
use fleetbench_journal::{EventLogSink, JournalHandle, RunJournal, TaskStatus};
use parking_lot::Mutex;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

struct PipelineFixture {
    pipeline: Arc<EventPipeline<FakeClock>>,
    journal: JournalHandle,
    lines: Arc<Mutex<Vec<String>>>,
    dir: tempfile::TempDir,
}

fn pipeline_fixture() -> PipelineFixture {
    let scenario = Scenario::new(&["h"], &["w"], 3);
    let dir = tempfile::tempdir().expect("tempdir");
    let journal = RunJournal::initialize(
        RunId::new(RUN_ID),
        &scenario.config,
        &["w".to_string()],
        0.0,
    );
    let handle = JournalHandle::new(journal, dir.path().join("run_journal.json"));
    let sink = EventLogSink::new(handle.clone(), Some(&dir.path().join("run.log"))).expect("sink");
    let coordinator = Arc::new(StopCoordinator::new(
        ["h".to_string()],
        Duration::from_secs(30),
        RunId::new(RUN_ID),
    ));
    let pipeline = Arc::new(EventPipeline::new(
        FakeClock::new(),
        RunId::new(RUN_ID),
        3,
        sink,
        coordinator,
    ));
    let lines = Arc::new(Mutex::new(Vec::new()));
    let sink_lines = lines.clone();
    pipeline.set_on_event(move |event, source| {
        sink_lines.lock().push(format!("{source}:{}", event.message));
    });
    PipelineFixture {
        pipeline,
        journal: handle,
        lines,
        dir,
    }
}

const MARKER_LINE: &str =
    r#"LB_EVENT {"host":"h","workload":"w","repetition":1,"status":"running","message":"starting"}"#;

#[test]
fn same_event_via_tail_and_stdout_lands_once() {
    let fixture = pipeline_fixture();

    // Source 1: the JSONL event log, tailed from disk.
    let event_log = fixture.dir.path().join("run_events.jsonl");
    std::fs::write(
        &event_log,
        r#"{"host":"h","workload":"w","repetition":1,"status":"running","message":"starting"}"#
            .to_string()
            + "\n",
    )
    .expect("write event log");
    let tail_pipeline = fixture.pipeline.clone();
    let tailer = JsonlTailer::start(&event_log, Duration::from_millis(5), move |payload| {
        tail_pipeline.accept_tailed_payload(&payload);
    });

    let deadline = std::time::Instant::now() + Duration::from_secs(2);
    while fixture.lines.lock().is_empty() && std::time::Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(5));
    }

    // Source 2: the same event scraped from stdout ~10 ms later.
    let tee_pipeline = fixture.pipeline.clone();
    let tee = OutputTee::new(None, move |line: &str| tee_pipeline.scan_stdout_line(line), None)
        .expect("tee");
    tee.write_chunk(MARKER_LINE);
    tee.write_chunk("\n");
    tailer.stop();

    // Exactly one journal write and one fan-out line.
    let journal_timestamps: Vec<f64> = fixture.journal.with(|journal| {
        journal
            .tasks()
            .filter(|t| t.status == TaskStatus::Running)
            .map(|t| t.timestamp)
            .collect()
    });
    assert_eq!(journal_timestamps.len(), 1);
    assert_eq!(fixture.lines.lock().len(), 1);
    assert!(fixture.lines.lock()[0].starts_with("tail:"));
}

#[test]
fn distinct_events_pass_through() {
    let fixture = pipeline_fixture();
    let tee_pipeline = fixture.pipeline.clone();
    let tee = OutputTee::new(None, move |line: &str| tee_pipeline.scan_stdout_line(line), None)
        .expect("tee");
    for rep in 1..=3 {
        tee.write_chunk(&format!(
            "LB_EVENT {{\"host\":\"h\",\"workload\":\"w\",\"repetition\":{rep},\"status\":\"done\"}}\n"
        ));
    }
    fixture.journal.with(|journal| {
        for rep in 1..=3 {
            assert_eq!(
                journal.get_task("h", "w", rep).expect("task").status,
                TaskStatus::Completed
            );
        }
    });
    assert_eq!(fixture.lines.lock().len(), 3);
}

#[test]
fn marker_split_across_chunks_is_reassembled() {
    let fixture = pipeline_fixture();
    let tee_pipeline = fixture.pipeline.clone();
    let tee = OutputTee::new(None, move |line: &str| tee_pipeline.scan_stdout_line(line), None)
        .expect("tee");
    let (head, tail) = MARKER_LINE.split_at(30);
    tee.write_chunk(head);
    tee.write_chunk(tail);
    tee.write_chunk("\n");
    fixture.journal.with(|journal| {
        assert_eq!(
            journal.get_task("h", "w", 1).expect("task").status,
            TaskStatus::Running
        );
    });
}

#[test]
fn run_log_receives_event_lines() {
    let fixture = pipeline_fixture();
    fixture
        .pipeline
        .ingest(&event("h", "w", 2, fleetbench_core::EventStatus::Done), "callback")
        .expect("ingest");
    let log = std::fs::read_to_string(fixture.dir.path().join("run.log")).expect("run.log");
    assert!(log.contains("h w rep 2/3 status=done"));
}

#[test]
fn tailed_log_appended_while_running_is_picked_up() {
    let fixture = pipeline_fixture();
    let event_log = fixture.dir.path().join("run_events.jsonl");
    std::fs::write(&event_log, "").expect("create");
    let tail_pipeline = fixture.pipeline.clone();
    let tailer = JsonlTailer::start(&event_log, Duration::from_millis(5), move |payload| {
        tail_pipeline.accept_tailed_payload(&payload);
    });

    let mut file = std::fs::File::options().append(true).open(&event_log).expect("open");
    for rep in 1..=2 {
        writeln!(
            file,
            "{{\"host\":\"h\",\"workload\":\"w\",\"repetition\":{rep},\"status\":\"running\"}}"
        )
        .expect("append");
    }
    drop(file);

    let deadline = std::time::Instant::now() + Duration::from_secs(2);
    while fixture.lines.lock().len() < 2 && std::time::Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(5));
    }
    tailer.stop();
    assert_eq!(fixture.lines.lock().len(), 2);
}
