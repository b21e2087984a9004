// SPDX-License-Identifier: MIT

use super::*;
use fleetbench_core::{EventKind, EventStatus};
use yare::parameterized;

fn coordinator(hosts: &[&str], timeout: Duration) -> StopCoordinator {
    StopCoordinator::new(
        hosts.iter().map(|h| h.to_string()),
        timeout,
        RunId::new("run-x"),
    )
}

fn event(host: &str, status: EventStatus) -> RunEvent {
    RunEvent {
        run_id: "run-x".to_string(),
        host: host.to_string(),
        workload: "cpu".to_string(),
        repetition: 1,
        total_repetitions: 1,
        status,
        message: String::new(),
        kind: EventKind::Status,
        level: "INFO".to_string(),
        error_type: None,
        error_context: None,
        timestamp: 0.0,
    }
}

#[test]
fn starts_idle() {
    let c = coordinator(&["h1"], Duration::from_secs(30));
    assert_eq!(c.state(), StopState::Idle);
    assert!(!c.can_proceed_to_teardown());
}

#[test]
fn events_before_initiate_are_ignored() {
    let c = coordinator(&["h1"], Duration::from_secs(30));
    c.process_event(&event("h1", EventStatus::Stopped));
    assert_eq!(c.state(), StopState::Idle);
}

#[test]
fn all_confirmations_reach_teardown_ready() {
    let c = coordinator(&["h1", "h2"], Duration::from_secs(30));
    c.initiate_stop();
    c.process_event(&event("h1", EventStatus::Stopped));
    assert_eq!(c.state(), StopState::StoppingWorkloads);
    assert_eq!(c.missing_runners(), vec!["h2".to_string()]);
    c.process_event(&event("h2", EventStatus::Failed));
    assert_eq!(c.state(), StopState::TeardownReady);
    assert!(c.can_proceed_to_teardown());
}

#[parameterized(
    stopped = { EventStatus::Stopped, true },
    failed = { EventStatus::Failed, true },
    cancelled = { EventStatus::Cancelled, true },
    done = { EventStatus::Done, true },
    running = { EventStatus::Running, false },
)]
fn confirmation_statuses(status: EventStatus, confirms: bool) {
    let c = coordinator(&["h1"], Duration::from_secs(30));
    c.initiate_stop();
    c.process_event(&event("h1", status));
    assert_eq!(c.state() == StopState::TeardownReady, confirms);
}

#[test]
fn duplicate_confirmations_are_idempotent() {
    let c = coordinator(&["h1", "h2"], Duration::from_secs(30));
    c.initiate_stop();
    c.process_event(&event("h1", EventStatus::Stopped));
    c.process_event(&event("h1", EventStatus::Done));
    assert_eq!(c.state(), StopState::StoppingWorkloads);
}

#[test]
fn foreign_run_and_unknown_host_are_ignored() {
    let c = coordinator(&["h1"], Duration::from_secs(30));
    c.initiate_stop();
    let mut foreign = event("h1", EventStatus::Stopped);
    foreign.run_id = "run-other".to_string();
    c.process_event(&foreign);
    c.process_event(&event("h9", EventStatus::Stopped));
    assert_eq!(c.state(), StopState::StoppingWorkloads);
}

#[test]
fn event_without_run_id_still_counts() {
    let c = coordinator(&["h1"], Duration::from_secs(30));
    c.initiate_stop();
    let mut anonymous = event("h1", EventStatus::Stopped);
    anonymous.run_id = String::new();
    c.process_event(&anonymous);
    assert_eq!(c.state(), StopState::TeardownReady);
}

#[test]
fn initiate_stop_is_idempotent() {
    let c = coordinator(&["h1"], Duration::from_secs(30));
    c.initiate_stop();
    c.process_event(&event("h1", EventStatus::Stopped));
    c.initiate_stop();
    assert_eq!(c.state(), StopState::TeardownReady);
}

#[test]
fn zero_timeout_trips_stop_failed() {
    let c = coordinator(&["h1"], Duration::ZERO);
    c.initiate_stop();
    std::thread::sleep(Duration::from_millis(2));
    c.check_timeout();
    assert_eq!(c.state(), StopState::StopFailed);
    // Late confirmations are no longer recorded.
    c.process_event(&event("h1", EventStatus::Stopped));
    assert_eq!(c.state(), StopState::StopFailed);
}

#[test]
fn check_timeout_before_initiate_is_noop() {
    let c = coordinator(&["h1"], Duration::ZERO);
    c.check_timeout();
    assert_eq!(c.state(), StopState::Idle);
}
