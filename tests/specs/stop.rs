// SPDX-License-Identifier: MIT

//! Stop protocol specs: double-interrupt grace, confirmation collection,
//! timeout handling.

use crate::prelude::*;
use fleetbench_core::{
    ControllerState, ControllerStateMachine, DoubleInterrupt, EventStatus, SigintDecision,
};
use fleetbench_engine::ControllerRunner;
use fleetbench_journal::TaskStatus;
use std::sync::Arc;
use std::time::Duration;

#[test]
fn double_interrupt_graceful_stop_ends_aborted() {
    let scenario = Scenario::new(&["h1", "h2"], &["w"], 1);
    let session = scenario.session(&["w"]);

    // Two interrupts ≥50 ms apart while the workload runs; both runners
    // confirm the stop within the timeout.
    let interrupt = Arc::new(DoubleInterrupt::new());
    let stop_token = scenario.stop_token.clone();
    let coordinator = session.coordinator.clone();
    let confirm_h1 = event("h1", "w", 1, EventStatus::Stopped);
    let confirm_h2 = event("h2", "w", 1, EventStatus::Stopped);
    let signal_machine = interrupt.clone();
    scenario.executor.set_on_call(move |_, request| {
        let script = request.script.to_string_lossy().to_string();
        if script.contains("scripts/run.sh") {
            assert_eq!(signal_machine.on_signal(true), SigintDecision::WarnArm);
            std::thread::sleep(Duration::from_millis(50));
            assert_eq!(signal_machine.on_signal(true), SigintDecision::RequestStop);
            stop_token.request_stop();
        }
        if script.contains("stop_request.sh") {
            coordinator.process_event(&confirm_h1);
            coordinator.process_event(&confirm_h2);
        }
    });
    scenario
        .executor
        .set_result_for("scripts/run.sh", fleetbench_adapters::ExecutionResult::stopped());

    let summary = scenario.orchestrator().run(&session, false).expect("run");

    assert_eq!(summary.controller_state, ControllerState::Aborted);
    assert!(!summary.success);
    assert!(summary.cleanup_allowed);
    // Teardown ran non-cancellable.
    let teardown = scenario.executor.calls_for("scripts/teardown.sh");
    assert_eq!(teardown.len(), 1);
    assert!(!teardown[0].cancellable);
    // Tasks that were running failed with the stop reason.
    session.journal.with(|journal| {
        for host in ["h1", "h2"] {
            let task = journal.get_task(host, "w", 1).expect("task");
            assert_eq!(task.status, TaskStatus::Failed);
        }
    });
}

#[test]
fn stop_timeout_ends_stop_failed_and_keeps_nodes() {
    let mut scenario = Scenario::new(&["h1", "h2"], &["w"], 1);
    scenario.config.timeouts.stop_secs = 0.05;
    let stop_token = scenario.stop_token.clone();
    scenario
        .executor
        .set_result_for("scripts/run.sh", fleetbench_adapters::ExecutionResult::stopped());
    scenario.executor.set_on_call(move |_, request| {
        if request.script.to_string_lossy().contains("scripts/run.sh") {
            stop_token.request_stop();
        }
    });

    let session = scenario.session(&["w"]);
    let summary = scenario.orchestrator().run(&session, false).expect("run");

    assert_eq!(summary.controller_state, ControllerState::StopFailed);
    assert!(!summary.success);
    assert!(!summary.cleanup_allowed);
    // Teardown is still attempted.
    assert_eq!(scenario.executor.calls_for("scripts/teardown.sh").len(), 1);
    assert!(!summary.phases["stop_protocol"].success());
}

#[test]
fn arm_expiry_never_issues_a_stop() {
    // A single press followed by TTL expiry leaves the run untouched.
    let interrupt = DoubleInterrupt::new();
    assert_eq!(interrupt.on_signal(true), SigintDecision::WarnArm);
    interrupt.reset_arm();
    assert_eq!(interrupt.state(), fleetbench_core::InterruptState::Running);

    let scenario = Scenario::new(&["h"], &["w"], 1);
    let session = scenario.session(&["w"]);
    let summary = scenario.orchestrator().run(&session, false).expect("run");
    assert_eq!(summary.controller_state, ControllerState::Finished);
    assert!(summary.success);
}

#[test]
fn runner_supervision_sees_stop_requested_mid_run() {
    let scenario = Scenario::new(&["h"], &["w"], 1);
    let session = Arc::new(scenario.session(&["w"]));
    let machine = session.state_machine.clone();
    let coordinator = session.coordinator.clone();
    let confirm = event("h", "w", 1, EventStatus::Stopped);
    let blocking_token = scenario.stop_token.clone();
    scenario.executor.set_on_call(move |_, request| {
        let script = request.script.to_string_lossy().to_string();
        if script.contains("scripts/run.sh") {
            // The workload keeps running until the stop lands.
            let deadline = std::time::Instant::now() + Duration::from_secs(2);
            while !blocking_token.should_stop() && std::time::Instant::now() < deadline {
                std::thread::sleep(Duration::from_millis(5));
            }
        }
        if script.contains("stop_request.sh") {
            coordinator.process_event(&confirm);
        }
    });
    scenario
        .executor
        .set_result_for("scripts/run.sh", fleetbench_adapters::ExecutionResult::stopped());

    let orchestrator = scenario.orchestrator();
    let run_session = session.clone();
    let runner = ControllerRunner::new(
        move || orchestrator.run(&run_session, false),
        machine,
        scenario.stop_token.clone(),
    );
    runner.start();
    // The operator confirms a stop shortly after launch.
    std::thread::sleep(Duration::from_millis(20));
    runner.arm_stop("User requested stop");

    let summary = loop {
        if let Some(summary) = runner.wait(Duration::from_millis(200)).expect("wait") {
            break summary;
        }
    };
    runner.join();
    assert_eq!(summary.controller_state, ControllerState::Aborted);
    assert!(session.state_machine.is_terminal());
}

#[test]
fn state_machine_rejections_do_not_corrupt_state() {
    // A rejected edge leaves the observable state
    // unchanged and the run can continue normally afterwards.
    let machine = ControllerStateMachine::new();
    machine
        .transition(ControllerState::RunningWorkloads, None)
        .expect("valid edge");
    let before = machine.state();
    assert!(machine
        .transition(ControllerState::StoppingInterruptTeardown, None)
        .is_err());
    assert_eq!(machine.state(), before);
    machine
        .transition(ControllerState::RunningGlobalTeardown, None)
        .expect("still valid");
}
