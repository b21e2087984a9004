// SPDX-License-Identifier: MIT

use super::*;

#[test]
fn initial_state_is_running() {
    let sm = DoubleInterrupt::new();
    assert_eq!(sm.state(), InterruptState::Running);
}

#[test]
fn inactive_run_delegates() {
    let sm = DoubleInterrupt::new();
    assert_eq!(sm.on_signal(false), SigintDecision::Delegate);
    assert_eq!(sm.state(), InterruptState::Running);
}

#[test]
fn first_press_arms_stop() {
    let sm = DoubleInterrupt::new();
    assert_eq!(sm.on_signal(true), SigintDecision::WarnArm);
    assert_eq!(sm.state(), InterruptState::StopArmed);
}

#[test]
fn second_press_requests_stop() {
    let sm = DoubleInterrupt::new();
    sm.on_signal(true);
    assert_eq!(sm.on_signal(true), SigintDecision::RequestStop);
    assert_eq!(sm.state(), InterruptState::Stopping);
}

#[test]
fn third_press_is_ignored() {
    let sm = DoubleInterrupt::new();
    sm.on_signal(true);
    sm.on_signal(true);
    assert_eq!(sm.on_signal(true), SigintDecision::Ignore);
    assert_eq!(sm.state(), InterruptState::Stopping);
}

#[test]
fn finished_run_delegates_signals() {
    let sm = DoubleInterrupt::new();
    sm.mark_finished();
    assert_eq!(sm.state(), InterruptState::Finished);
    assert_eq!(sm.on_signal(true), SigintDecision::Delegate);
}

#[test]
fn expired_arm_returns_to_running() {
    let sm = DoubleInterrupt::new();
    sm.on_signal(true);
    sm.reset_arm();
    assert_eq!(sm.state(), InterruptState::Running);
    // The next press re-arms rather than stopping.
    assert_eq!(sm.on_signal(true), SigintDecision::WarnArm);
}

#[test]
fn reset_arm_does_not_touch_stopping() {
    let sm = DoubleInterrupt::new();
    sm.on_signal(true);
    sm.on_signal(true);
    sm.reset_arm();
    assert_eq!(sm.state(), InterruptState::Stopping);
}
