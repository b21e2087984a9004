// SPDX-License-Identifier: MIT

//! Two-press interrupt state machine.
//!
//! The first SIGINT during an active run arms the stop and warns the
//! operator; the second confirms it. The armed state expires after a TTL
//! (driven by the caller via [`DoubleInterrupt::reset_arm`]) so a single
//! accidental press never shuts a run down.

use parking_lot::Mutex;

/// Interrupt-handling state for one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterruptState {
    Running,
    StopArmed,
    Stopping,
    Finished,
}

crate::simple_display! {
    InterruptState {
        Running => "running",
        StopArmed => "stop_armed",
        Stopping => "stopping",
        Finished => "finished",
    }
}

/// What the signal handler should do with an incoming SIGINT.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SigintDecision {
    /// Forward to the previously installed handler.
    Delegate,
    /// Warn the operator and arm the stop.
    WarnArm,
    /// Second press: request the cooperative stop.
    RequestStop,
    /// Already stopping; a third press is not a force-kill escalation.
    Ignore,
}

/// Decision state machine behind the double-interrupt handler.
pub struct DoubleInterrupt {
    state: Mutex<InterruptState>,
}

impl DoubleInterrupt {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(InterruptState::Running),
        }
    }

    pub fn state(&self) -> InterruptState {
        *self.state.lock()
    }

    /// Route one SIGINT. `run_active` reflects whether the controller is
    /// still in a non-terminal state.
    pub fn on_signal(&self, run_active: bool) -> SigintDecision {
        let mut state = self.state.lock();
        match *state {
            InterruptState::Finished => SigintDecision::Delegate,
            _ if !run_active => SigintDecision::Delegate,
            InterruptState::Running => {
                *state = InterruptState::StopArmed;
                SigintDecision::WarnArm
            }
            InterruptState::StopArmed => {
                *state = InterruptState::Stopping;
                SigintDecision::RequestStop
            }
            InterruptState::Stopping => SigintDecision::Ignore,
        }
    }

    /// Clear an expired arm. No-op unless currently armed.
    pub fn reset_arm(&self) {
        let mut state = self.state.lock();
        if *state == InterruptState::StopArmed {
            *state = InterruptState::Running;
        }
    }

    /// Mark the run finished; subsequent signals delegate.
    pub fn mark_finished(&self) {
        *self.state.lock() = InterruptState::Finished;
    }
}

impl Default for DoubleInterrupt {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "interrupt_tests.rs"]
mod tests;
