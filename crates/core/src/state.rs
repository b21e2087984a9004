// SPDX-License-Identifier: MIT

//! Controller run lifecycle state machine.
//!
//! Transitions are guarded by a fixed allowed-edge table. Invalid transitions
//! return [`InvalidTransition`]; callers log and drop them — they are a
//! debugging signal, never a runtime failure.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Lifecycle state of a controller run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControllerState {
    Init,
    RunningGlobalSetup,
    RunningWorkloads,
    RunningGlobalTeardown,
    Finished,
    StopArmed,
    StoppingInterruptSetup,
    StoppingWaitRunners,
    StoppingTeardown,
    StoppingInterruptTeardown,
    StopFailed,
    Aborted,
    Failed,
}

crate::simple_display! {
    ControllerState {
        Init => "init",
        RunningGlobalSetup => "running_global_setup",
        RunningWorkloads => "running_workloads",
        RunningGlobalTeardown => "running_global_teardown",
        Finished => "finished",
        StopArmed => "stop_armed",
        StoppingInterruptSetup => "stopping_interrupt_setup",
        StoppingWaitRunners => "stopping_wait_runners",
        StoppingTeardown => "stopping_teardown",
        StoppingInterruptTeardown => "stopping_interrupt_teardown",
        StopFailed => "stop_failed",
        Aborted => "aborted",
        Failed => "failed",
    }
}

impl ControllerState {
    /// Terminal states: no further transitions are accepted.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Finished | Self::Failed | Self::Aborted | Self::StopFailed
        )
    }

    /// Whether provisioned nodes may be destroyed after a run ending here.
    /// Failed runs keep their nodes around for inspection.
    pub fn allows_cleanup(self) -> bool {
        matches!(self, Self::Finished | Self::Aborted)
    }

    /// Allowed successor states.
    ///
    /// `Init → Finished` exists only as a unit-test shortcut; real runs pass
    /// through `RunningGlobalSetup` or `RunningWorkloads`.
    fn successors(self) -> &'static [ControllerState] {
        use ControllerState::*;
        match self {
            Init => &[RunningGlobalSetup, RunningWorkloads, Finished],
            RunningGlobalSetup => &[
                RunningWorkloads,
                RunningGlobalTeardown,
                StopArmed,
                StoppingInterruptSetup,
                Failed,
            ],
            RunningWorkloads => &[
                RunningGlobalTeardown,
                StopArmed,
                StoppingWaitRunners,
                Failed,
            ],
            RunningGlobalTeardown => &[
                Finished,
                Failed,
                StopArmed,
                StoppingTeardown,
                StoppingInterruptTeardown,
                Aborted,
            ],
            StopArmed => &[
                StoppingInterruptSetup,
                StoppingWaitRunners,
                StoppingTeardown,
                StoppingInterruptTeardown,
                Aborted,
                StopFailed,
                Failed,
            ],
            StoppingInterruptSetup => &[StoppingTeardown, Aborted, StopFailed],
            StoppingWaitRunners => &[StoppingTeardown, StopFailed, Aborted],
            StoppingTeardown => &[StoppingInterruptTeardown, Aborted, StopFailed],
            StoppingInterruptTeardown => &[Aborted, StopFailed],
            Finished | Failed | Aborted | StopFailed => &[],
        }
    }
}

/// Rejected edge outside the transition table.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid controller transition: {from} -> {to}")]
pub struct InvalidTransition {
    pub from: ControllerState,
    pub to: ControllerState,
}

/// Thread-safe lifecycle FSM. One instance per run; all transitions route
/// through it.
pub struct ControllerStateMachine {
    state: Mutex<ControllerState>,
}

impl ControllerStateMachine {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ControllerState::Init),
        }
    }

    /// Snapshot of the current state.
    pub fn state(&self) -> ControllerState {
        *self.state.lock()
    }

    /// Attempt a transition. The state is unchanged when the edge is
    /// rejected.
    pub fn transition(
        &self,
        to: ControllerState,
        reason: Option<&str>,
    ) -> Result<(), InvalidTransition> {
        let mut state = self.state.lock();
        let from = *state;
        if from == to {
            return Ok(());
        }
        if !from.successors().contains(&to) {
            return Err(InvalidTransition { from, to });
        }
        *state = to;
        tracing::debug!(%from, %to, reason = reason.unwrap_or(""), "controller transition");
        Ok(())
    }

    /// Attempt a transition, logging and swallowing rejections.
    pub fn transition_or_log(&self, to: ControllerState, reason: Option<&str>) {
        if let Err(err) = self.transition(to, reason) {
            tracing::debug!(%err, "invalid transition ignored");
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.state().is_terminal()
    }

    pub fn allows_cleanup(&self) -> bool {
        self.state().allows_cleanup()
    }
}

impl Default for ControllerStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
