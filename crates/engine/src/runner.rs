// SPDX-License-Identifier: MIT

//! Worker-thread driver for the orchestrator.
//!
//! The caller (main thread) keeps signal handling and UI pumping to itself;
//! the run executes on a worker and the caller polls [`ControllerRunner::wait`]
//! with a short timeout. Unexpected errors are trapped here, the lifecycle is
//! transitioned to FAILED/ABORTED, and the error is re-raised to the caller.

use crate::orchestrator::OrchestratorError;
use crate::summary::RunSummary;
use fleetbench_core::{ControllerState, ControllerStateMachine, StopToken};
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::time::Duration;

type RunTask = Box<dyn FnOnce() -> Result<RunSummary, OrchestratorError> + Send + 'static>;
type StateChangeHook = Arc<dyn Fn(ControllerState, Option<&str>) + Send + Sync>;

#[derive(Default)]
struct Slot {
    finished: bool,
    summary: Option<RunSummary>,
    error: Option<OrchestratorError>,
}

pub struct ControllerRunner {
    state_machine: Arc<ControllerStateMachine>,
    stop_token: Arc<StopToken>,
    on_state_change: Option<StateChangeHook>,
    slot: Arc<(Mutex<Slot>, Condvar)>,
    task: Mutex<Option<RunTask>>,
    thread: Mutex<Option<std::thread::JoinHandle<()>>>,
}

impl ControllerRunner {
    pub fn new(
        task: impl FnOnce() -> Result<RunSummary, OrchestratorError> + Send + 'static,
        state_machine: Arc<ControllerStateMachine>,
        stop_token: Arc<StopToken>,
    ) -> Self {
        Self {
            state_machine,
            stop_token,
            on_state_change: None,
            slot: Arc::new((Mutex::new(Slot::default()), Condvar::new())),
            task: Mutex::new(Some(Box::new(task))),
            thread: Mutex::new(None),
        }
    }

    /// Subscribe to runner-driven state changes. The hook must not block; it
    /// is invoked from the worker thread.
    pub fn with_on_state_change(
        mut self,
        hook: impl Fn(ControllerState, Option<&str>) + Send + Sync + 'static,
    ) -> Self {
        self.on_state_change = Some(Arc::new(hook));
        self
    }

    /// Spawn the worker. Idempotent: the second call is a no-op.
    pub fn start(&self) {
        let Some(task) = self.task.lock().take() else {
            return;
        };
        let slot = self.slot.clone();
        let state_machine = self.state_machine.clone();
        let stop_token = self.stop_token.clone();
        let on_state_change = self.on_state_change.clone();

        let handle = std::thread::Builder::new()
            .name("controller-runner".to_string())
            .spawn(move || {
                let result = task();
                let (reason, target) = match &result {
                    Ok(_) => ("run complete", ControllerState::Finished),
                    Err(_) if stop_token.should_stop() => ("run error after stop", ControllerState::Aborted),
                    Err(_) => ("run error", ControllerState::Failed),
                };
                // The orchestrator normally set the terminal state already;
                // this is the backstop for early exits and test shortcuts.
                state_machine.transition_or_log(target, Some(reason));
                if let Some(hook) = &on_state_change {
                    hook(state_machine.state(), Some(reason));
                }

                let (lock, cvar) = &*slot;
                let mut slot = lock.lock();
                match result {
                    Ok(summary) => slot.summary = Some(summary),
                    Err(err) => slot.error = Some(err),
                }
                slot.finished = true;
                cvar.notify_all();
            })
            .ok();
        *self.thread.lock() = handle;
    }

    /// Wait up to `timeout` for the summary. `Ok(None)` on timeout; captured
    /// run errors are re-raised (once) after the lifecycle was transitioned.
    pub fn wait(&self, timeout: Duration) -> Result<Option<RunSummary>, OrchestratorError> {
        let (lock, cvar) = &*self.slot;
        let mut slot = lock.lock();
        if !slot.finished {
            cvar.wait_for(&mut slot, timeout);
        }
        if !slot.finished {
            return Ok(None);
        }
        if let Some(err) = slot.error.take() {
            return Err(err);
        }
        Ok(slot.summary.clone())
    }

    /// Request a cooperative stop.
    pub fn arm_stop(&self, reason: &str) {
        tracing::info!(reason, "arming stop");
        self.stop_token.request_stop();
    }

    pub fn state(&self) -> ControllerState {
        self.state_machine.state()
    }

    /// Join the worker thread (after a successful wait).
    pub fn join(&self) {
        if let Some(handle) = self.thread.lock().take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
#[path = "runner_tests.rs"]
mod tests;
