// SPDX-License-Identifier: MIT

//! Distributed-stop coordinator.
//!
//! Tracks which remote runners have acknowledged a stop request. Any status
//! showing the runner is no longer generating load counts as a confirmation
//! (it may have crashed or finished before the request landed).

use fleetbench_core::{RunEvent, RunId};
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::time::{Duration, Instant};

/// Phase of the stop protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopState {
    Idle,
    /// Request sent, waiting for runner confirmations.
    StoppingWorkloads,
    /// All runners confirmed; teardown may proceed.
    TeardownReady,
    /// Timeout or failure in the stop protocol.
    StopFailed,
}

fleetbench_core::simple_display! {
    StopState {
        Idle => "idle",
        StoppingWorkloads => "stopping_workloads",
        TeardownReady => "teardown_ready",
        StopFailed => "stop_failed",
    }
}

struct CoordinatorInner {
    state: StopState,
    confirmed: BTreeSet<String>,
    started: Option<Instant>,
}

pub struct StopCoordinator {
    expected: BTreeSet<String>,
    stop_timeout: Duration,
    run_id: RunId,
    inner: Mutex<CoordinatorInner>,
}

impl StopCoordinator {
    pub fn new(expected: impl IntoIterator<Item = String>, stop_timeout: Duration, run_id: RunId) -> Self {
        Self {
            expected: expected.into_iter().collect(),
            stop_timeout,
            run_id,
            inner: Mutex::new(CoordinatorInner {
                state: StopState::Idle,
                confirmed: BTreeSet::new(),
                started: None,
            }),
        }
    }

    pub fn state(&self) -> StopState {
        self.inner.lock().state
    }

    /// Begin waiting for confirmations. No-op once past IDLE. The caller is
    /// responsible for actually pushing the stop request to the hosts.
    pub fn initiate_stop(&self) {
        let mut inner = self.inner.lock();
        if inner.state != StopState::Idle {
            return;
        }
        tracing::info!("initiating distributed stop protocol");
        inner.state = StopState::StoppingWorkloads;
        inner.started = Some(Instant::now());
    }

    /// Record a confirmation if the event is relevant. Confirmations are
    /// recorded only while waiting; duplicates are idempotent.
    pub fn process_event(&self, event: &RunEvent) {
        let mut inner = self.inner.lock();
        if inner.state != StopState::StoppingWorkloads {
            return;
        }
        if !event.run_id.is_empty() && self.run_id != event.run_id.as_str() {
            return;
        }
        if !self.expected.contains(&event.host) {
            return;
        }
        if !event.status.confirms_stop() {
            return;
        }
        if inner.confirmed.insert(event.host.clone()) {
            tracing::info!(host = %event.host, status = %event.status, "stop confirmed");
            if self.expected.is_subset(&inner.confirmed) {
                tracing::info!("all runners confirmed stop; ready for teardown");
                inner.state = StopState::TeardownReady;
            }
        }
    }

    /// Trip to STOP_FAILED when the wait has outlived the timeout.
    pub fn check_timeout(&self) {
        let mut inner = self.inner.lock();
        if inner.state != StopState::StoppingWorkloads {
            return;
        }
        let Some(started) = inner.started else {
            return;
        };
        if started.elapsed() > self.stop_timeout {
            let missing: Vec<&String> = self.expected.difference(&inner.confirmed).collect();
            tracing::error!(?missing, "stop protocol timed out");
            inner.state = StopState::StopFailed;
        }
    }

    pub fn can_proceed_to_teardown(&self) -> bool {
        self.state() == StopState::TeardownReady
    }

    /// Hosts that have not confirmed yet.
    pub fn missing_runners(&self) -> Vec<String> {
        let inner = self.inner.lock();
        self.expected.difference(&inner.confirmed).cloned().collect()
    }
}

#[cfg(test)]
#[path = "coordinator_tests.rs"]
mod tests;
