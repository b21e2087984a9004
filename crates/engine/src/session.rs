// SPDX-License-Identifier: MIT

//! Per-run resolved state.
//!
//! A session is everything the orchestrator needs for one run: identifiers,
//! inventory, directories, the journal handle, the stop coordinator, and the
//! lifecycle state machine. Sessions are built exclusively by
//! [`crate::builder::SessionBuilder`].

use crate::coordinator::StopCoordinator;
use fleetbench_adapters::Inventory;
use fleetbench_core::{ControllerState, ControllerStateMachine, RunId};
use fleetbench_journal::JournalHandle;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

pub struct RunSession {
    pub run_id: RunId,
    pub inventory: Inventory,
    pub target_reps: u32,
    pub output_root: PathBuf,
    pub report_root: PathBuf,
    pub data_export_root: PathBuf,
    pub per_host_output: BTreeMap<String, PathBuf>,
    pub journal: JournalHandle,
    pub extravars: serde_json::Map<String, serde_json::Value>,
    pub test_names: Vec<String>,
    pub state_machine: Arc<ControllerStateMachine>,
    pub coordinator: Arc<StopCoordinator>,
    pub stop_file: PathBuf,
}

impl RunSession {
    /// Transition the lifecycle FSM, logging and dropping invalid edges.
    pub fn transition(&self, to: ControllerState, reason: Option<&str>) {
        self.state_machine.transition_or_log(to, reason);
    }

    /// Arm the stop state (first reaction to a stop request).
    pub fn arm_stop(&self, reason: Option<&str>) {
        self.state_machine
            .transition_or_log(ControllerState::StopArmed, reason);
    }

    pub fn allows_cleanup(&self) -> bool {
        self.state_machine.allows_cleanup()
    }
}
