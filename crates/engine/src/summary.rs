// SPDX-License-Identifier: MIT

//! Run summary returned by the orchestrator.

use fleetbench_adapters::ExecutionResult;
use fleetbench_core::{ControllerState, RunId};
use std::collections::BTreeMap;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub run_id: RunId,
    pub per_host_output: BTreeMap<String, PathBuf>,
    /// Per-phase execution results, keyed `setup_global`, `run_<w>`, etc.
    pub phases: BTreeMap<String, ExecutionResult>,
    pub success: bool,
    pub controller_state: ControllerState,
    pub cleanup_allowed: bool,
    pub output_root: PathBuf,
    pub report_root: PathBuf,
    pub data_export_root: PathBuf,
}

impl RunSummary {
    /// Names of teardown phases that did not succeed (operator warning: the
    /// remote workloads may still be running).
    pub fn failed_teardowns(&self) -> Vec<String> {
        self.phases
            .iter()
            .filter(|(name, result)| name.starts_with("teardown") && !result.success())
            .map(|(name, _)| name.clone())
            .collect()
    }
}
