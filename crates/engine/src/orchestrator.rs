// SPDX-License-Identifier: MIT

//! Run orchestration: global setup → per-workload phases → global teardown.
//!
//! Phase failures are converted to values in the phase map and the summary,
//! never thrown across phase boundaries. Only journal I/O and executor
//! transport failures propagate as errors (the ControllerRunner traps them).

use crate::session::RunSession;
use crate::summary::RunSummary;
use fleetbench_adapters::{
    ExecutionResult, ExecutorError, PluginDescriptor, PluginRegistry, RemoteExecutor, ScriptRequest,
};
use fleetbench_core::{Clock, ControllerState, HostSpec, RunConfig, StopToken, WorkloadSpec};
use fleetbench_journal::{
    backfill_timings, pending_hosts_for, pending_repetitions, JournalError, TaskStatus, TaskUpdate,
};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Interval between coordinator checks while waiting for stop confirmations.
const STOP_POLL: Duration = Duration::from_millis(500);

/// Script pushed to every host to request a cooperative stop: it drops the
/// STOP sentinel in the remote working directory.
const STOP_REQUEST_SCRIPT: &str = "#!/bin/sh\n\
: \"${LB_WORKDIR:=/tmp/fleetbench}\"\n\
mkdir -p \"$LB_WORKDIR\"\n\
touch \"$LB_WORKDIR/STOP\"\n";

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error(transparent)]
    Journal(#[from] JournalError),
    #[error(transparent)]
    Executor(#[from] ExecutorError),
}

#[derive(Debug, Clone)]
struct RunFlags {
    all_tests_success: bool,
    stop_successful: bool,
    stop_protocol_attempted: bool,
    success_override: Option<bool>,
}

impl Default for RunFlags {
    fn default() -> Self {
        Self {
            all_tests_success: true,
            stop_successful: true,
            stop_protocol_attempted: false,
            success_override: None,
        }
    }
}

enum SetupOutcome {
    Continue,
    SkipWorkloads,
    Fatal,
}

type Phases = BTreeMap<String, ExecutionResult>;

pub struct RunOrchestrator<C: Clock> {
    config: RunConfig,
    executor: Arc<dyn RemoteExecutor>,
    registry: Arc<dyn PluginRegistry>,
    stop_token: Arc<StopToken>,
    clock: C,
}

impl<C: Clock> RunOrchestrator<C> {
    pub fn new(
        config: RunConfig,
        executor: Arc<dyn RemoteExecutor>,
        registry: Arc<dyn PluginRegistry>,
        stop_token: Arc<StopToken>,
        clock: C,
    ) -> Self {
        Self {
            config,
            executor,
            registry,
            stop_token,
            clock,
        }
    }

    /// Drive one run to completion. `resume` widens the pending-work filter
    /// to retry everything non-completed.
    pub fn run(&self, session: &RunSession, resume: bool) -> Result<RunSummary, OrchestratorError> {
        let mut phases = Phases::new();
        let mut flags = RunFlags::default();
        let mut test_names = session.test_names.clone();

        tracing::info!(run_id = %session.run_id, tests = ?test_names, "starting run");
        let initial = if self.config.remote_execution.run_setup {
            ControllerState::RunningGlobalSetup
        } else {
            ControllerState::RunningWorkloads
        };
        session.transition(initial, Some("run started"));

        if self.config.remote_execution.run_setup {
            match self.global_setup(session, &mut phases, &mut flags)? {
                SetupOutcome::Continue => {}
                SetupOutcome::SkipWorkloads => test_names.clear(),
                SetupOutcome::Fatal => {
                    return Ok(self.build_summary(session, phases, flags));
                }
            }
        }

        if !self.stop_requested(session)
            && session.state_machine.state() != ControllerState::RunningWorkloads
        {
            session.transition(ControllerState::RunningWorkloads, None);
        }

        self.run_workloads(session, &test_names, resume, &mut phases, &mut flags)?;
        self.global_teardown(session, &mut phases, &mut flags)?;

        tracing::info!("run finished");
        Ok(self.build_summary(session, phases, flags))
    }

    /// Check the stop token, arming the lifecycle on the first positive.
    fn stop_requested(&self, session: &RunSession) -> bool {
        if self.stop_token.should_stop() {
            session.arm_stop(Some("stop requested"));
            true
        } else {
            false
        }
    }

    fn base_request(&self, script: &Path, session: &RunSession) -> ScriptRequest {
        ScriptRequest::new(script).with_extravars(session.extravars.clone())
    }

    fn global_setup(
        &self,
        session: &RunSession,
        phases: &mut Phases,
        flags: &mut RunFlags,
    ) -> Result<SetupOutcome, OrchestratorError> {
        if self.stop_requested(session) {
            tracing::warn!("stop requested before setup; arming stop and skipping workloads");
            session.transition(
                ControllerState::StoppingInterruptSetup,
                Some("stop before setup"),
            );
            return Ok(SetupOutcome::SkipWorkloads);
        }

        tracing::info!("phase: global setup");
        let request = self.base_request(&self.config.remote_execution.setup_script, session);
        let result = self.executor.run_script(&request, &session.inventory)?;
        phases.insert("setup_global".to_string(), result);

        if self.stop_requested(session) {
            session.transition(
                ControllerState::StoppingInterruptSetup,
                Some("stop during setup"),
            );
            self.executor.interrupt();
            flags.all_tests_success = false;
            if let Some(result) = phases.get_mut("setup_global") {
                result.mark_stopped();
            }
            return Ok(SetupOutcome::SkipWorkloads);
        }

        if !phases["setup_global"].success() {
            tracing::error!("global setup failed; aborting run");
            session.transition(ControllerState::Failed, Some("global setup failed"));
            flags.success_override = Some(false);
            return Ok(SetupOutcome::Fatal);
        }
        Ok(SetupOutcome::Continue)
    }

    fn run_workloads(
        &self,
        session: &RunSession,
        test_names: &[String],
        resume: bool,
        phases: &mut Phases,
        flags: &mut RunFlags,
    ) -> Result<(), OrchestratorError> {
        for name in test_names {
            if self.stop_requested(session) {
                self.handle_stop_during_workloads(session, flags)?;
                break;
            }
            if !self.process_workload(name, session, resume, phases, flags)? {
                break;
            }
        }
        Ok(())
    }

    /// Run one workload through setup/execute/collect/teardown. Returns false
    /// when the workload loop should stop.
    fn process_workload(
        &self,
        name: &str,
        session: &RunSession,
        resume: bool,
        phases: &mut Phases,
        flags: &mut RunFlags,
    ) -> Result<bool, OrchestratorError> {
        let Some(workload) = self.config.workloads.get(name).cloned() else {
            tracing::info!(workload = name, "skipping unknown workload");
            return Ok(true);
        };

        let pending_hosts = session.journal.with(|journal| {
            pending_hosts_for(journal, session.target_reps, name, &self.config.hosts, resume)
        });
        if pending_hosts.is_empty() {
            tracing::info!(workload = name, "all repetitions already completed, skipping");
            return Ok(true);
        }

        let descriptor = self.registry.get(&workload.plugin);
        if descriptor.is_none() {
            tracing::info!(
                workload = name,
                plugin = %workload.plugin,
                "no plugin assets found; skipping setup/teardown"
            );
        }

        if self.stop_requested(session) {
            self.handle_stop_during_workloads(session, flags)?;
            return Ok(false);
        }

        let mut pending_reps = session.journal.with(|journal| {
            pending_repetitions(journal, session.target_reps, &pending_hosts, name, resume)
        });

        self.workload_setup(
            name,
            descriptor.as_ref(),
            session,
            &mut pending_reps,
            phases,
            flags,
        )?;
        if pending_reps.is_empty() {
            return Ok(true);
        }
        if self.stop_requested(session) {
            self.handle_stop_during_workloads(session, flags)?;
            return Ok(false);
        }

        // Collect always runs after execute, even when execute fails: the
        // partial artifacts are what lets the journal backfill real timings.
        let exec_outcome =
            self.execute_workload(name, &workload, session, &pending_hosts, &pending_reps, phases, flags);
        if let Err(err) = self.collect_workload(name, session, &pending_hosts, &pending_reps, phases)
        {
            tracing::warn!(workload = name, %err, "collect failed");
        }
        exec_outcome?;

        if self.stop_requested(session) {
            self.handle_stop_during_workloads(session, flags)?;
            return Ok(false);
        }

        self.workload_teardown(name, descriptor.as_ref(), session, phases)?;
        Ok(true)
    }

    fn workload_setup(
        &self,
        name: &str,
        descriptor: Option<&PluginDescriptor>,
        session: &RunSession,
        pending_reps: &mut BTreeMap<String, Vec<u32>>,
        phases: &mut Phases,
        flags: &mut RunFlags,
    ) -> Result<(), OrchestratorError> {
        let phase = format!("setup_{name}");
        let Some(script) = descriptor.and_then(|d| d.setup_script.as_deref()) else {
            phases.insert(phase, ExecutionResult::skipped());
            return Ok(());
        };

        tracing::info!(workload = name, "phase: workload setup");
        let mut request = self.base_request(script, session);
        if let Some(descriptor) = descriptor {
            request.extravars.extend(descriptor.setup_extravars.clone());
        }
        let result = self.executor.run_script(&request, &session.inventory)?;
        let failed = !result.success();
        if failed {
            tracing::error!(workload = name, rc = result.rc, "workload setup failed");
        }
        phases.insert(phase, result);
        if failed {
            flags.all_tests_success = false;
            // Execute/collect are skipped, but teardown still runs.
            self.workload_teardown(name, descriptor, session, phases)?;
            pending_reps.clear();
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn execute_workload(
        &self,
        name: &str,
        workload: &WorkloadSpec,
        session: &RunSession,
        pending_hosts: &[HostSpec],
        pending_reps: &BTreeMap<String, Vec<u32>>,
        phases: &mut Phases,
        flags: &mut RunFlags,
    ) -> Result<(), OrchestratorError> {
        tracing::info!(workload = name, hosts = pending_hosts.len(), intensity = %workload.intensity, "phase: run");
        self.update_pending(
            session,
            pending_hosts,
            name,
            pending_reps,
            TaskStatus::Running,
            "Running workload...",
            None,
        )?;

        let mut request = self.base_request(&self.config.remote_execution.run_script, session);
        request
            .extravars
            .insert("tests".to_string(), serde_json::json!([name]));
        request.extravars.insert(
            "pending_repetitions".to_string(),
            serde_json::json!(pending_reps),
        );
        let result = self.executor.run_script(&request, &session.inventory)?;
        let success = result.success();
        phases.insert(format!("run_{name}"), result);

        self.update_pending(
            session,
            pending_hosts,
            name,
            pending_reps,
            if success { TaskStatus::Completed } else { TaskStatus::Failed },
            if success { "Completed" } else { "Failed" },
            (!success).then_some("run script failed"),
        )?;

        if !success {
            tracing::error!(workload = name, "run failed");
            flags.all_tests_success = false;
        }
        Ok(())
    }

    fn collect_workload(
        &self,
        name: &str,
        session: &RunSession,
        pending_hosts: &[HostSpec],
        pending_reps: &BTreeMap<String, Vec<u32>>,
        phases: &mut Phases,
    ) -> Result<(), OrchestratorError> {
        let run_success = phases
            .get(&format!("run_{name}"))
            .map(ExecutionResult::success)
            .unwrap_or(false);
        let status = if run_success {
            TaskStatus::Completed
        } else {
            TaskStatus::Failed
        };

        if self.config.remote_execution.run_collect {
            tracing::info!(workload = name, "phase: collect");
            self.update_pending(
                session,
                pending_hosts,
                name,
                pending_reps,
                status,
                "Collecting results",
                None,
            )?;
            let request = self.base_request(&self.config.remote_execution.collect_script, session);
            let result = self.executor.run_script(&request, &session.inventory)?;
            phases.insert(format!("collect_{name}"), result);
            self.backfill(session, name, pending_hosts)?;
        } else {
            self.backfill(session, name, pending_hosts)?;
            phases.insert(format!("collect_{name}"), ExecutionResult::skipped());
            self.update_pending(session, pending_hosts, name, pending_reps, status, "Done", None)?;
        }
        Ok(())
    }

    fn backfill(
        &self,
        session: &RunSession,
        name: &str,
        pending_hosts: &[HostSpec],
    ) -> Result<(), OrchestratorError> {
        session.journal.with_mut(|journal| {
            backfill_timings(journal, pending_hosts, name, &session.per_host_output)
        })?;
        Ok(())
    }

    fn workload_teardown(
        &self,
        name: &str,
        descriptor: Option<&PluginDescriptor>,
        session: &RunSession,
        phases: &mut Phases,
    ) -> Result<(), OrchestratorError> {
        let phase = format!("teardown_{name}");
        let Some(script) = descriptor.and_then(|d| d.teardown_script.as_deref()) else {
            phases.insert(phase, ExecutionResult::skipped());
            return Ok(());
        };
        tracing::info!(workload = name, "phase: workload teardown");
        let mut request = self.base_request(script, session).non_cancellable();
        if let Some(descriptor) = descriptor {
            request.extravars.extend(descriptor.teardown_extravars.clone());
        }
        let result = self.executor.run_script(&request, &session.inventory)?;
        if !result.success() {
            tracing::warn!(workload = name, rc = result.rc, "workload teardown failed");
        }
        phases.insert(phase, result);
        Ok(())
    }

    /// Stop path: arm, run the distributed stop protocol, fail whatever was
    /// still RUNNING, and persist.
    fn handle_stop_during_workloads(
        &self,
        session: &RunSession,
        flags: &mut RunFlags,
    ) -> Result<(), OrchestratorError> {
        session.arm_stop(Some("stop during workloads"));
        session.transition(
            ControllerState::StoppingWaitRunners,
            Some("stop during workloads"),
        );
        flags.stop_protocol_attempted = true;
        flags.all_tests_success = false;
        flags.stop_successful = self.stop_protocol(session)?;

        let now = self.clock.epoch_secs();
        session
            .journal
            .with_mut(|journal| journal.fail_running_tasks("stopped", now))?;
        Ok(())
    }

    /// Push the stop request to every host, then wait for the coordinator to
    /// reach TEARDOWN_READY or STOP_FAILED.
    fn stop_protocol(&self, session: &RunSession) -> Result<bool, OrchestratorError> {
        tracing::info!("stop confirmed; initiating distributed stop protocol");
        session.coordinator.initiate_stop();

        let script_path = session.output_root.join("stop_request.sh");
        match std::fs::write(&script_path, STOP_REQUEST_SCRIPT) {
            Ok(()) => {
                tracing::info!("sending stop signal to remote runners");
                let request = ScriptRequest::new(&script_path)
                    .with_extravars(session.extravars.clone())
                    .non_cancellable();
                match self.executor.run_script(&request, &session.inventory) {
                    Ok(result) if !result.success() => {
                        tracing::warn!("failed to send stop signal (script failure)");
                    }
                    Err(err) => tracing::warn!(%err, "failed to send stop signal"),
                    Ok(_) => {}
                }
            }
            Err(err) => tracing::warn!(%err, "failed to write stop request script"),
        }

        tracing::info!("waiting for runners to confirm stop");
        loop {
            session.coordinator.check_timeout();
            match session.coordinator.state() {
                crate::coordinator::StopState::TeardownReady => {
                    tracing::info!("all runners confirmed stop");
                    session.transition(ControllerState::StoppingTeardown, Some("runners stopped"));
                    return Ok(true);
                }
                crate::coordinator::StopState::StopFailed => {
                    tracing::error!("stop protocol timed out or failed");
                    session.transition(
                        ControllerState::StopFailed,
                        Some("stop confirmations timed out"),
                    );
                    return Ok(false);
                }
                _ => std::thread::sleep(STOP_POLL),
            }
        }
    }

    fn global_teardown(
        &self,
        session: &RunSession,
        phases: &mut Phases,
        flags: &mut RunFlags,
    ) -> Result<(), OrchestratorError> {
        // Keep the state flow valid even when teardown is disabled, so
        // FINISHED is reached via RUNNING_GLOBAL_TEARDOWN.
        if session.state_machine.state() == ControllerState::RunningWorkloads {
            session.transition(ControllerState::RunningGlobalTeardown, None);
        }
        if !self.config.remote_execution.run_teardown {
            return Ok(());
        }

        let was_stopping = self.stop_requested(session);
        let state = session.state_machine.state();
        if !matches!(
            state,
            ControllerState::StoppingTeardown | ControllerState::StoppingInterruptTeardown
        ) {
            if was_stopping {
                session.transition(ControllerState::StoppingTeardown, Some("teardown after stop"));
            } else {
                session.transition(ControllerState::RunningGlobalTeardown, None);
            }
        }

        if flags.stop_protocol_attempted && !flags.stop_successful {
            tracing::warn!("stop protocol failed/timed out; proceeding with best-effort teardown");
            phases.insert("stop_protocol".to_string(), ExecutionResult::failed(1));
        }

        tracing::info!("phase: global teardown");
        let request = self
            .base_request(&self.config.remote_execution.teardown_script, session)
            .non_cancellable();
        let result = self.executor.run_script(&request, &session.inventory)?;
        if !result.success() {
            tracing::warn!("global teardown failed to clean up perfectly");
        }
        phases.insert("teardown_global".to_string(), result);

        if !was_stopping && self.stop_requested(session) {
            session.transition(
                ControllerState::StoppingInterruptTeardown,
                Some("stop during teardown"),
            );
        }
        Ok(())
    }

    fn build_summary(&self, session: &RunSession, phases: Phases, flags: RunFlags) -> RunSummary {
        let final_state = if self.stop_requested(session) {
            if flags.stop_successful {
                ControllerState::Aborted
            } else {
                ControllerState::StopFailed
            }
        } else if flags.success_override == Some(false) || !flags.all_tests_success {
            ControllerState::Failed
        } else {
            ControllerState::Finished
        };
        session.transition(final_state, Some("run complete"));
        let controller_state = session.state_machine.state();

        let state_label = controller_state.to_string();
        if let Err(err) = session
            .journal
            .with_mut(|journal| journal.metadata.controller_state = state_label)
        {
            tracing::warn!(%err, "failed to record final state in journal");
        }

        let success = flags
            .success_override
            .unwrap_or(flags.all_tests_success && flags.stop_successful);
        RunSummary {
            run_id: session.run_id.clone(),
            per_host_output: session.per_host_output.clone(),
            phases,
            success,
            controller_state,
            cleanup_allowed: controller_state.allows_cleanup(),
            output_root: session.output_root.clone(),
            report_root: session.report_root.clone(),
            data_export_root: session.data_export_root.clone(),
        }
    }

    /// Bulk-update every pending (host, repetition) of a workload.
    #[allow(clippy::too_many_arguments)]
    fn update_pending(
        &self,
        session: &RunSession,
        hosts: &[HostSpec],
        workload: &str,
        pending_reps: &BTreeMap<String, Vec<u32>>,
        status: TaskStatus,
        action: &str,
        error: Option<&str>,
    ) -> Result<(), OrchestratorError> {
        let now = self.clock.epoch_secs();
        session.journal.with_mut(|journal| {
            for host in hosts {
                let Some(reps) = pending_reps.get(&host.name) else {
                    continue;
                };
                for &rep in reps {
                    let mut update = TaskUpdate::status(status).with_action(action);
                    if let Some(error) = error {
                        update = update.with_error(error);
                    }
                    journal.update_task(&host.name, workload, rep, update, now);
                }
            }
        })?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "orchestrator_tests.rs"]
mod tests;
