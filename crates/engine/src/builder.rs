// SPDX-License-Identifier: MIT

//! Session construction.
//!
//! The builder resolves the run id, prepares directories, creates or
//! reconciles the journal, assembles executor extravars, and persists the
//! journal immediately so a resume is possible even if the run aborts before
//! any work starts.

use crate::coordinator::StopCoordinator;
use crate::session::RunSession;
use fleetbench_adapters::Inventory;
use fleetbench_core::{Clock, ControllerStateMachine, RunConfig, RunId, SystemClock};
use fleetbench_journal::{JournalError, JournalHandle, RunJournal};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("failed to prepare run directories at {path}: {source}")]
    Dirs {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Journal(#[from] JournalError),
}

pub struct SessionBuilder<'a> {
    config: &'a RunConfig,
    state_machine: Option<Arc<ControllerStateMachine>>,
    execution_mode: String,
}

impl<'a> SessionBuilder<'a> {
    pub fn new(config: &'a RunConfig) -> Self {
        Self {
            config,
            state_machine: None,
            execution_mode: "remote".to_string(),
        }
    }

    /// Share a state machine created by the caller (the app supervises it).
    pub fn with_state_machine(mut self, machine: Arc<ControllerStateMachine>) -> Self {
        self.state_machine = Some(machine);
        self
    }

    pub fn with_execution_mode(mut self, mode: impl Into<String>) -> Self {
        self.execution_mode = mode.into();
        self
    }

    /// Build a session. `preexisting` carries the loaded journal and its path
    /// on resume.
    pub fn build(
        self,
        test_names: &[String],
        run_id: Option<RunId>,
        preexisting: Option<(RunJournal, PathBuf)>,
    ) -> Result<RunSession, SessionError> {
        let clock = SystemClock;
        let now = clock.epoch_secs();
        let resuming = preexisting.is_some();

        let resolved_run_id = match &preexisting {
            Some((journal, _)) => journal.run_id.clone(),
            None => run_id.unwrap_or_else(RunId::generate),
        };

        let inventory = Inventory::new(self.config.hosts.clone());

        let coordinator = Arc::new(StopCoordinator::new(
            self.config.hosts.iter().map(|h| h.name.clone()),
            Duration::from_secs_f64(self.config.timeouts.stop_secs),
            resolved_run_id.clone(),
        ));

        let target_reps = preexisting
            .as_ref()
            .map(|(journal, _)| journal.metadata.repetitions)
            .filter(|&reps| reps > 0)
            .unwrap_or(self.config.repetitions);

        let output_root = self.config.output_root.join(resolved_run_id.as_str());
        std::fs::create_dir_all(&output_root).map_err(|source| SessionError::Dirs {
            path: output_root.clone(),
            source,
        })?;
        // Report/export roots are created on demand by whoever writes there.
        let report_root = self.config.report_root.join(resolved_run_id.as_str());
        let data_export_root = self.config.data_export_root.join(resolved_run_id.as_str());

        let mut per_host_output = BTreeMap::new();
        for host in &self.config.hosts {
            let host_dir = output_root.join(&host.name);
            std::fs::create_dir_all(&host_dir).map_err(|source| SessionError::Dirs {
                path: host_dir.clone(),
                source,
            })?;
            per_host_output.insert(host.name.clone(), host_dir);
        }

        let (mut journal, journal_path) = match preexisting {
            Some((journal, path)) => (journal, path),
            None => (
                RunJournal::initialize(resolved_run_id.clone(), self.config, test_names, now),
                output_root.join("run_journal.json"),
            ),
        };
        if resuming {
            journal.reconcile(self.config, test_names, now);
        }
        journal.metadata.execution_mode = self.execution_mode.clone();
        journal.save(&journal_path)?;
        let journal = JournalHandle::new(journal, &journal_path);

        let extravars = build_extravars(
            self.config,
            &resolved_run_id,
            &output_root,
            &report_root,
            &data_export_root,
            &per_host_output,
            target_reps,
        );

        let stop_file = journal_path
            .parent()
            .map(|parent| parent.join("STOP"))
            .unwrap_or_else(|| PathBuf::from("STOP"));

        Ok(RunSession {
            run_id: resolved_run_id,
            inventory,
            target_reps,
            output_root,
            report_root,
            data_export_root,
            per_host_output,
            journal,
            extravars,
            test_names: test_names.to_vec(),
            state_machine: self.state_machine.unwrap_or_default(),
            coordinator,
            stop_file,
        })
    }
}

/// Base extravars handed to every executor invocation.
fn build_extravars(
    config: &RunConfig,
    run_id: &RunId,
    output_root: &Path,
    report_root: &Path,
    data_export_root: &Path,
    per_host_output: &BTreeMap<String, PathBuf>,
    target_reps: u32,
) -> serde_json::Map<String, serde_json::Value> {
    let mut extravars = serde_json::Map::new();
    extravars.insert("run_id".to_string(), serde_json::json!(run_id.as_str()));
    extravars.insert(
        "output_root".to_string(),
        serde_json::json!(output_root.display().to_string()),
    );
    extravars.insert(
        "remote_output_root".to_string(),
        serde_json::json!(format!(
            "{}/results/{}",
            config.remote_execution.workdir,
            run_id.as_str()
        )),
    );
    extravars.insert(
        "report_root".to_string(),
        serde_json::json!(report_root.display().to_string()),
    );
    extravars.insert(
        "data_export_root".to_string(),
        serde_json::json!(data_export_root.display().to_string()),
    );
    extravars.insert(
        "workdir".to_string(),
        serde_json::json!(config.remote_execution.workdir),
    );
    let per_host: BTreeMap<&String, String> = per_host_output
        .iter()
        .map(|(name, path)| (name, path.display().to_string()))
        .collect();
    extravars.insert("per_host_output".to_string(), serde_json::json!(per_host));
    extravars.insert("benchmark_config".to_string(), config.dump());
    extravars.insert(
        "collector_apt_packages".to_string(),
        serde_json::json!(config.collectors.apt_packages()),
    );
    extravars.insert("repetitions_total".to_string(), serde_json::json!(target_reps));
    extravars.insert("repetition_index".to_string(), serde_json::json!(0));
    extravars
}

#[cfg(test)]
#[path = "builder_tests.rs"]
mod tests;
