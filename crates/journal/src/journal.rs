// SPDX-License-Identifier: MIT

//! Durable run journal: task plan, per-task status, resume validation.
//!
//! The journal is rewritten in full on every save — it is small
//! (O(hosts × workloads × reps), typically well under 10 KB) and the atomic
//! write-temp-then-rename keeps it consistent under crashes.

use crate::task::{task_key, TaskState, TaskStatus, TaskUpdate};
use fleetbench_core::{RunConfig, RunId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors raised by journal persistence and resume validation.
#[derive(Debug, Error)]
pub enum JournalError {
    #[error("journal I/O failure at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("corrupt journal at {path}: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("journal repetitions ({journal}) do not match config ({config}); aborting resume")]
    RepetitionsMismatch { journal: u32, config: u32 },
    #[error("config hash mismatch on resume: journal={journal_hash} current={config_hash}")]
    ResumeMismatch {
        journal_hash: String,
        config_hash: String,
    },
}

/// Run-scoped metadata persisted alongside the tasks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct JournalMetadata {
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub repetitions: u32,
    #[serde(default)]
    pub config_dump: serde_json::Value,
    #[serde(default)]
    pub config_hash: String,
    #[serde(default)]
    pub execution_mode: String,
    #[serde(default)]
    pub node_count: u32,
    #[serde(default)]
    pub controller_state: String,
    #[serde(default)]
    pub system_info: BTreeMap<String, String>,
}

/// The entire execution plan and state for one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunJournal {
    pub run_id: RunId,
    #[serde(with = "task_seq")]
    tasks: BTreeMap<String, TaskState>,
    #[serde(default)]
    pub metadata: JournalMetadata,
}

impl RunJournal {
    /// Create a journal covering every (host, workload, repetition) in the
    /// plan. Workload names not present in the config are ignored.
    pub fn initialize(run_id: RunId, config: &RunConfig, workload_names: &[String], now: f64) -> Self {
        let mut journal = Self {
            run_id,
            tasks: BTreeMap::new(),
            metadata: JournalMetadata {
                created_at: chrono::Utc::now().to_rfc3339(),
                repetitions: config.repetitions,
                config_dump: config.dump(),
                config_hash: config.config_hash(),
                execution_mode: "remote".to_string(),
                node_count: config.hosts.len() as u32,
                controller_state: String::new(),
                system_info: BTreeMap::new(),
            },
        };
        journal.populate(config, workload_names, now);
        journal
    }

    fn populate(&mut self, config: &RunConfig, workload_names: &[String], now: f64) {
        for name in workload_names {
            if !config.workloads.contains_key(name) {
                continue;
            }
            for host in &config.hosts {
                for rep in 1..=config.repetitions {
                    self.add_task(TaskState::new(host.name.clone(), name.clone(), rep, now));
                }
            }
        }
    }

    /// Load a journal from disk. With `expected` set, resume validation runs:
    /// repetitions must match and the stored config hash must equal the
    /// current one.
    pub fn load(path: &Path, expected: Option<&RunConfig>) -> Result<Self, JournalError> {
        let text = std::fs::read_to_string(path).map_err(|source| JournalError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let journal: Self = serde_json::from_str(&text).map_err(|source| JournalError::Corrupt {
            path: path.to_path_buf(),
            source,
        })?;
        if let Some(config) = expected {
            journal.validate_for_resume(config)?;
        }
        Ok(journal)
    }

    fn validate_for_resume(&self, config: &RunConfig) -> Result<(), JournalError> {
        if self.metadata.repetitions != 0 && self.metadata.repetitions != config.repetitions {
            return Err(JournalError::RepetitionsMismatch {
                journal: self.metadata.repetitions,
                config: config.repetitions,
            });
        }
        let config_hash = config.config_hash();
        if !self.metadata.config_hash.is_empty() && self.metadata.config_hash != config_hash {
            return Err(JournalError::ResumeMismatch {
                journal_hash: self.metadata.config_hash.clone(),
                config_hash,
            });
        }
        Ok(())
    }

    pub fn add_task(&mut self, task: TaskState) {
        self.tasks.insert(task.key(), task);
    }

    pub fn get_task(&self, host: &str, workload: &str, repetition: u32) -> Option<&TaskState> {
        self.tasks.get(&task_key(host, workload, repetition))
    }

    pub fn tasks(&self) -> impl Iterator<Item = &TaskState> {
        self.tasks.values()
    }

    pub(crate) fn task_entry_mut(&mut self, key: &str) -> Option<&mut TaskState> {
        self.tasks.get_mut(key)
    }

    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    /// Apply one mutation. Silently ignored when the task was never planned
    /// (a stale event may reference one).
    ///
    /// Timing rules: `started_at` on the first RUNNING, `finished_at` and a
    /// non-negative `duration_seconds` on any terminal status.
    pub fn update_task(
        &mut self,
        host: &str,
        workload: &str,
        repetition: u32,
        update: TaskUpdate,
        now: f64,
    ) {
        let Some(task) = self.tasks.get_mut(&task_key(host, workload, repetition)) else {
            return;
        };
        if update.status == TaskStatus::Running && task.started_at.is_none() {
            task.started_at = Some(now);
        }
        if update.status.is_terminal() {
            task.finished_at = Some(now);
            if let Some(started) = task.started_at {
                task.duration_seconds = Some((now - started).max(0.0));
            }
        }
        task.status = update.status;
        task.timestamp = now;
        if let Some(action) = update.action {
            task.current_action = action;
        }
        if let Some(error) = update.error {
            task.error = Some(error);
        }
        if let Some(error_type) = update.error_type {
            task.error_type = Some(error_type);
        }
        if let Some(context) = update.error_context {
            task.error_context = Some(context);
        }
    }

    /// Whether the task still needs to run. Unknown tasks run (a correctly
    /// initialized journal never hits that branch).
    pub fn should_run(&self, host: &str, workload: &str, repetition: u32, allow_skipped: bool) -> bool {
        match self.get_task(host, workload, repetition) {
            Some(task) if allow_skipped => task.status != TaskStatus::Completed,
            Some(task) => !matches!(task.status, TaskStatus::Completed | TaskStatus::Skipped),
            None => true,
        }
    }

    /// Add PENDING tasks for hosts/workloads that entered the config after
    /// this journal was written (resume reconciliation).
    pub fn reconcile(&mut self, config: &RunConfig, workload_names: &[String], now: f64) {
        for name in workload_names {
            if !config.workloads.contains_key(name) {
                continue;
            }
            for host in &config.hosts {
                for rep in 1..=config.repetitions {
                    if self.get_task(&host.name, name, rep).is_none() {
                        self.add_task(TaskState::new(host.name.clone(), name.clone(), rep, now));
                    }
                }
            }
        }
    }

    /// Fail every RUNNING task with the given reason (used once a stop has
    /// been requested and the run is over).
    pub fn fail_running_tasks(&mut self, reason: &str, now: f64) {
        for task in self.tasks.values_mut() {
            if task.status == TaskStatus::Running {
                task.status = TaskStatus::Failed;
                task.current_action = reason.to_string();
                task.error = Some(reason.to_string());
                task.finished_at = Some(now);
                if let Some(started) = task.started_at {
                    task.duration_seconds = Some((now - started).max(0.0));
                }
                task.timestamp = now;
            }
        }
    }

    /// Persist atomically: write a temp file next to the target, then rename.
    pub fn save(&self, path: &Path) -> Result<(), JournalError> {
        let io_err = |source| JournalError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        let payload = serde_json::to_string_pretty(self).map_err(|source| JournalError::Corrupt {
            path: path.to_path_buf(),
            source,
        })?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, payload).map_err(io_err)?;
        std::fs::rename(&tmp, path).map_err(io_err)?;
        Ok(())
    }

    /// Reconstruct the config from the stored dump, when present.
    pub fn rehydrate_config(&self) -> Option<RunConfig> {
        if self.metadata.config_dump.is_null() {
            return None;
        }
        RunConfig::from_dump(&self.metadata.config_dump).ok()
    }
}

/// Most recently modified `run_journal.json` under the output root.
pub fn latest_journal(output_root: &Path) -> Option<PathBuf> {
    let entries = std::fs::read_dir(output_root).ok()?;
    let mut candidates: Vec<(std::time::SystemTime, PathBuf)> = Vec::new();
    for entry in entries.flatten() {
        let candidate = entry.path().join("run_journal.json");
        if let Ok(meta) = std::fs::metadata(&candidate) {
            let mtime = meta.modified().unwrap_or(std::time::SystemTime::UNIX_EPOCH);
            candidates.push((mtime, candidate));
        }
    }
    candidates.sort_by(|a, b| b.0.cmp(&a.0));
    candidates.into_iter().next().map(|(_, path)| path)
}

/// Tasks serialize as a list (the key is derivable); the in-memory map is
/// rebuilt on load.
mod task_seq {
    use super::*;
    use serde::{Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        tasks: &BTreeMap<String, TaskState>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(tasks.values())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<BTreeMap<String, TaskState>, D::Error> {
        let tasks = Vec::<TaskState>::deserialize(deserializer)?;
        Ok(tasks.into_iter().map(|t| (t.key(), t)).collect())
    }
}

#[cfg(test)]
#[path = "journal_tests.rs"]
mod tests;
