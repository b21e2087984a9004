// SPDX-License-Identifier: MIT

//! Backfill of per-repetition timing and status from `{workload}_results.json`
//! artifacts left in the per-host output directories by the remote executor.

use crate::journal::RunJournal;
use crate::task::TaskStatus;
use fleetbench_core::HostSpec;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Outcome of the workload generator for one repetition.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GeneratorResult {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub returncode: Option<i64>,
    #[serde(default)]
    pub command: Option<String>,
}

/// One entry of a `{workload}_results.json` file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResultEntry {
    #[serde(default)]
    pub repetition: Option<u32>,
    #[serde(default)]
    pub start_time: Option<String>,
    #[serde(default)]
    pub end_time: Option<String>,
    #[serde(default)]
    pub duration_seconds: Option<f64>,
    #[serde(default)]
    pub generator_result: Option<GeneratorResult>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub error_type: Option<String>,
    #[serde(default)]
    pub error_context: Option<serde_json::Value>,
}

/// Backfill timings and statuses for a workload across hosts. Returns whether
/// anything changed (callers persist on true).
///
/// The whole per-host tree is scanned recursively and files are applied
/// newest-mtime-first; if two files share a name in different subdirectories
/// the newer one wins.
pub fn backfill_timings(
    journal: &mut RunJournal,
    hosts: &[HostSpec],
    workload: &str,
    per_host_output: &BTreeMap<String, PathBuf>,
) -> bool {
    let mut updated = false;
    for host in hosts {
        let Some(host_dir) = per_host_output.get(&host.name) else {
            continue;
        };
        for entry in collect_results(host_dir, workload) {
            updated |= apply_result_entry(journal, &host.name, workload, &entry);
        }
    }
    updated
}

/// Parsed result entries for one host/workload, newest files first.
fn collect_results(host_dir: &Path, workload: &str) -> Vec<ResultEntry> {
    let file_name = format!("{workload}_results.json");
    let mut candidates: Vec<(std::time::SystemTime, PathBuf)> = Vec::new();
    find_results_files(host_dir, &file_name, &mut candidates);
    candidates.sort_by(|a, b| b.0.cmp(&a.0));

    let mut entries = Vec::new();
    for (_, path) in candidates {
        let Ok(text) = std::fs::read_to_string(&path) else {
            continue;
        };
        match serde_json::from_str::<Vec<ResultEntry>>(&text) {
            Ok(parsed) => entries.extend(parsed),
            Err(err) => {
                tracing::debug!(path = %path.display(), %err, "unparseable results file");
            }
        }
    }
    entries
}

fn find_results_files(dir: &Path, file_name: &str, out: &mut Vec<(std::time::SystemTime, PathBuf)>) {
    let Ok(read) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in read.flatten() {
        let path = entry.path();
        if path.is_dir() {
            find_results_files(&path, file_name, out);
        } else if path.file_name().and_then(|n| n.to_str()) == Some(file_name) {
            let mtime = entry
                .metadata()
                .and_then(|m| m.modified())
                .unwrap_or(std::time::SystemTime::UNIX_EPOCH);
            out.push((mtime, path));
        }
    }
}

fn apply_result_entry(journal: &mut RunJournal, host: &str, workload: &str, entry: &ResultEntry) -> bool {
    let Some(rep) = entry.repetition else {
        return false;
    };
    if journal.get_task(host, workload, rep).is_none() {
        return false;
    }
    let timings = parse_timings(entry);
    journal.apply_backfill(host, workload, rep, entry, timings);
    true
}

fn parse_timings(entry: &ResultEntry) -> (Option<f64>, Option<f64>, Option<f64>) {
    let started = entry.start_time.as_deref().and_then(parse_rfc3339_secs);
    let finished = entry.end_time.as_deref().and_then(parse_rfc3339_secs);
    let duration = entry.duration_seconds.or(match (started, finished) {
        (Some(s), Some(f)) => Some((f - s).max(0.0)),
        _ => None,
    });
    (started, finished, duration)
}

fn parse_rfc3339_secs(text: &str) -> Option<f64> {
    chrono::DateTime::parse_from_rfc3339(text)
        .ok()
        .map(|dt| dt.timestamp() as f64 + f64::from(dt.timestamp_subsec_nanos()) / 1e9)
}

impl RunJournal {
    /// Apply one backfill entry directly to a task's fields.
    ///
    /// Status policy: a generator error or non-zero returncode forces FAILED
    /// with a composed message; a bare `error_type` also fails the task;
    /// otherwise tasks not already FAILED/SKIPPED become COMPLETED.
    pub(crate) fn apply_backfill(
        &mut self,
        host: &str,
        workload: &str,
        rep: u32,
        entry: &ResultEntry,
        timings: (Option<f64>, Option<f64>, Option<f64>),
    ) {
        let Some(task) = self.task_mut(host, workload, rep) else {
            return;
        };
        let (started, finished, duration) = timings;
        if let Some(started) = started {
            task.started_at = Some(started);
        }
        if let Some(finished) = finished {
            task.finished_at = Some(finished);
        }
        if let Some(duration) = duration {
            task.duration_seconds = Some(duration);
        }

        let generator = entry.generator_result.clone().unwrap_or_default();
        let rc_failed = generator.returncode.is_some_and(|rc| rc != 0);
        if generator.error.is_some() || rc_failed {
            let message = compose_error(&generator);
            task.status = TaskStatus::Failed;
            task.current_action = message.clone();
            task.error = Some(message);
            task.error_type = entry.error_type.clone();
            task.error_context = entry.error_context.clone();
            return;
        }
        if entry.error_type.is_some() {
            let message = entry
                .error
                .clone()
                .unwrap_or_else(|| "error recorded".to_string());
            task.status = TaskStatus::Failed;
            task.current_action = message.clone();
            task.error = Some(message);
            task.error_type = entry.error_type.clone();
            task.error_context = entry.error_context.clone();
            return;
        }
        if !matches!(task.status, TaskStatus::Failed | TaskStatus::Skipped) {
            task.status = TaskStatus::Completed;
        }
    }

    fn task_mut(&mut self, host: &str, workload: &str, rep: u32) -> Option<&mut crate::task::TaskState> {
        let key = crate::task::task_key(host, workload, rep);
        self.task_entry_mut(&key)
    }
}

fn compose_error(generator: &GeneratorResult) -> String {
    let mut parts = Vec::new();
    if let Some(error) = &generator.error {
        parts.push(error.clone());
    }
    if let Some(rc) = generator.returncode {
        if rc != 0 {
            parts.push(format!("returncode={rc}"));
        }
    }
    if let Some(command) = &generator.command {
        parts.push(format!("cmd={command}"));
    }
    if parts.is_empty() {
        "workload reported an error".to_string()
    } else {
        parts.join(" | ")
    }
}

#[cfg(test)]
#[path = "results_tests.rs"]
mod tests;
