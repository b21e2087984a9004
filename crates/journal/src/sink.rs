// SPDX-License-Identifier: MIT

//! Event-to-journal sink.
//!
//! Maps runner progress events onto task statuses, persists the journal, and
//! mirrors a single formatted line to the run log.

use crate::handle::JournalHandle;
use crate::journal::JournalError;
use crate::task::{TaskStatus, TaskUpdate};
use fleetbench_core::{EventKind, EventStatus, RunEvent};
use parking_lot::Mutex;
use std::io::Write;
use std::path::Path;

pub struct EventLogSink {
    journal: JournalHandle,
    log_file: Option<Mutex<std::fs::File>>,
}

impl EventLogSink {
    pub fn new(journal: JournalHandle, log_path: Option<&Path>) -> std::io::Result<Self> {
        let log_file = match log_path {
            Some(path) => {
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                Some(Mutex::new(
                    std::fs::File::options().create(true).append(true).open(path)?,
                ))
            }
            None => None,
        };
        Ok(Self { journal, log_file })
    }

    /// Apply one event: journal update + save, then the log line.
    pub fn emit(&self, event: &RunEvent, now: f64) -> Result<(), JournalError> {
        let update = task_update_for(event);
        self.journal
            .update_task(&event.host, &event.workload, event.repetition, update, now)?;
        self.write_line(event);
        Ok(())
    }

    fn write_line(&self, event: &RunEvent) {
        let Some(file) = &self.log_file else {
            return;
        };
        let line = format_event_line(event);
        let mut file = file.lock();
        if writeln!(file, "{line}").is_err() {
            tracing::debug!("run log write failed");
        }
        let _ = file.flush();
    }
}

/// Journal mutation for a progress event. `stopped`/`cancelled` fail the task
/// with the stop reason; failure details ride along only on failures.
pub fn task_update_for(event: &RunEvent) -> TaskUpdate {
    let status = match event.status {
        EventStatus::Running => TaskStatus::Running,
        EventStatus::Done => TaskStatus::Completed,
        EventStatus::Failed => TaskStatus::Failed,
        EventStatus::Skipped => TaskStatus::Skipped,
        EventStatus::Stopped | EventStatus::Cancelled => TaskStatus::Failed,
    };
    let mut update = TaskUpdate::status(status).with_action("run_progress");
    if status == TaskStatus::Failed {
        let reason = match event.status {
            EventStatus::Stopped => "stopped".to_string(),
            EventStatus::Cancelled => "cancelled".to_string(),
            _ if !event.message.is_empty() => event.message.clone(),
            _ => "failed".to_string(),
        };
        update = update.with_error(reason);
        if let Some(error_type) = &event.error_type {
            update = update.with_error_type(error_type.clone());
        }
        if let Some(context) = &event.error_context {
            update = update.with_error_context(context.clone());
        }
    }
    update
}

/// One-line log rendering of an event.
pub fn format_event_line(event: &RunEvent) -> String {
    let ts = chrono::DateTime::from_timestamp(
        event.timestamp as i64,
        ((event.timestamp.fract()) * 1e9) as u32,
    )
    .map(|dt| dt.to_rfc3339())
    .unwrap_or_else(|| format!("{:.3}", event.timestamp));
    let mut line = format!(
        "[{ts}] {} {} rep {}/{} status={}",
        event.host, event.workload, event.repetition, event.total_repetitions, event.status
    );
    if event.kind != EventKind::Status {
        line.push_str(&format!(" type={}", event.kind));
    }
    if event.level != "INFO" {
        line.push_str(&format!(" level={}", event.level));
    }
    if !event.message.is_empty() {
        line.push_str(&format!(" msg={}", event.message));
    }
    if let Some(error_type) = &event.error_type {
        line.push_str(&format!(" err_type={error_type}"));
    }
    line
}

#[cfg(test)]
#[path = "sink_tests.rs"]
mod tests;
