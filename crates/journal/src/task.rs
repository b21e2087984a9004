// SPDX-License-Identifier: MIT

//! Task state: one atomic unit of work (host + workload + repetition).

use serde::{Deserialize, Serialize};

/// Journal status of a single task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Skipped,
}

fleetbench_core::simple_display! {
    TaskStatus {
        Pending => "PENDING",
        Running => "RUNNING",
        Completed => "COMPLETED",
        Failed => "FAILED",
        Skipped => "SKIPPED",
    }
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Skipped)
    }
}

/// Journal key for a task: `host::workload::repetition`.
pub fn task_key(host: &str, workload: &str, repetition: u32) -> String {
    format!("{host}::{workload}::{repetition}")
}

/// State of a single (host, workload, repetition).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskState {
    pub host: String,
    pub workload: String,
    pub repetition: u32,
    pub status: TaskStatus,
    #[serde(default)]
    pub current_action: String,
    /// Wall-clock seconds of the last mutation.
    #[serde(default)]
    pub timestamp: f64,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub error_type: Option<String>,
    #[serde(default)]
    pub error_context: Option<serde_json::Value>,
    #[serde(default)]
    pub started_at: Option<f64>,
    #[serde(default)]
    pub finished_at: Option<f64>,
    #[serde(default)]
    pub duration_seconds: Option<f64>,
}

impl TaskState {
    pub fn new(host: impl Into<String>, workload: impl Into<String>, repetition: u32, now: f64) -> Self {
        Self {
            host: host.into(),
            workload: workload.into(),
            repetition,
            status: TaskStatus::Pending,
            current_action: String::new(),
            timestamp: now,
            error: None,
            error_type: None,
            error_context: None,
            started_at: None,
            finished_at: None,
            duration_seconds: None,
        }
    }

    pub fn key(&self) -> String {
        task_key(&self.host, &self.workload, self.repetition)
    }
}

/// One journal mutation: target status plus optional progress/error details.
#[derive(Debug, Clone)]
pub struct TaskUpdate {
    pub status: TaskStatus,
    pub action: Option<String>,
    pub error: Option<String>,
    pub error_type: Option<String>,
    pub error_context: Option<serde_json::Value>,
}

impl TaskUpdate {
    pub fn status(status: TaskStatus) -> Self {
        Self {
            status,
            action: None,
            error: None,
            error_type: None,
            error_context: None,
        }
    }

    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        self.action = Some(action.into());
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    pub fn with_error_type(mut self, error_type: impl Into<String>) -> Self {
        self.error_type = Some(error_type.into());
        self
    }

    pub fn with_error_context(mut self, context: serde_json::Value) -> Self {
        self.error_context = Some(context);
        self
    }
}

#[cfg(test)]
#[path = "task_tests.rs"]
mod tests;
