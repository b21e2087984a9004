// SPDX-License-Identifier: MIT

//! Progress events emitted by remote runners.
//!
//! Events arrive over several transports (JSONL event log, stdout markers,
//! direct callbacks); the wire shape is identical everywhere. Only `host`,
//! `workload`, `repetition`, and `status` are required — everything else
//! carries a sensible default.

use serde::{Deserialize, Serialize};

/// Runner-reported status for one (host, workload, repetition).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    Running,
    Done,
    Failed,
    Stopped,
    Skipped,
    Cancelled,
}

crate::simple_display! {
    EventStatus {
        Running => "running",
        Done => "done",
        Failed => "failed",
        Stopped => "stopped",
        Skipped => "skipped",
        Cancelled => "cancelled",
    }
}

impl EventStatus {
    /// Lenient parse used for wire payloads (case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "running" => Some(Self::Running),
            "done" => Some(Self::Done),
            "failed" => Some(Self::Failed),
            "stopped" => Some(Self::Stopped),
            "skipped" => Some(Self::Skipped),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    /// Whether this status confirms the runner is no longer generating load.
    ///
    /// A runner may have crashed (`failed`) or finished (`done`) by the time
    /// the stop request lands; both count as confirmations.
    pub fn confirms_stop(self) -> bool {
        matches!(
            self,
            Self::Stopped | Self::Failed | Self::Cancelled | Self::Done
        )
    }
}

/// Event payload kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    #[default]
    Status,
    Log,
}

crate::simple_display! {
    EventKind {
        Status => "status",
        Log => "log",
    }
}

/// A single progress record for one (host, workload, repetition).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunEvent {
    #[serde(default)]
    pub run_id: String,
    pub host: String,
    pub workload: String,
    pub repetition: u32,
    #[serde(default)]
    pub total_repetitions: u32,
    pub status: EventStatus,
    #[serde(default)]
    pub message: String,
    #[serde(rename = "type", default)]
    pub kind: EventKind,
    #[serde(default = "default_level")]
    pub level: String,
    #[serde(default)]
    pub error_type: Option<String>,
    #[serde(default)]
    pub error_context: Option<serde_json::Value>,
    #[serde(default)]
    pub timestamp: f64,
}

fn default_level() -> String {
    "INFO".to_string()
}

/// Key identifying an event for deduplication purposes.
pub type EventKey = (String, String, u32, EventStatus, EventKind, String);

impl RunEvent {
    /// Build an event from a decoded JSON payload.
    ///
    /// Returns `None` when any required field (`host`, `workload`,
    /// `repetition`, `status`) is missing or malformed. Optional fields are
    /// defaulted; `run_id` and `total_repetitions` fall back to the
    /// controller-supplied values.
    pub fn from_payload(
        payload: &serde_json::Value,
        run_id: &str,
        default_total: u32,
        timestamp: f64,
    ) -> Option<Self> {
        let host = payload.get("host")?.as_str()?.to_string();
        let workload = payload.get("workload")?.as_str()?.to_string();
        let repetition = payload.get("repetition")?.as_u64()? as u32;
        let status = EventStatus::parse(payload.get("status")?.as_str()?)?;
        let total_repetitions = payload
            .get("total_repetitions")
            .or_else(|| payload.get("total"))
            .and_then(|v| v.as_u64())
            .map(|v| v as u32)
            .unwrap_or(default_total);
        Some(Self {
            run_id: payload
                .get("run_id")
                .and_then(|v| v.as_str())
                .unwrap_or(run_id)
                .to_string(),
            host,
            workload,
            repetition,
            total_repetitions,
            status,
            message: payload
                .get("message")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string(),
            kind: payload
                .get("type")
                .and_then(|v| v.as_str())
                .and_then(|s| match s {
                    "log" => Some(EventKind::Log),
                    "status" => Some(EventKind::Status),
                    _ => None,
                })
                .unwrap_or_default(),
            level: payload
                .get("level")
                .and_then(|v| v.as_str())
                .unwrap_or("INFO")
                .to_string(),
            error_type: payload
                .get("error_type")
                .and_then(|v| v.as_str())
                .map(str::to_string),
            error_context: payload
                .get("error_context")
                .filter(|v| !v.is_null())
                .cloned(),
            timestamp: payload
                .get("timestamp")
                .and_then(|v| v.as_f64())
                .unwrap_or(timestamp),
        })
    }

    /// Deduplication key: duplicates of the same logical event may arrive via
    /// the file tail and the stdout scrape.
    pub fn dedupe_key(&self) -> EventKey {
        (
            self.host.clone(),
            self.workload.clone(),
            self.repetition,
            self.status,
            self.kind,
            self.message.clone(),
        )
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
