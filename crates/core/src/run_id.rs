// SPDX-License-Identifier: MIT

//! Run identifier type.
//!
//! Run ids are timestamp-based (`run-YYYYMMDD-HHMMSS`, UTC) so that a plain
//! lexicographic sort orders runs chronologically.

use serde::{Deserialize, Serialize};

/// Identifier for a single benchmark run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(String);

impl RunId {
    /// Wrap an existing id string (for resume/deserialization).
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh timestamped run id.
    pub fn generate() -> Self {
        Self(chrono::Utc::now().format("run-%Y%m%d-%H%M%S").to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Check the `run-YYYYMMDD-HHMMSS` shape without being strict about the
    /// calendar (operators occasionally hand-roll ids).
    pub fn looks_generated(&self) -> bool {
        let rest = match self.0.strip_prefix("run-") {
            Some(rest) => rest,
            None => return false,
        };
        let mut parts = rest.splitn(2, '-');
        let date = parts.next().unwrap_or_default();
        let time = parts.next().unwrap_or_default();
        date.len() == 8
            && time.len() == 6
            && date.chars().all(|c| c.is_ascii_digit())
            && time.chars().all(|c| c.is_ascii_digit())
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RunId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for RunId {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl AsRef<str> for RunId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for RunId {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for RunId {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

#[cfg(test)]
#[path = "run_id_tests.rs"]
mod tests;
