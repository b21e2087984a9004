// SPDX-License-Identifier: MIT

//! Shared, persist-on-update journal handle.
//!
//! The orchestrator thread and the event pipeline both mutate the journal;
//! one mutex guards the in-memory state and its single file on disk, and
//! every mutation is persisted before the lock is released. That makes
//! per-task updates linearizable across threads.

use crate::journal::{JournalError, RunJournal};
use crate::task::TaskUpdate;
use fleetbench_core::RunId;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Clone)]
pub struct JournalHandle {
    inner: Arc<Mutex<RunJournal>>,
    path: Arc<PathBuf>,
}

impl JournalHandle {
    pub fn new(journal: RunJournal, path: impl Into<PathBuf>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(journal)),
            path: Arc::new(path.into()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn run_id(&self) -> RunId {
        self.inner.lock().run_id.clone()
    }

    /// Read access under the lock.
    pub fn with<R>(&self, f: impl FnOnce(&RunJournal) -> R) -> R {
        f(&self.inner.lock())
    }

    /// Mutate and persist in one critical section.
    pub fn with_mut<R>(&self, f: impl FnOnce(&mut RunJournal) -> R) -> Result<R, JournalError> {
        let mut journal = self.inner.lock();
        let result = f(&mut journal);
        journal.save(&self.path)?;
        Ok(result)
    }

    /// Apply one task mutation and persist.
    pub fn update_task(
        &self,
        host: &str,
        workload: &str,
        repetition: u32,
        update: TaskUpdate,
        now: f64,
    ) -> Result<(), JournalError> {
        self.with_mut(|journal| journal.update_task(host, workload, repetition, update, now))
    }

    pub fn should_run(&self, host: &str, workload: &str, repetition: u32, allow_skipped: bool) -> bool {
        self.inner.lock().should_run(host, workload, repetition, allow_skipped)
    }

    /// Persist the current state without mutating.
    pub fn save(&self) -> Result<(), JournalError> {
        self.inner.lock().save(&self.path)
    }

    /// Owned copy of the journal (summary/reporting paths).
    pub fn snapshot(&self) -> RunJournal {
        self.inner.lock().clone()
    }
}

#[cfg(test)]
#[path = "handle_tests.rs"]
mod tests;
