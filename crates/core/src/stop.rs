// SPDX-License-Identifier: MIT

//! Cooperative cancellation token.
//!
//! The flag read is lock-free; the optional stop-file probe is the only
//! filesystem touch on the query path, and once it trips the flag is latched
//! so later queries stay cheap. The `on_stop` callback fires exactly once,
//! whether the stop came from a request or from the file appearing.

use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

type StopCallback = Box<dyn Fn() + Send + Sync>;

pub struct StopToken {
    flag: AtomicBool,
    fired: AtomicBool,
    stop_file: Option<PathBuf>,
    on_stop: Mutex<Option<StopCallback>>,
}

impl StopToken {
    pub fn new() -> Self {
        Self {
            flag: AtomicBool::new(false),
            fired: AtomicBool::new(false),
            stop_file: None,
            on_stop: Mutex::new(None),
        }
    }

    /// A token that also trips when `path` appears on disk.
    pub fn with_stop_file(path: impl Into<PathBuf>) -> Self {
        Self {
            stop_file: Some(path.into()),
            ..Self::new()
        }
    }

    pub fn stop_file(&self) -> Option<&Path> {
        self.stop_file.as_deref()
    }

    /// Install the one-shot callback invoked when the stop first trips.
    pub fn set_on_stop(&self, callback: impl Fn() + Send + Sync + 'static) {
        *self.on_stop.lock() = Some(Box::new(callback));
    }

    /// Request a cooperative stop. Idempotent; the callback fires once.
    pub fn request_stop(&self) {
        self.flag.store(true, Ordering::SeqCst);
        self.fire_once();
    }

    /// Whether a stop has been requested, either directly or via the stop
    /// file. The first positive file probe latches the flag and fires the
    /// callback.
    pub fn should_stop(&self) -> bool {
        if self.flag.load(Ordering::SeqCst) {
            return true;
        }
        if let Some(path) = &self.stop_file {
            if path.exists() {
                self.flag.store(true, Ordering::SeqCst);
                self.fire_once();
                return true;
            }
        }
        false
    }

    /// Disarm the callback hook so late trips cannot touch torn-down sinks.
    /// Signal-handler restoration itself is owned by the CLI's signal guard.
    pub fn restore(&self) {
        *self.on_stop.lock() = None;
    }

    fn fire_once(&self) {
        if self.fired.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(callback) = &*self.on_stop.lock() {
            callback();
        }
    }
}

impl Default for StopToken {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "stop_tests.rs"]
mod tests;
