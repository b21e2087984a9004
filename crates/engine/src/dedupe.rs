// SPDX-License-Identifier: MIT

//! Bounded event deduplication window.
//!
//! The same logical event can arrive via the file tail and the stdout scrape;
//! a FIFO of recent keys drops the second copy without reordering the stream.

use fleetbench_core::{EventKey, RunEvent};
use std::collections::{HashSet, VecDeque};

pub const DEFAULT_WINDOW: usize = 200;

pub struct EventDedupe {
    recent: VecDeque<EventKey>,
    seen: HashSet<EventKey>,
    limit: usize,
}

impl EventDedupe {
    pub fn new(limit: usize) -> Self {
        Self {
            recent: VecDeque::with_capacity(limit),
            seen: HashSet::with_capacity(limit),
            limit,
        }
    }

    /// Record an event. Returns true when it is new within the window.
    pub fn record(&mut self, event: &RunEvent) -> bool {
        let key = event.dedupe_key();
        if self.seen.contains(&key) {
            return false;
        }
        self.recent.push_back(key.clone());
        self.seen.insert(key);
        if self.recent.len() > self.limit {
            if let Some(old) = self.recent.pop_front() {
                self.seen.remove(&old);
            }
        }
        true
    }
}

impl Default for EventDedupe {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW)
    }
}

#[cfg(test)]
#[path = "dedupe_tests.rs"]
mod tests;
