// SPDX-License-Identifier: MIT

//! Background tailer for newline-delimited JSON event logs.
//!
//! Polls the file at a fixed interval, tracks its byte position across reads,
//! and resets when the file is truncated or replaced. Unparseable lines are
//! skipped.

use std::io::{Read, Seek, SeekFrom};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_POLL: Duration = Duration::from_millis(100);

pub struct JsonlTailer {
    stop: Arc<AtomicBool>,
    handle: Option<std::thread::JoinHandle<()>>,
}

impl JsonlTailer {
    /// Start tailing `path`, delivering each parsed JSON line to `on_payload`.
    pub fn start(
        path: impl Into<PathBuf>,
        poll: Duration,
        on_payload: impl Fn(serde_json::Value) + Send + 'static,
    ) -> Self {
        let path = path.into();
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = stop.clone();
        let handle = std::thread::Builder::new()
            .name("event-tailer".to_string())
            .spawn(move || {
                let mut position = 0u64;
                let mut partial = String::new();
                while !stop_flag.load(Ordering::SeqCst) {
                    position = poll_once(&path, position, &mut partial, &on_payload);
                    interruptible_sleep(poll, &stop_flag);
                }
                // Final drain so events written just before stop are not lost.
                poll_once(&path, position, &mut partial, &on_payload);
            })
            .ok();
        Self { stop, handle }
    }

    /// Stop the poller and wait for it to drain.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for JsonlTailer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Sleep in short slices so a stop request does not wait out a long poll
/// interval.
fn interruptible_sleep(total: Duration, stop: &AtomicBool) {
    let slice = Duration::from_millis(10);
    let mut remaining = total;
    while !remaining.is_zero() && !stop.load(Ordering::SeqCst) {
        let step = remaining.min(slice);
        std::thread::sleep(step);
        remaining = remaining.saturating_sub(step);
    }
}

fn poll_once(
    path: &std::path::Path,
    mut position: u64,
    partial: &mut String,
    on_payload: &impl Fn(serde_json::Value),
) -> u64 {
    let Ok(metadata) = std::fs::metadata(path) else {
        return position;
    };
    if metadata.len() < position {
        // Truncated or replaced: start over.
        position = 0;
        partial.clear();
    }
    if metadata.len() == position {
        return position;
    }
    let Ok(mut file) = std::fs::File::open(path) else {
        return position;
    };
    if file.seek(SeekFrom::Start(position)).is_err() {
        return position;
    }
    let mut chunk = String::new();
    let Ok(read) = file.read_to_string(&mut chunk) else {
        return position;
    };
    position += read as u64;

    partial.push_str(&chunk);
    while let Some(newline) = partial.find('\n') {
        let line: String = partial.drain(..=newline).collect();
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<serde_json::Value>(line) {
            Ok(payload) => on_payload(payload),
            Err(_) => tracing::debug!("skipping unparseable event line"),
        }
    }
    position
}

#[cfg(test)]
#[path = "tailer_tests.rs"]
mod tests;
