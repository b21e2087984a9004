// SPDX-License-Identifier: MIT

//! Composite stdout sink for executor output.
//!
//! Every chunk is (a) appended raw to the run log, (b) scanned line-by-line
//! for progress markers, and (c) forwarded to an optional downstream
//! formatter. Partial lines are buffered until the newline arrives, so a
//! marker split across two chunks is still recognized.

use parking_lot::Mutex;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

type LineHandler = Box<dyn Fn(&str) + Send + Sync>;
type Downstream = Box<dyn Fn(&str) + Send + Sync>;

pub struct OutputTee {
    log_file: Option<Mutex<std::fs::File>>,
    buffer: Mutex<String>,
    on_line: LineHandler,
    downstream: Option<Downstream>,
}

impl OutputTee {
    pub fn new(
        log_path: Option<&Path>,
        on_line: impl Fn(&str) + Send + Sync + 'static,
        downstream: Option<Downstream>,
    ) -> std::io::Result<Self> {
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
        Ok(Self {
            log_file,
            buffer: Mutex::new(String::new()),
            on_line: Box::new(on_line),
            downstream,
        })
    }

    /// Accept one chunk of executor output (any line fragmentation).
    pub fn write_chunk(&self, text: &str) {
        if text.is_empty() {
            return;
        }
        if let Some(file) = &self.log_file {
            let mut file = file.lock();
            if file.write_all(text.as_bytes()).is_err() {
                tracing::debug!("run log write failed");
            }
            let _ = file.flush();
        }

        {
            let mut buffer = self.buffer.lock();
            buffer.push_str(text);
            while let Some(newline) = buffer.find('\n') {
                let line: String = buffer.drain(..=newline).collect();
                (self.on_line)(line.trim_end_matches(['\n', '\r']));
            }
        }

        if let Some(downstream) = &self.downstream {
            downstream(text);
        }
    }

    /// Flush any trailing partial line (end of stream).
    pub fn flush(&self) {
        let mut buffer = self.buffer.lock();
        if !buffer.is_empty() {
            let line = std::mem::take(&mut *buffer);
            (self.on_line)(line.trim_end_matches(['\n', '\r']));
        }
    }

    /// Adapt to the executor's output callback shape. The executor delivers
    /// whole lines, so a newline is appended per call.
    pub fn as_output_callback(self: &Arc<Self>) -> fleetbench_adapters::OutputCallback {
        let tee = self.clone();
        Arc::new(move |line: &str| {
            tee.write_chunk(line);
            tee.write_chunk("\n");
        })
    }
}

#[cfg(test)]
#[path = "tee_tests.rs"]
mod tests;
