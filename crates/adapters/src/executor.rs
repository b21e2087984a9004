// SPDX-License-Identifier: MIT

//! Remote-execution seam.
//!
//! The controller only assumes a capability that runs a named script against
//! a set of hosts and reports `(rc, status)`. The default implementation
//! drives a local subprocess; the real fan-out transport lives outside this
//! repository and plugs in through the same trait.

use fleetbench_core::HostSpec;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::io::BufRead;
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;

/// Terminal status of one script execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecStatus {
    Successful,
    Failed,
    Stopped,
    Skipped,
}

fleetbench_core::simple_display! {
    ExecStatus {
        Successful => "successful",
        Failed => "failed",
        Stopped => "stopped",
        Skipped => "skipped",
    }
}

/// Result of one script execution across the inventory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub rc: i32,
    pub status: ExecStatus,
    #[serde(default)]
    pub stats: serde_json::Value,
}

impl ExecutionResult {
    pub fn successful() -> Self {
        Self {
            rc: 0,
            status: ExecStatus::Successful,
            stats: serde_json::Value::Null,
        }
    }

    pub fn failed(rc: i32) -> Self {
        Self {
            rc,
            status: ExecStatus::Failed,
            stats: serde_json::Value::Null,
        }
    }

    pub fn stopped() -> Self {
        Self {
            rc: 1,
            status: ExecStatus::Stopped,
            stats: serde_json::Value::Null,
        }
    }

    pub fn skipped() -> Self {
        Self {
            rc: 0,
            status: ExecStatus::Skipped,
            stats: serde_json::Value::Null,
        }
    }

    pub fn success(&self) -> bool {
        self.rc == 0 && self.status == ExecStatus::Successful
    }

    /// Force-mark a result as stopped (used when a stop interrupts a phase).
    pub fn mark_stopped(&mut self) {
        self.status = ExecStatus::Stopped;
    }
}

/// Host set a script runs against.
#[derive(Debug, Clone, Default)]
pub struct Inventory {
    pub hosts: Vec<HostSpec>,
    pub inventory_file: Option<PathBuf>,
}

impl Inventory {
    pub fn new(hosts: Vec<HostSpec>) -> Self {
        Self {
            hosts,
            inventory_file: None,
        }
    }

    pub fn host_names(&self) -> Vec<String> {
        self.hosts.iter().map(|h| h.name.clone()).collect()
    }
}

/// One script invocation.
#[derive(Debug, Clone)]
pub struct ScriptRequest {
    pub script: PathBuf,
    pub extravars: serde_json::Map<String, serde_json::Value>,
    pub tags: Vec<String>,
    pub limit_hosts: Vec<String>,
    pub cancellable: bool,
}

impl ScriptRequest {
    pub fn new(script: impl Into<PathBuf>) -> Self {
        Self {
            script: script.into(),
            extravars: serde_json::Map::new(),
            tags: Vec::new(),
            limit_hosts: Vec::new(),
            cancellable: true,
        }
    }

    pub fn with_extravars(mut self, extravars: serde_json::Map<String, serde_json::Value>) -> Self {
        self.extravars = extravars;
        self
    }

    pub fn with_limit_hosts(mut self, hosts: Vec<String>) -> Self {
        self.limit_hosts = hosts;
        self
    }

    pub fn non_cancellable(mut self) -> Self {
        self.cancellable = false;
        self
    }
}

/// Streaming stdout sink for executor output.
pub type OutputCallback = Arc<dyn Fn(&str) + Send + Sync>;

#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("failed to launch {script}: {source}")]
    Spawn {
        script: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed waiting on {script}: {source}")]
    Wait {
        script: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Capability consumed by the orchestrator.
pub trait RemoteExecutor: Send + Sync {
    fn run_script(
        &self,
        request: &ScriptRequest,
        inventory: &Inventory,
    ) -> Result<ExecutionResult, ExecutorError>;

    /// Ask the in-flight execution to terminate. Ignored for
    /// non-cancellable requests.
    fn interrupt(&self);

    fn is_running(&self) -> bool;

    /// Where the executor streams JSONL progress, when it does.
    fn event_log_path(&self) -> Option<PathBuf> {
        None
    }
}

/// Default transport: runs the script as a local subprocess.
///
/// The request (hosts, extravars, limits, tags) is handed to the script as a
/// single JSON argument; progress comes back over stdout markers and the
/// optional JSONL event log.
pub struct ProcessExecutor {
    output: Option<OutputCallback>,
    event_log: Option<PathBuf>,
    child: Mutex<Option<Child>>,
    cancellable_now: AtomicBool,
    interrupted: AtomicBool,
}

impl ProcessExecutor {
    pub fn new() -> Self {
        Self {
            output: None,
            event_log: None,
            child: Mutex::new(None),
            cancellable_now: AtomicBool::new(true),
            interrupted: AtomicBool::new(false),
        }
    }

    pub fn with_output(mut self, callback: OutputCallback) -> Self {
        self.output = Some(callback);
        self
    }

    pub fn with_event_log(mut self, path: impl Into<PathBuf>) -> Self {
        self.event_log = Some(path.into());
        self
    }

    fn payload(request: &ScriptRequest, inventory: &Inventory) -> serde_json::Value {
        serde_json::json!({
            "hosts": inventory.hosts,
            "limit_hosts": request.limit_hosts,
            "tags": request.tags,
            "extravars": serde_json::Value::Object(request.extravars.clone()),
        })
    }
}

impl Default for ProcessExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl RemoteExecutor for ProcessExecutor {
    fn run_script(
        &self,
        request: &ScriptRequest,
        inventory: &Inventory,
    ) -> Result<ExecutionResult, ExecutorError> {
        self.interrupted.store(false, Ordering::SeqCst);
        self.cancellable_now.store(request.cancellable, Ordering::SeqCst);

        let mut command = Command::new("sh");
        command
            .arg(&request.script)
            .arg(Self::payload(request, inventory).to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit());
        // Scalar extravars double as LB_* environment variables so plain
        // shell scripts need not parse the JSON payload.
        for (key, value) in &request.extravars {
            if let Some(text) = value.as_str() {
                command.env(format!("LB_{}", key.to_uppercase()), text);
            }
        }
        if let Some(event_log) = &self.event_log {
            command.env("LB_EVENT_LOG", event_log);
            command.env("LB_ENABLE_EVENT_LOGGING", "1");
        }

        let mut child = command.spawn().map_err(|source| ExecutorError::Spawn {
            script: request.script.clone(),
            source,
        })?;
        let stdout = child.stdout.take();
        *self.child.lock() = Some(child);

        if let Some(stdout) = stdout {
            let reader = std::io::BufReader::new(stdout);
            for line in reader.lines() {
                let Ok(line) = line else { break };
                if let Some(output) = &self.output {
                    output(&line);
                }
            }
        }

        let status = {
            let mut guard = self.child.lock();
            let result = match guard.as_mut() {
                Some(child) => child.wait(),
                None => return Ok(ExecutionResult::stopped()),
            };
            *guard = None;
            result.map_err(|source| ExecutorError::Wait {
                script: request.script.clone(),
                source,
            })?
        };

        if self.interrupted.swap(false, Ordering::SeqCst) {
            return Ok(ExecutionResult::stopped());
        }
        let rc = status.code().unwrap_or(1);
        if rc == 0 {
            Ok(ExecutionResult::successful())
        } else {
            Ok(ExecutionResult::failed(rc))
        }
    }

    fn interrupt(&self) {
        if !self.cancellable_now.load(Ordering::SeqCst) {
            return;
        }
        let mut guard = self.child.lock();
        if let Some(child) = guard.as_mut() {
            self.interrupted.store(true, Ordering::SeqCst);
            if let Err(err) = child.kill() {
                tracing::debug!(%err, "interrupt kill failed");
            }
        }
    }

    fn is_running(&self) -> bool {
        self.child.lock().is_some()
    }

    fn event_log_path(&self) -> Option<PathBuf> {
        self.event_log.clone()
    }
}

#[cfg(any(test, feature = "test-support"))]
pub mod fake {
    use super::*;
    use std::collections::VecDeque;

    /// Recorded invocation made against the fake.
    #[derive(Debug, Clone)]
    pub struct ScriptedCall {
        pub script: PathBuf,
        pub extravars: serde_json::Map<String, serde_json::Value>,
        pub limit_hosts: Vec<String>,
        pub cancellable: bool,
        pub host_names: Vec<String>,
    }

    type CallHook = Box<dyn Fn(usize, &ScriptRequest) + Send + Sync>;

    /// Scripted executor for tests: queued results, per-script overrides,
    /// recorded calls, and an optional hook fired before each call returns
    /// (used to inject stop requests or progress events mid-run).
    pub struct FakeExecutor {
        queued: Mutex<VecDeque<ExecutionResult>>,
        overrides: Mutex<Vec<(String, ExecutionResult)>>,
        calls: Mutex<Vec<ScriptedCall>>,
        on_call: Mutex<Option<CallHook>>,
        interrupts: std::sync::atomic::AtomicU32,
        event_log: Option<PathBuf>,
    }

    impl FakeExecutor {
        pub fn new() -> Self {
            Self {
                queued: Mutex::new(VecDeque::new()),
                overrides: Mutex::new(Vec::new()),
                calls: Mutex::new(Vec::new()),
                on_call: Mutex::new(None),
                interrupts: std::sync::atomic::AtomicU32::new(0),
                event_log: None,
            }
        }

        pub fn with_event_log(mut self, path: impl Into<PathBuf>) -> Self {
            self.event_log = Some(path.into());
            self
        }

        /// Queue a result for the next unmatched call.
        pub fn push_result(&self, result: ExecutionResult) {
            self.queued.lock().push_back(result);
        }

        /// Return `result` for any script whose path contains `needle`.
        pub fn set_result_for(&self, needle: impl Into<String>, result: ExecutionResult) {
            self.overrides.lock().push((needle.into(), result));
        }

        /// Hook invoked with (call index, request) before each call returns.
        pub fn set_on_call(&self, hook: impl Fn(usize, &ScriptRequest) + Send + Sync + 'static) {
            *self.on_call.lock() = Some(Box::new(hook));
        }

        pub fn calls(&self) -> Vec<ScriptedCall> {
            self.calls.lock().clone()
        }

        pub fn calls_for(&self, needle: &str) -> Vec<ScriptedCall> {
            self.calls
                .lock()
                .iter()
                .filter(|c| c.script.to_string_lossy().contains(needle))
                .cloned()
                .collect()
        }

        pub fn interrupt_count(&self) -> u32 {
            self.interrupts.load(Ordering::SeqCst)
        }
    }

    impl Default for FakeExecutor {
        fn default() -> Self {
            Self::new()
        }
    }

    impl RemoteExecutor for FakeExecutor {
        fn run_script(
            &self,
            request: &ScriptRequest,
            inventory: &Inventory,
        ) -> Result<ExecutionResult, ExecutorError> {
            let index = {
                let mut calls = self.calls.lock();
                calls.push(ScriptedCall {
                    script: request.script.clone(),
                    extravars: request.extravars.clone(),
                    limit_hosts: request.limit_hosts.clone(),
                    cancellable: request.cancellable,
                    host_names: inventory.host_names(),
                });
                calls.len() - 1
            };
            if let Some(hook) = &*self.on_call.lock() {
                hook(index, request);
            }
            let script = request.script.to_string_lossy();
            for (needle, result) in self.overrides.lock().iter() {
                if script.contains(needle.as_str()) {
                    return Ok(result.clone());
                }
            }
            Ok(self
                .queued
                .lock()
                .pop_front()
                .unwrap_or_else(ExecutionResult::successful))
        }

        fn interrupt(&self) {
            self.interrupts.fetch_add(1, Ordering::SeqCst);
        }

        fn is_running(&self) -> bool {
            false
        }

        fn event_log_path(&self) -> Option<PathBuf> {
            self.event_log.clone()
        }
    }
}

#[cfg(test)]
#[path = "executor_tests.rs"]
mod tests;
