// SPDX-License-Identifier: MIT

//! Run configuration model.
//!
//! The configuration is deserialized from TOML, dumped to JSON for journal
//! metadata, and hashed (sorted-keys SHA-256) so that resumes can detect a
//! changed config.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors raised while loading or reconstructing a configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("failed to reconstruct config from journal dump: {0}")]
    Rehydrate(#[from] serde_json::Error),
}

/// Workload intensity preset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Intensity {
    Low,
    #[default]
    Medium,
    High,
    UserDefined,
}

crate::simple_display! {
    Intensity {
        Low => "low",
        Medium => "medium",
        High => "high",
        UserDefined => "user_defined",
    }
}

impl Intensity {
    /// Parse a CLI intensity flag. `None` for unrecognized values.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            "user_defined" => Some(Self::UserDefined),
            _ => None,
        }
    }
}

/// A single remote host the run targets. Names are unique within a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostSpec {
    pub name: String,
    pub address: String,
    #[serde(default = "default_ssh_port")]
    pub port: u16,
    #[serde(default = "default_user")]
    pub user: String,
    #[serde(default)]
    pub privileged: bool,
    /// Host-scoped variables handed to the remote executor verbatim.
    #[serde(default)]
    pub vars: BTreeMap<String, String>,
}

fn default_ssh_port() -> u16 {
    22
}

fn default_user() -> String {
    "root".to_string()
}

crate::builder! {
    pub struct HostSpecBuilder => HostSpec {
        into {
            name: String = "h1",
            address: String = "127.0.0.1",
            user: String = "root",
        }
        set {
            port: u16 = 22,
            privileged: bool = false,
            vars: BTreeMap<String, String> = BTreeMap::new(),
        }
    }
}

/// A named benchmark workload, resolved by the plugin registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkloadSpec {
    /// Plugin that provides setup/teardown assets for this workload.
    pub plugin: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub intensity: Intensity,
    /// Opaque workload options, merged into the executor extravars.
    #[serde(default)]
    pub options: BTreeMap<String, serde_json::Value>,
}

fn default_true() -> bool {
    true
}

crate::builder! {
    pub struct WorkloadSpecBuilder => WorkloadSpec {
        into {
            plugin: String = "p",
        }
        set {
            enabled: bool = true,
            intensity: Intensity = Intensity::Medium,
            options: BTreeMap<String, serde_json::Value> = BTreeMap::new(),
        }
    }
}

/// Which remote-execution phases run, and which scripts drive them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteExecutionConfig {
    pub run_setup: bool,
    pub run_teardown: bool,
    pub run_collect: bool,
    pub setup_script: PathBuf,
    pub run_script: PathBuf,
    pub collect_script: PathBuf,
    pub teardown_script: PathBuf,
    /// Working directory on the remote hosts (stop sentinel lives here).
    pub workdir: String,
}

impl Default for RemoteExecutionConfig {
    fn default() -> Self {
        Self {
            run_setup: true,
            run_teardown: true,
            run_collect: true,
            setup_script: PathBuf::from("scripts/setup.sh"),
            run_script: PathBuf::from("scripts/run.sh"),
            collect_script: PathBuf::from("scripts/collect.sh"),
            teardown_script: PathBuf::from("scripts/teardown.sh"),
            workdir: "/tmp/fleetbench".to_string(),
        }
    }
}

/// Timeouts applied by the controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutsConfig {
    /// Seconds to wait for distributed stop confirmations.
    pub stop_secs: f64,
    /// Per-host timeout for the connectivity pre-flight.
    pub connect_secs: u64,
}

impl Default for TimeoutsConfig {
    fn default() -> Self {
        Self {
            stop_secs: 30.0,
            connect_secs: 10,
        }
    }
}

/// Metric collector toggles. Collectors themselves are external; the
/// controller only forwards package requirements to the executor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct CollectorsConfig {
    /// CLI sampling commands to run on each host (e.g. `mpstat`, `iostat`).
    pub cli_commands: Vec<String>,
}

impl CollectorsConfig {
    /// Apt packages the enabled collectors need on the remote hosts.
    pub fn apt_packages(&self) -> Vec<String> {
        if self.cli_commands.is_empty() {
            return Vec::new();
        }
        vec!["procps".to_string(), "sysstat".to_string()]
    }
}

/// Aggregate run configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Workloads by name, in declaration order.
    pub workloads: IndexMap<String, WorkloadSpec>,
    pub hosts: Vec<HostSpec>,
    pub repetitions: u32,
    pub output_root: PathBuf,
    pub report_root: PathBuf,
    pub data_export_root: PathBuf,
    pub timeouts: TimeoutsConfig,
    pub remote_execution: RemoteExecutionConfig,
    pub collectors: CollectorsConfig,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            workloads: IndexMap::new(),
            hosts: Vec::new(),
            repetitions: 1,
            output_root: PathBuf::from("benchmark-results"),
            report_root: PathBuf::from("benchmark-reports"),
            data_export_root: PathBuf::from("benchmark-exports"),
            timeouts: TimeoutsConfig::default(),
            remote_execution: RemoteExecutionConfig::default(),
            collectors: CollectorsConfig::default(),
        }
    }
}

impl RunConfig {
    /// Load a configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// JSON dump stored in the journal metadata for later rehydration.
    pub fn dump(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }

    /// Reconstruct a config from a journal `config_dump`.
    pub fn from_dump(dump: &serde_json::Value) -> Result<Self, ConfigError> {
        Ok(serde_json::from_value(dump.clone())?)
    }

    /// Sorted-keys SHA-256 over the JSON dump. Stable across load/save cycles.
    pub fn config_hash(&self) -> String {
        hash_dump(&self.dump())
    }

    /// Look up a host by name.
    pub fn host(&self, name: &str) -> Option<&HostSpec> {
        self.hosts.iter().find(|h| h.name == name)
    }

    /// Names of all enabled workloads, in declaration order.
    pub fn enabled_workloads(&self) -> Vec<String> {
        self.workloads
            .iter()
            .filter(|(_, w)| w.enabled)
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Create the output root. Report/export roots are created on demand.
    pub fn ensure_output_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.output_root)
    }
}

/// Sorted-keys SHA-256 of a JSON config dump.
pub fn hash_dump(dump: &serde_json::Value) -> String {
    let mut canonical = String::new();
    write_canonical(dump, &mut canonical);
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    let digest = hasher.finalize();
    let mut out = String::with_capacity(64);
    for byte in digest {
        use std::fmt::Write;
        let _ = write!(out, "{byte:02x}");
    }
    out
}

/// Serialize a JSON value with object keys sorted, so hashing is order-stable.
fn write_canonical(value: &serde_json::Value, out: &mut String) {
    match value {
        serde_json::Value::Object(map) => {
            out.push('{');
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&serde_json::Value::String((*key).clone()).to_string());
                out.push(':');
                if let Some(child) = map.get(*key) {
                    write_canonical(child, out);
                }
            }
            out.push('}');
        }
        serde_json::Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        other => out.push_str(&other.to_string()),
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
