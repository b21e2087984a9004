// SPDX-License-Identifier: MIT

//! Workload plugin registry seam.
//!
//! Workloads are opaque to the controller; a plugin id resolves to the assets
//! the orchestrator needs (setup/teardown scripts, package requirements,
//! per-phase extravars).

use std::collections::BTreeMap;
use std::path::PathBuf;

/// Assets and requirements one plugin contributes to a run.
#[derive(Debug, Clone, Default)]
pub struct PluginDescriptor {
    pub name: String,
    pub required_apt_packages: Vec<String>,
    pub setup_script: Option<PathBuf>,
    pub teardown_script: Option<PathBuf>,
    pub setup_extravars: serde_json::Map<String, serde_json::Value>,
    pub teardown_extravars: serde_json::Map<String, serde_json::Value>,
    pub required_uv_extras: Vec<String>,
}

impl PluginDescriptor {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_setup_script(mut self, script: impl Into<PathBuf>) -> Self {
        self.setup_script = Some(script.into());
        self
    }

    pub fn with_teardown_script(mut self, script: impl Into<PathBuf>) -> Self {
        self.teardown_script = Some(script.into());
        self
    }
}

/// Resolves plugin ids to descriptors.
pub trait PluginRegistry: Send + Sync {
    fn get(&self, plugin_id: &str) -> Option<PluginDescriptor>;
    fn available(&self) -> BTreeMap<String, PluginDescriptor>;
}

/// In-memory registry assembled at startup.
#[derive(Debug, Clone, Default)]
pub struct StaticPluginRegistry {
    plugins: BTreeMap<String, PluginDescriptor>,
}

impl StaticPluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, id: impl Into<String>, descriptor: PluginDescriptor) {
        self.plugins.insert(id.into(), descriptor);
    }
}

impl PluginRegistry for StaticPluginRegistry {
    fn get(&self, plugin_id: &str) -> Option<PluginDescriptor> {
        self.plugins.get(plugin_id).cloned()
    }

    fn available(&self) -> BTreeMap<String, PluginDescriptor> {
        self.plugins.clone()
    }
}

#[cfg(test)]
#[path = "plugins_tests.rs"]
mod tests;
