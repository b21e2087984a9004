// SPDX-License-Identifier: MIT

//! Provisioner seam.
//!
//! The controller consumes a resolved host list; how those hosts come to
//! exist (bare remote, docker containers, lightweight VMs) is external.

use fleetbench_core::HostSpec;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;

/// How run hosts are materialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutionMode {
    #[default]
    Remote,
    Docker,
    Vm,
}

fleetbench_core::simple_display! {
    ExecutionMode {
        Remote => "remote",
        Docker => "docker",
        Vm => "vm",
    }
}

impl ExecutionMode {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "remote" => Some(Self::Remote),
            "docker" => Some(Self::Docker),
            "vm" => Some(Self::Vm),
            _ => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("provisioning failed: {0}")]
    Failed(String),
    #[error("no hosts available for mode {mode}")]
    NoHosts { mode: ExecutionMode },
}

/// Materialized node set for a run.
#[derive(Clone)]
pub struct ProvisionResult {
    pub nodes: Vec<HostSpec>,
    keep_nodes: Arc<AtomicBool>,
}

impl ProvisionResult {
    pub fn new(nodes: Vec<HostSpec>) -> Self {
        Self {
            nodes,
            keep_nodes: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Retain the nodes after the run (set when cleanup is not allowed, so a
    /// failed run can be inspected).
    pub fn set_keep_nodes(&self, keep: bool) {
        self.keep_nodes.store(keep, Ordering::SeqCst);
    }

    pub fn keep_nodes(&self) -> bool {
        self.keep_nodes.load(Ordering::SeqCst)
    }
}

/// External capability that creates hosts for a run.
pub trait Provisioner: Send + Sync {
    fn provision(&self, mode: ExecutionMode, count: usize) -> Result<ProvisionResult, ProvisionError>;

    /// Destroy provisioned nodes, honoring `keep_nodes`.
    fn destroy(&self, result: &ProvisionResult);
}

/// Pass-through provisioner: remote mode returns the configured hosts.
pub struct StaticProvisioner {
    hosts: Vec<HostSpec>,
}

impl StaticProvisioner {
    pub fn new(hosts: Vec<HostSpec>) -> Self {
        Self { hosts }
    }
}

impl Provisioner for StaticProvisioner {
    fn provision(&self, mode: ExecutionMode, count: usize) -> Result<ProvisionResult, ProvisionError> {
        if self.hosts.is_empty() {
            return Err(ProvisionError::NoHosts { mode });
        }
        let count = if count == 0 { self.hosts.len() } else { count };
        Ok(ProvisionResult::new(
            self.hosts.iter().take(count).cloned().collect(),
        ))
    }

    fn destroy(&self, result: &ProvisionResult) {
        if result.keep_nodes() {
            tracing::info!("keeping provisioned nodes for inspection");
        }
    }
}

#[cfg(test)]
#[path = "provision_tests.rs"]
mod tests;
