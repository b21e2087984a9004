// SPDX-License-Identifier: MIT

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! fleetbench-adapters: Seams to the world outside the controller
//!
//! The controller treats remote execution, workload plugins, provisioning,
//! and connectivity probing as capabilities behind traits. This crate defines
//! those traits plus the default process-based implementations.

pub mod connectivity;
pub mod executor;
pub mod plugins;
pub mod provision;

pub use connectivity::{check_hosts, ConnectivityReport, HostProbe};
pub use executor::{
    ExecStatus, ExecutionResult, ExecutorError, Inventory, OutputCallback, ProcessExecutor,
    RemoteExecutor, ScriptRequest,
};
#[cfg(any(test, feature = "test-support"))]
pub use executor::fake::{FakeExecutor, ScriptedCall};
pub use plugins::{PluginDescriptor, PluginRegistry, StaticPluginRegistry};
pub use provision::{
    ExecutionMode, ProvisionError, ProvisionResult, Provisioner, StaticProvisioner,
};
