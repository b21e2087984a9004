// SPDX-License-Identifier: MIT

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! fleetbench-engine: The controller engine
//!
//! Run-lifecycle sequencing, the distributed stop protocol, and the event
//! pipeline that feeds progress from remote runners into the journal.

pub mod builder;
pub mod coordinator;
pub mod dedupe;
pub mod marker;
pub mod orchestrator;
pub mod pipeline;
pub mod runner;
pub mod session;
pub mod summary;
pub mod sysinfo;
pub mod tailer;
pub mod tee;

pub use builder::{SessionBuilder, SessionError};
pub use coordinator::{StopCoordinator, StopState};
pub use dedupe::EventDedupe;
pub use marker::{extract_event_payload, EVENT_TOKEN};
pub use orchestrator::{OrchestratorError, RunOrchestrator};
pub use pipeline::EventPipeline;
pub use runner::ControllerRunner;
pub use session::RunSession;
pub use summary::RunSummary;
pub use sysinfo::attach_system_info;
pub use tailer::JsonlTailer;
pub use tee::OutputTee;
