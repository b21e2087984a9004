// SPDX-License-Identifier: MIT

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! fleetbench-core: Data model and state machines for the fleetbench controller

pub mod macros;

pub mod clock;
pub mod config;
pub mod event;
pub mod interrupt;
pub mod run_id;
pub mod state;
pub mod stop;
pub mod time_fmt;

pub use clock::{Clock, SystemClock};
#[cfg(any(test, feature = "test-support"))]
pub use clock::FakeClock;
pub use config::{
    CollectorsConfig, ConfigError, HostSpec, Intensity, RemoteExecutionConfig, RunConfig,
    TimeoutsConfig, WorkloadSpec,
};
pub use event::{EventKey, EventKind, EventStatus, RunEvent};
pub use interrupt::{DoubleInterrupt, InterruptState, SigintDecision};
pub use run_id::RunId;
pub use state::{ControllerState, ControllerStateMachine, InvalidTransition};
pub use stop::StopToken;
pub use time_fmt::format_elapsed;
