// SPDX-License-Identifier: MIT

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! fleetbench: Command-line front end for the benchmark controller

pub mod app;
pub mod cli;
pub mod commands;
pub mod config_locate;
pub mod exit_error;
pub mod hooks;
pub mod signals;

pub use app::{App, AppError, RunOutcome, RunRequest};
pub use exit_error::ExitError;
pub use hooks::{HeadlessHooks, RunHooks};
