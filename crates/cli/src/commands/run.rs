// SPDX-License-Identifier: MIT

//! `fleetbench run`

use crate::cli::RunArgs;
use crate::exit_error::ExitError;
use crate::hooks::HeadlessHooks;
use crate::{App, RunRequest};
use fleetbench_adapters::ExecutionMode;
use fleetbench_core::{Intensity, RunId};
use std::sync::Arc;

pub fn execute(args: RunArgs) -> Result<(), ExitError> {
    let request = build_request(args)?;
    let app = App::new(Arc::new(HeadlessHooks::new()));
    super::start(&app, request)
}

pub(crate) fn build_request(args: RunArgs) -> Result<RunRequest, ExitError> {
    let intensity = args
        .intensity
        .as_deref()
        .map(|value| {
            Intensity::parse(value)
                .ok_or_else(|| ExitError::usage(format!("invalid intensity: {value}")))
        })
        .transpose()?;
    let execution_mode = ExecutionMode::parse(&args.execution_mode)
        .ok_or_else(|| ExitError::usage(format!("invalid execution mode: {}", args.execution_mode)))?;
    if args.repetitions == Some(0) {
        return Err(ExitError::usage("repetitions must be at least 1"));
    }

    Ok(RunRequest {
        workloads: args.workloads,
        config_path: args.config,
        run_id: args.run_id.map(RunId::new),
        resume: args.resume,
        intensity,
        repetitions: args.repetitions,
        skip_setup: args.no_setup,
        execution_mode,
        node_count: args.node_count,
        stop_file: args.stop_file,
        skip_connectivity_check: args.skip_connectivity_check,
        connectivity_timeout: args.connectivity_timeout,
    })
}

#[cfg(test)]
#[path = "run_tests.rs"]
mod tests;
