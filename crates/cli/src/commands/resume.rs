// SPDX-License-Identifier: MIT

//! `fleetbench resume`

use crate::cli::ResumeArgs;
use crate::exit_error::ExitError;
use crate::hooks::HeadlessHooks;
use crate::{App, RunRequest};
use std::sync::Arc;

pub fn execute(args: ResumeArgs) -> Result<(), ExitError> {
    let request = RunRequest {
        config_path: args.config,
        resume: Some(args.run_id),
        skip_setup: args.no_setup,
        stop_file: args.stop_file,
        skip_connectivity_check: args.skip_connectivity_check,
        connectivity_timeout: args.connectivity_timeout,
        ..RunRequest::default()
    };
    let app = App::new(Arc::new(HeadlessHooks::new()));
    super::start(&app, request)
}
