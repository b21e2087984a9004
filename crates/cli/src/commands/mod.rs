// SPDX-License-Identifier: MIT

//! Subcommand implementations.

pub mod resume;
pub mod run;

use crate::exit_error::ExitError;
use crate::{App, AppError, RunOutcome};

/// Map a finished run to the process exit contract: 0 success, 1 failure or
/// stop-failed.
pub(crate) fn outcome_to_exit(outcome: RunOutcome) -> Result<(), ExitError> {
    match outcome.summary {
        None => Ok(()),
        Some(summary) if summary.success => Ok(()),
        Some(summary) => Err(ExitError::failure(format!(
            "run {} ended in {} (journal: {})",
            summary.run_id,
            summary.controller_state,
            outcome.journal_path.display()
        ))),
    }
}

pub(crate) fn app_error_to_exit(err: AppError) -> ExitError {
    ExitError::failure(err.to_string())
}

pub(crate) fn start(app: &App, request: crate::RunRequest) -> Result<(), ExitError> {
    match app.start_run(request) {
        Ok(outcome) => outcome_to_exit(outcome),
        Err(err) => Err(app_error_to_exit(err)),
    }
}
