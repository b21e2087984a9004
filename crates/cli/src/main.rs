// SPDX-License-Identifier: MIT

//! fleetbench binary entry point.

use clap::Parser;
use fleetbench::cli::{Cli, Command};
use std::process::ExitCode;

fn main() -> ExitCode {
    // Usage errors exit with code 2 via clap before we get here.
    let cli = Cli::parse();
    let _log_guard = init_tracing();

    let result = match cli.command {
        Command::Run(args) => fleetbench::commands::run::execute(args),
        Command::Resume(args) => fleetbench::commands::resume::execute(args),
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{err}");
            ExitCode::from(err.code)
        }
    }
}

/// Stderr logging with `LB_LOG_LEVEL` filtering (default `info`).
fn init_tracing() -> tracing_appender::non_blocking::WorkerGuard {
    use tracing_subscriber::EnvFilter;
    let (writer, guard) = tracing_appender::non_blocking(std::io::stderr());
    let filter = EnvFilter::try_from_env("LB_LOG_LEVEL").unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .init();
    guard
}
