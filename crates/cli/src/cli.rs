// SPDX-License-Identifier: MIT

//! Command-line argument surface.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "fleetbench", version, about = "Distributed benchmark orchestrator")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Plan and execute benchmark workloads across the fleet
    Run(RunArgs),
    /// Resume an interrupted run from its journal (re-runs all
    /// non-completed repetitions)
    Resume(ResumeArgs),
}

#[derive(Debug, Args, Default)]
pub struct RunArgs {
    /// Workloads to run (default: every enabled workload in the config)
    pub workloads: Vec<String>,

    /// Configuration file (TOML)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Explicit run identifier (default: generated run-YYYYMMDD-HHMMSS)
    #[arg(long, value_name = "ID")]
    pub run_id: Option<String>,

    /// Resume a previous run: a run id, or "latest"
    #[arg(long, value_name = "ID|latest")]
    pub resume: Option<String>,

    /// Override the intensity of every workload
    #[arg(long, value_name = "low|medium|high")]
    pub intensity: Option<String>,

    /// Override the number of repetitions per (host, workload)
    #[arg(long, value_name = "N")]
    pub repetitions: Option<u32>,

    /// Skip global setup (implies skipping global teardown)
    #[arg(long)]
    pub no_setup: bool,

    /// How run hosts are materialized
    #[arg(long, value_name = "remote|docker|vm", default_value = "remote")]
    pub execution_mode: String,

    /// Number of nodes to provision (default: all configured hosts)
    #[arg(long, value_name = "N")]
    pub node_count: Option<usize>,

    /// Stop sentinel path (default: STOP next to the run journal)
    #[arg(long, value_name = "PATH")]
    pub stop_file: Option<PathBuf>,

    /// Skip the SSH connectivity pre-flight
    #[arg(long)]
    pub skip_connectivity_check: bool,

    /// Per-host connectivity probe timeout in seconds
    #[arg(long, value_name = "SEC", default_value_t = 10)]
    pub connectivity_timeout: u64,
}

#[derive(Debug, Args)]
pub struct ResumeArgs {
    /// Run id to resume, or "latest"
    pub run_id: String,

    /// Configuration file (TOML)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Skip global setup (implies skipping global teardown)
    #[arg(long)]
    pub no_setup: bool,

    /// Stop sentinel path (default: STOP next to the run journal)
    #[arg(long, value_name = "PATH")]
    pub stop_file: Option<PathBuf>,

    /// Skip the SSH connectivity pre-flight
    #[arg(long)]
    pub skip_connectivity_check: bool,

    /// Per-host connectivity probe timeout in seconds
    #[arg(long, value_name = "SEC", default_value_t = 10)]
    pub connectivity_timeout: u64,
}

#[cfg(test)]
#[path = "cli_tests.rs"]
mod tests;
