// SPDX-License-Identifier: MIT

//! Pending-work arithmetic over a journal (resume support).

use crate::journal::RunJournal;
use fleetbench_core::HostSpec;
use std::collections::BTreeMap;

/// Hosts that still have at least one pending repetition for a workload.
pub fn pending_hosts_for(
    journal: &RunJournal,
    target_reps: u32,
    workload: &str,
    hosts: &[HostSpec],
    allow_skipped: bool,
) -> Vec<HostSpec> {
    hosts
        .iter()
        .filter(|host| {
            (1..=target_reps).any(|rep| journal.should_run(&host.name, workload, rep, allow_skipped))
        })
        .cloned()
        .collect()
}

/// Per-host pending repetition lists for a workload.
///
/// A listed host with nothing pending still maps to `[1]`: the remote
/// executor's contract requires a non-empty repetition list for every host it
/// is asked to run.
pub fn pending_repetitions(
    journal: &RunJournal,
    target_reps: u32,
    hosts: &[HostSpec],
    workload: &str,
    allow_skipped: bool,
) -> BTreeMap<String, Vec<u32>> {
    hosts
        .iter()
        .map(|host| {
            let reps: Vec<u32> = (1..=target_reps)
                .filter(|&rep| journal.should_run(&host.name, workload, rep, allow_skipped))
                .collect();
            let reps = if reps.is_empty() { vec![1] } else { reps };
            (host.name.clone(), reps)
        })
        .collect()
}

/// Short-circuit check: does anything at all remain to run?
pub fn pending_exists(
    journal: &RunJournal,
    tests: &[String],
    hosts: &[HostSpec],
    repetitions: u32,
    allow_skipped: bool,
) -> bool {
    hosts.iter().any(|host| {
        tests.iter().any(|test| {
            (1..=repetitions).any(|rep| journal.should_run(&host.name, test, rep, allow_skipped))
        })
    })
}

#[cfg(test)]
#[path = "pending_tests.rs"]
mod tests;
