// SPDX-License-Identifier: MIT

//! SSH connectivity pre-flight.
//!
//! A fast batch-mode `ssh … echo ok` per host avoids waiting out the remote
//! executor's much longer timeouts when a host is simply unreachable.

use fleetbench_core::HostSpec;
use std::process::Command;
use std::time::Instant;

/// Probe outcome for one host.
#[derive(Debug, Clone)]
pub struct HostProbe {
    pub name: String,
    pub address: String,
    pub reachable: bool,
    pub latency_ms: Option<f64>,
    pub error: Option<String>,
}

/// Aggregated probe outcomes.
#[derive(Debug, Clone, Default)]
pub struct ConnectivityReport {
    pub results: Vec<HostProbe>,
    pub timeout_secs: u64,
}

impl ConnectivityReport {
    pub fn all_reachable(&self) -> bool {
        self.results.iter().all(|r| r.reachable)
    }

    pub fn unreachable_hosts(&self) -> Vec<String> {
        self.results
            .iter()
            .filter(|r| !r.reachable)
            .map(|r| r.name.clone())
            .collect()
    }

    pub fn reachable_count(&self) -> usize {
        self.results.iter().filter(|r| r.reachable).count()
    }
}

/// Probe every host, sequentially (the per-host timeout bounds the total).
pub fn check_hosts(hosts: &[HostSpec], timeout_secs: u64) -> ConnectivityReport {
    ConnectivityReport {
        results: hosts.iter().map(|h| check_host(h, timeout_secs)).collect(),
        timeout_secs,
    }
}

fn check_host(host: &HostSpec, timeout_secs: u64) -> HostProbe {
    let started = Instant::now();
    let output = Command::new("ssh")
        .args([
            "-o",
            "BatchMode=yes",
            "-o",
            &format!("ConnectTimeout={timeout_secs}"),
            "-o",
            "StrictHostKeyChecking=accept-new",
            "-p",
            &host.port.to_string(),
            &format!("{}@{}", host.user, host.address),
            "echo ok",
        ])
        .output();

    let latency_ms = started.elapsed().as_secs_f64() * 1000.0;
    match output {
        Ok(output) if output.status.success() => HostProbe {
            name: host.name.clone(),
            address: host.address.clone(),
            reachable: true,
            latency_ms: Some(latency_ms),
            error: None,
        },
        Ok(output) => HostProbe {
            name: host.name.clone(),
            address: host.address.clone(),
            reachable: false,
            latency_ms: None,
            error: Some(String::from_utf8_lossy(&output.stderr).trim().to_string()),
        },
        Err(err) => HostProbe {
            name: host.name.clone(),
            address: host.address.clone(),
            reachable: false,
            latency_ms: None,
            error: Some(err.to_string()),
        },
    }
}

#[cfg(test)]
#[path = "connectivity_tests.rs"]
mod tests;
