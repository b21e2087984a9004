// SPDX-License-Identifier: MIT

//! Shared scenario fixtures.

#![allow(dead_code)]

use fleetbench_adapters::{FakeExecutor, PluginDescriptor, StaticPluginRegistry};
use fleetbench_core::{
    EventKind, EventStatus, FakeClock, HostSpec, RunConfig, RunEvent, RunId, StopToken,
    WorkloadSpec,
};
use fleetbench_engine::{RunOrchestrator, RunSession, SessionBuilder};
use std::sync::Arc;

pub const RUN_ID: &str = "run-20260101-000000";

/// One scenario's worth of controller wiring over a scripted executor.
pub struct Scenario {
    pub config: RunConfig,
    pub executor: Arc<FakeExecutor>,
    pub stop_token: Arc<StopToken>,
    pub clock: FakeClock,
    registry: StaticPluginRegistry,
    _dir: tempfile::TempDir,
}

impl Scenario {
    pub fn new(hosts: &[&str], workloads: &[&str], repetitions: u32) -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut config = RunConfig::default();
        config.repetitions = repetitions;
        config.output_root = dir.path().join("out");
        config.report_root = dir.path().join("reports");
        config.data_export_root = dir.path().join("exports");
        config.timeouts.stop_secs = 5.0;
        config.hosts = hosts
            .iter()
            .map(|name| HostSpec::builder().name(*name).build())
            .collect();
        for workload in workloads {
            config
                .workloads
                .insert(workload.to_string(), WorkloadSpec::builder().plugin("p").build());
        }

        let mut registry = StaticPluginRegistry::new();
        registry.register(
            "p",
            PluginDescriptor::named("plugin-p")
                .with_setup_script("plugins/p/setup.sh")
                .with_teardown_script("plugins/p/teardown.sh"),
        );

        Self {
            config,
            executor: Arc::new(FakeExecutor::new()),
            stop_token: Arc::new(StopToken::new()),
            clock: FakeClock::new(),
            registry,
            _dir: dir,
        }
    }

    pub fn session(&self, tests: &[&str]) -> RunSession {
        let tests: Vec<String> = tests.iter().map(|t| t.to_string()).collect();
        SessionBuilder::new(&self.config)
            .build(&tests, Some(RunId::new(RUN_ID)), None)
            .expect("session")
    }

    pub fn orchestrator(&self) -> RunOrchestrator<FakeClock> {
        RunOrchestrator::new(
            self.config.clone(),
            self.executor.clone(),
            Arc::new(self.registry.clone()),
            self.stop_token.clone(),
            self.clock.clone(),
        )
    }
}

/// A wire-shaped progress event.
pub fn event(host: &str, workload: &str, repetition: u32, status: EventStatus) -> RunEvent {
    RunEvent {
        run_id: RUN_ID.to_string(),
        host: host.to_string(),
        workload: workload.to_string(),
        repetition,
        total_repetitions: 3,
        status,
        message: String::new(),
        kind: EventKind::Status,
        level: "INFO".to_string(),
        error_type: None,
        error_context: None,
        timestamp: 0.0,
    }
}
