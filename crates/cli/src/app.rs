// SPDX-License-Identifier: MIT

//! Application facade: the one entry point UIs drive.
//!
//! `start_run` loads and reconciles configuration, probes connectivity,
//! provisions hosts, wires the event pipeline, and supervises the controller
//! runner from the main thread while pumping interrupt events.

use crate::config_locate::locate_config;
use crate::hooks::RunHooks;
use crate::signals::{InterruptEvent, SignalGuard};
use fleetbench_adapters::{
    check_hosts, ExecutionMode, PluginDescriptor, ProcessExecutor, ProvisionError, Provisioner,
    RemoteExecutor, StaticPluginRegistry, StaticProvisioner,
};
use fleetbench_core::{
    format_elapsed, Clock, ConfigError, ControllerStateMachine, DoubleInterrupt, Intensity,
    RunConfig, RunId, StopToken, SystemClock,
};
use fleetbench_engine::{
    attach_system_info, ControllerRunner, EventPipeline, JsonlTailer, OrchestratorError,
    OutputTee, RunOrchestrator, RunSummary, SessionBuilder, SessionError,
};
use fleetbench_journal::{
    latest_journal, pending_exists, sink::format_event_line, EventLogSink, JournalError,
    RunJournal,
};
use parking_lot::Mutex;
use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{mpsc, Arc};
use std::time::{Duration, Instant};
use thiserror::Error;

/// Poll interval of the supervision loop.
const WAIT_TICK: Duration = Duration::from_millis(200);

/// How long a single Ctrl+C stays armed before it expires.
const ARM_TTL: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Journal(#[from] JournalError),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Orchestrator(#[from] OrchestratorError),
    #[error(transparent)]
    Provision(#[from] ProvisionError),
    #[error("unreachable hosts: {}", unreachable.join(", "))]
    Connectivity { unreachable: Vec<String> },
    #[error("no workloads selected to run")]
    NoWorkloads,
    #[error("no previous run found to resume")]
    NoPreviousRun,
    #[error("run id mismatch: resume journal={journal}, cli={cli}")]
    RunIdMismatch { journal: RunId, cli: RunId },
    #[error("I/O failure: {0}")]
    Io(#[from] std::io::Error),
}

/// Inputs required to execute a run.
#[derive(Debug, Default)]
pub struct RunRequest {
    pub workloads: Vec<String>,
    pub config_path: Option<PathBuf>,
    pub run_id: Option<RunId>,
    /// A run id or "latest".
    pub resume: Option<String>,
    pub intensity: Option<Intensity>,
    pub repetitions: Option<u32>,
    pub skip_setup: bool,
    pub execution_mode: ExecutionMode,
    pub node_count: Option<usize>,
    pub stop_file: Option<PathBuf>,
    pub skip_connectivity_check: bool,
    pub connectivity_timeout: u64,
}

/// Outcome of a run. `summary` is `None` when the run short-circuited
/// because nothing was pending.
#[derive(Debug)]
pub struct RunOutcome {
    pub summary: Option<RunSummary>,
    pub journal_path: PathBuf,
    pub log_path: PathBuf,
    pub ui_log_path: Option<PathBuf>,
}

pub struct App {
    hooks: Arc<dyn RunHooks>,
}

impl App {
    pub fn new(hooks: Arc<dyn RunHooks>) -> Self {
        Self { hooks }
    }

    /// Execute one run end to end. Must be called on the main thread (signal
    /// disposition is installed for the duration of the run).
    pub fn start_run(&self, request: RunRequest) -> Result<RunOutcome, AppError> {
        let mut config = self.resolve_config(&request)?;
        self.apply_overrides(&mut config, &request);

        let test_names = resolve_target_tests(&config, &request.workloads)?;

        let resume_journal = match &request.resume {
            Some(resume) => Some(self.load_resume_journal(resume, &mut config, request.run_id.as_ref())?),
            None => None,
        };
        let resume_requested = resume_journal.is_some();

        if !request.skip_connectivity_check
            && request.execution_mode == ExecutionMode::Remote
            && !config.hosts.is_empty()
        {
            let report = check_hosts(&config.hosts, request.connectivity_timeout);
            if !report.all_reachable() {
                let unreachable = report.unreachable_hosts();
                self.hooks
                    .on_warning(&format!("unreachable hosts: {}", unreachable.join(", ")));
                return Err(AppError::Connectivity { unreachable });
            }
        }

        // Materialize the host list through the provisioner.
        let provisioner = StaticProvisioner::new(config.hosts.clone());
        let provision = provisioner.provision(request.execution_mode, request.node_count.unwrap_or(0))?;
        config.hosts = provision.nodes.clone();

        let state_machine = Arc::new(ControllerStateMachine::new());
        let session = SessionBuilder::new(&config)
            .with_state_machine(state_machine.clone())
            .with_execution_mode(request.execution_mode.to_string())
            .build(&test_names, request.run_id.clone(), resume_journal)?;
        let session = Arc::new(session);

        let journal_path = session.journal.path().to_path_buf();
        let log_path = session.output_root.join("run.log");
        let ui_log_path = session.output_root.join("ui_stream.log");

        // Resume with nothing left to do: report and get out before any
        // remote work is dispatched.
        let has_pending = session.journal.with(|journal| {
            pending_exists(journal, &test_names, &config.hosts, session.target_reps, resume_requested)
        });
        if !has_pending {
            self.hooks
                .on_info("All repetitions already completed; nothing to run.");
            return Ok(RunOutcome {
                summary: None,
                journal_path,
                log_path,
                ui_log_path: None,
            });
        }

        let stop_file = request.stop_file.clone().unwrap_or_else(|| session.stop_file.clone());
        let stop_token = Arc::new(StopToken::with_stop_file(stop_file));

        // Event pipeline: journal sink + coordinator + UI fan-out.
        let sink = EventLogSink::new(session.journal.clone(), Some(&log_path))?;
        let pipeline = Arc::new(EventPipeline::new(
            SystemClock,
            session.run_id.clone(),
            session.target_reps,
            sink,
            session.coordinator.clone(),
        ));
        let ui_log_file = std::fs::File::options()
            .create(true)
            .append(true)
            .open(&ui_log_path)
            .ok()
            .map(Mutex::new);
        {
            let hooks = self.hooks.clone();
            pipeline.set_on_event(move |event, source| {
                let line = format_event_line(event);
                if let Some(file) = &ui_log_file {
                    let _ = writeln!(file.lock(), "{line}");
                }
                hooks.on_event_line(&line, source);
            });
        }

        // Output tee: raw log + stdout marker scan.
        let tee = {
            let pipeline = pipeline.clone();
            Arc::new(OutputTee::new(
                Some(&log_path),
                move |line: &str| pipeline.scan_stdout_line(line),
                None,
            )?)
        };

        let executor = Arc::new(
            ProcessExecutor::new()
                .with_output(tee.as_output_callback())
                .with_event_log(session.output_root.join("run_events.jsonl")),
        );

        let tailer = executor.event_log_path().map(|path| {
            let pipeline = pipeline.clone();
            JsonlTailer::start(path, fleetbench_engine::tailer::DEFAULT_POLL, move |payload| {
                pipeline.accept_tailed_payload(&payload)
            })
        });

        {
            let hooks = self.hooks.clone();
            let executor = executor.clone();
            stop_token.set_on_stop(move || {
                hooks.on_warning("Stop requested; interrupting the current phase");
                executor.interrupt();
            });
        }

        let registry = discover_plugins(&config, &request);
        let orchestrator = RunOrchestrator::new(
            config.clone(),
            executor.clone() as Arc<dyn RemoteExecutor>,
            Arc::new(registry),
            stop_token.clone(),
            SystemClock,
        );

        let runner = {
            let session = session.clone();
            let hooks = self.hooks.clone();
            ControllerRunner::new(
                move || orchestrator.run(&session, resume_requested),
                state_machine.clone(),
                stop_token.clone(),
            )
            .with_on_state_change(move |state, reason| hooks.on_status(state, reason))
        };

        let interrupt = Arc::new(DoubleInterrupt::new());
        let (interrupt_tx, interrupt_rx) = mpsc::channel();
        let guard = {
            let machine = state_machine.clone();
            match SignalGuard::install(interrupt.clone(), move || !machine.is_terminal(), interrupt_tx) {
                Ok(guard) => guard,
                Err(err) => {
                    tracing::warn!(%err, "SIGINT handling unavailable");
                    None
                }
            }
        };

        let started = Instant::now();
        let run_result = self.supervise(&runner, &interrupt, &interrupt_rx);

        interrupt.mark_finished();
        if let Some(guard) = guard {
            guard.close();
        }
        runner.join();
        if let Some(tailer) = tailer {
            tailer.stop();
        }
        tee.flush();

        self.hooks.on_info(&format!(
            "Run {} finished in {}",
            session.run_id,
            format_elapsed(started.elapsed())
        ));

        if stop_token.should_stop() {
            let now = SystemClock.epoch_secs();
            if let Err(err) = session
                .journal
                .with_mut(|journal| journal.fail_running_tasks("stopped", now))
            {
                tracing::warn!(%err, "failed to persist stop aftermath");
            }
            if let Ok(summary) = &run_result {
                let failed = summary.failed_teardowns();
                if !failed.is_empty() {
                    self.hooks.on_warning(&format!(
                        "Teardown failed ({}); remote workloads may still be running.",
                        failed.join(", ")
                    ));
                }
            }
        }

        let host_names: Vec<String> = config.hosts.iter().map(|h| h.name.clone()).collect();
        let summaries = attach_system_info(&session.journal, &session.output_root, &host_names);
        for (host, line) in &summaries {
            self.hooks.on_info(&format!("[system] {host}: {line}"));
        }

        stop_token.restore();

        let summary = run_result?;
        provision.set_keep_nodes(!summary.cleanup_allowed);
        provisioner.destroy(&provision);

        Ok(RunOutcome {
            summary: Some(summary),
            journal_path,
            log_path,
            ui_log_path: Some(ui_log_path),
        })
    }

    /// Pump interrupt events and wait for the runner, 200 ms at a time.
    fn supervise(
        &self,
        runner: &ControllerRunner,
        interrupt: &Arc<DoubleInterrupt>,
        events: &mpsc::Receiver<InterruptEvent>,
    ) -> Result<RunSummary, OrchestratorError> {
        let arm_generation = Arc::new(AtomicU64::new(0));
        loop {
            while let Ok(event) = events.try_recv() {
                match event {
                    InterruptEvent::Warn => {
                        self.hooks.on_warning("Press Ctrl+C again to stop the execution");
                        schedule_arm_expiry(interrupt.clone(), arm_generation.clone(), ARM_TTL);
                    }
                    InterruptEvent::ConfirmedStop(reason) => {
                        // Invalidate any pending expiry timer.
                        arm_generation.fetch_add(1, Ordering::SeqCst);
                        runner.arm_stop(&reason);
                    }
                }
            }
            if let Some(summary) = runner.wait(WAIT_TICK)? {
                return Ok(summary);
            }
        }
    }

    fn resolve_config(&self, request: &RunRequest) -> Result<RunConfig, AppError> {
        match locate_config(request.config_path.as_deref()) {
            Some(path) => {
                let config = RunConfig::load(&path)?;
                self.hooks.on_info(&format!("Loaded config: {}", path.display()));
                Ok(config)
            }
            None => {
                self.hooks
                    .on_warning("No config file found; using built-in defaults.");
                Ok(RunConfig::default())
            }
        }
    }

    fn apply_overrides(&self, config: &mut RunConfig, request: &RunRequest) {
        if request.skip_setup {
            config.remote_execution.run_setup = false;
            config.remote_execution.run_teardown = false;
        }
        if let Some(repetitions) = request.repetitions {
            config.repetitions = repetitions;
            self.hooks
                .on_info(&format!("Using {repetitions} repetitions for this run"));
        }
        if let Some(intensity) = request.intensity {
            for workload in config.workloads.values_mut() {
                workload.intensity = intensity;
            }
            self.hooks
                .on_info(&format!("Global intensity override: {intensity}"));
        }
        if let Err(err) = config.ensure_output_dirs() {
            tracing::warn!(%err, "failed to pre-create output root");
        }
    }

    /// Load the resume journal, reconciling configuration. When the stored
    /// hash disagrees with the local config, the journal's own dump wins
    /// (preserving the operator's current setup/teardown/collect toggles);
    /// without a dump the resume is refused.
    fn load_resume_journal(
        &self,
        resume: &str,
        config: &mut RunConfig,
        cli_run_id: Option<&RunId>,
    ) -> Result<(RunJournal, PathBuf), AppError> {
        let journal_path = if resume == "latest" {
            latest_journal(&config.output_root).ok_or(AppError::NoPreviousRun)?
        } else {
            config.output_root.join(resume).join("run_journal.json")
        };
        let journal = RunJournal::load(&journal_path, None)?;

        let current_hash = config.config_hash();
        if !journal.metadata.config_hash.is_empty() && journal.metadata.config_hash != current_hash {
            match journal.rehydrate_config() {
                Some(mut rehydrated) => {
                    rehydrated.remote_execution.run_setup = config.remote_execution.run_setup;
                    rehydrated.remote_execution.run_teardown = config.remote_execution.run_teardown;
                    rehydrated.remote_execution.run_collect = config.remote_execution.run_collect;
                    self.hooks
                        .on_info("Config changed since the journal was written; using the journal's config.");
                    *config = rehydrated;
                }
                None => {
                    return Err(JournalError::ResumeMismatch {
                        journal_hash: journal.metadata.config_hash.clone(),
                        config_hash: current_hash,
                    }
                    .into());
                }
            }
        }

        if let Some(cli_id) = cli_run_id {
            if journal.run_id != *cli_id {
                return Err(AppError::RunIdMismatch {
                    journal: journal.run_id.clone(),
                    cli: cli_id.clone(),
                });
            }
        }
        Ok((journal, journal_path))
    }
}

fn resolve_target_tests(config: &RunConfig, requested: &[String]) -> Result<Vec<String>, AppError> {
    let tests = if requested.is_empty() {
        config.enabled_workloads()
    } else {
        requested.to_vec()
    };
    if tests.is_empty() {
        return Err(AppError::NoWorkloads);
    }
    Ok(tests)
}

/// Resolve plugin assets by convention: `plugins/<id>/{setup.sh,teardown.sh}`
/// next to the config (falling back to the working directory).
fn discover_plugins(config: &RunConfig, request: &RunRequest) -> StaticPluginRegistry {
    let base = request
        .config_path
        .as_deref()
        .and_then(|p| p.parent())
        .map(|p| p.to_path_buf())
        .unwrap_or_default();
    let mut registry = StaticPluginRegistry::new();
    for workload in config.workloads.values() {
        let plugin_dir = base.join("plugins").join(&workload.plugin);
        if !plugin_dir.is_dir() {
            continue;
        }
        let mut descriptor = PluginDescriptor::named(&workload.plugin);
        let setup = plugin_dir.join("setup.sh");
        if setup.is_file() {
            descriptor = descriptor.with_setup_script(setup);
        }
        let teardown = plugin_dir.join("teardown.sh");
        if teardown.is_file() {
            descriptor = descriptor.with_teardown_script(teardown);
        }
        registry.register(workload.plugin.clone(), descriptor);
    }
    registry
}

/// One-shot timer: clear the armed interrupt after the TTL unless a newer
/// arm/confirm invalidated this generation.
fn schedule_arm_expiry(interrupt: Arc<DoubleInterrupt>, generation: Arc<AtomicU64>, ttl: Duration) {
    let token = generation.fetch_add(1, Ordering::SeqCst) + 1;
    let spawned = std::thread::Builder::new()
        .name("arm-expiry".to_string())
        .spawn(move || {
            std::thread::sleep(ttl);
            if generation.load(Ordering::SeqCst) == token {
                interrupt.reset_arm();
                tracing::info!("stop arm expired without confirmation");
            }
        });
    if spawned.is_err() {
        tracing::warn!("failed to spawn arm-expiry timer");
    }
}

#[cfg(test)]
#[path = "app_tests.rs"]
mod tests;
