// SPDX-License-Identifier: MIT

use super::*;
use fleetbench_core::ControllerState;
use parking_lot::Mutex as PlMutex;

#[derive(Default)]
struct RecordingHooks {
    warnings: PlMutex<Vec<String>>,
    infos: PlMutex<Vec<String>>,
    states: PlMutex<Vec<ControllerState>>,
}

impl RunHooks for RecordingHooks {
    fn on_status(&self, state: ControllerState, _reason: Option<&str>) {
        self.states.lock().push(state);
    }

    fn on_warning(&self, message: &str) {
        self.warnings.lock().push(message.to_string());
    }

    fn on_info(&self, message: &str) {
        self.infos.lock().push(message.to_string());
    }

    fn on_event_line(&self, _line: &str, _source: &str) {}
}

fn write_config(dir: &std::path::Path, extra: &str) -> PathBuf {
    let path = dir.join("config.toml");
    let body = format!(
        r#"
repetitions = 1
output_root = "{out}"
report_root = "{reports}"
data_export_root = "{exports}"
hosts = [{{ name = "h1", address = "127.0.0.1" }}]

[workloads.cpu]
plugin = "p"
{extra}
"#,
        out = dir.join("out").display(),
        reports = dir.join("reports").display(),
        exports = dir.join("exports").display(),
    );
    std::fs::write(&path, body).unwrap();
    path
}

fn request(config: PathBuf) -> RunRequest {
    RunRequest {
        config_path: Some(config),
        skip_connectivity_check: true,
        connectivity_timeout: 1,
        ..RunRequest::default()
    }
}

#[test]
fn no_workloads_selected_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path(), "enabled = false");
    let app = App::new(Arc::new(RecordingHooks::default()));
    let err = app.start_run(request(config)).unwrap_err();
    assert!(matches!(err, AppError::NoWorkloads));
}

#[test]
fn resume_without_previous_run_fails() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path(), "");
    let app = App::new(Arc::new(RecordingHooks::default()));
    let mut req = request(config);
    req.resume = Some("latest".to_string());
    let err = app.start_run(req).unwrap_err();
    assert!(matches!(err, AppError::NoPreviousRun));
}

#[test]
fn resume_with_unknown_id_reports_journal_path() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(dir.path(), "");
    let app = App::new(Arc::new(RecordingHooks::default()));
    let mut req = request(config);
    req.resume = Some("run-19990101-000000".to_string());
    let err = app.start_run(req).unwrap_err();
    match err {
        AppError::Journal(JournalError::Io { path, .. }) => {
            assert!(path.to_string_lossy().contains("run-19990101-000000"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn resolve_target_tests_prefers_explicit_list() {
    let dir = tempfile::tempdir().unwrap();
    let config_path = write_config(dir.path(), "");
    let config = RunConfig::load(&config_path).unwrap();
    let explicit = resolve_target_tests(&config, &["other".to_string()]).unwrap();
    assert_eq!(explicit, vec!["other"]);
    let default = resolve_target_tests(&config, &[]).unwrap();
    assert_eq!(default, vec!["cpu"]);
}

#[test]
fn discover_plugins_picks_up_convention_scripts() {
    let dir = tempfile::tempdir().unwrap();
    let config_path = write_config(dir.path(), "");
    let plugin_dir = dir.path().join("plugins").join("p");
    std::fs::create_dir_all(&plugin_dir).unwrap();
    std::fs::write(plugin_dir.join("setup.sh"), "exit 0\n").unwrap();

    let config = RunConfig::load(&config_path).unwrap();
    let registry = discover_plugins(&config, &request(config_path));
    use fleetbench_adapters::PluginRegistry as _;
    let descriptor = registry.get("p").unwrap();
    assert!(descriptor.setup_script.is_some());
    assert!(descriptor.teardown_script.is_none());
}

#[test]
fn arm_expiry_resets_only_current_generation() {
    let interrupt = Arc::new(DoubleInterrupt::new());
    let generation = Arc::new(AtomicU64::new(0));
    interrupt.on_signal(true);
    schedule_arm_expiry(interrupt.clone(), generation.clone(), Duration::from_millis(20));
    // A confirm invalidates the timer before it fires.
    generation.fetch_add(1, Ordering::SeqCst);
    std::thread::sleep(Duration::from_millis(60));
    assert_eq!(interrupt.state(), fleetbench_core::InterruptState::StopArmed);

    // A fresh timer with no invalidation does reset.
    schedule_arm_expiry(interrupt.clone(), generation.clone(), Duration::from_millis(20));
    std::thread::sleep(Duration::from_millis(60));
    assert_eq!(interrupt.state(), fleetbench_core::InterruptState::Running);
}
