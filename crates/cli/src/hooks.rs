// SPDX-License-Identifier: MIT

//! UI hook surface.
//!
//! The controller core never renders anything; everything an interface needs
//! arrives through these callbacks. The bundled implementation prints to
//! stderr; richer front ends (the dashboard) plug in the same way.

use fleetbench_core::ControllerState;

pub trait RunHooks: Send + Sync {
    /// Controller lifecycle changed.
    fn on_status(&self, state: ControllerState, reason: Option<&str>);

    /// Something the operator should act on.
    fn on_warning(&self, message: &str);

    /// Informational progress.
    fn on_info(&self, message: &str);

    /// One formatted progress-event line.
    fn on_event_line(&self, line: &str, source: &str);
}

/// Plain stderr hooks. `LB_HEADLESS_UI` (any non-empty value) silences
/// per-event echo, which scripts and CI logs rarely want.
pub struct HeadlessHooks {
    echo_events: bool,
}

impl HeadlessHooks {
    pub fn new() -> Self {
        Self {
            echo_events: std::env::var("LB_HEADLESS_UI")
                .map(|v| v.is_empty())
                .unwrap_or(true),
        }
    }
}

impl Default for HeadlessHooks {
    fn default() -> Self {
        Self::new()
    }
}

impl RunHooks for HeadlessHooks {
    fn on_status(&self, state: ControllerState, reason: Option<&str>) {
        match reason {
            Some(reason) => eprintln!("[state] {state} ({reason})"),
            None => eprintln!("[state] {state}"),
        }
    }

    fn on_warning(&self, message: &str) {
        eprintln!("[warn] {message}");
    }

    fn on_info(&self, message: &str) {
        eprintln!("[info] {message}");
    }

    fn on_event_line(&self, line: &str, _source: &str) {
        if self.echo_events {
            eprintln!("{line}");
        }
    }
}
