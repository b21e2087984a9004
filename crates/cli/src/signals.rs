// SPDX-License-Identifier: MIT

//! SIGINT plumbing for the double-interrupt protocol.
//!
//! A dedicated thread iterates incoming signals and routes each through the
//! [`DoubleInterrupt`] decision machine; decisions that need the main thread
//! (warn, confirmed stop) travel over a channel and are drained between
//! `ControllerRunner::wait` calls. `Delegate` re-raises the default SIGINT
//! behavior, so Ctrl+C outside an active run still terminates the process.

use fleetbench_core::{DoubleInterrupt, SigintDecision};
use signal_hook::consts::SIGINT;
use signal_hook::iterator::Signals;
use std::sync::mpsc;
use std::sync::Arc;

/// Interrupt decisions delivered to the supervision loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InterruptEvent {
    /// First press: warn and arm.
    Warn,
    /// Second press: the stop is confirmed.
    ConfirmedStop(String),
}

pub struct SignalGuard {
    handle: signal_hook::iterator::Handle,
    thread: Option<std::thread::JoinHandle<()>>,
}

impl SignalGuard {
    /// Install the SIGINT handler and start the routing thread.
    ///
    /// Signal disposition belongs to the main thread; called from a worker
    /// thread this is a no-op (`Ok(None)`) and the mechanism disables itself.
    pub fn install(
        machine: Arc<DoubleInterrupt>,
        run_active: impl Fn() -> bool + Send + 'static,
        events: mpsc::Sender<InterruptEvent>,
    ) -> std::io::Result<Option<Self>> {
        if std::thread::current().name() != Some("main") {
            return Ok(None);
        }
        let mut signals = Signals::new([SIGINT])?;
        let handle = signals.handle();
        let thread = std::thread::Builder::new()
            .name("sigint-router".to_string())
            .spawn(move || {
                for _signal in signals.forever() {
                    match machine.on_signal(run_active()) {
                        SigintDecision::Delegate => {
                            let _ = signal_hook::low_level::emulate_default_handler(SIGINT);
                        }
                        SigintDecision::WarnArm => {
                            let _ = events.send(InterruptEvent::Warn);
                        }
                        SigintDecision::RequestStop => {
                            let _ = events
                                .send(InterruptEvent::ConfirmedStop("User requested stop".to_string()));
                        }
                        SigintDecision::Ignore => {}
                    }
                }
            })?;
        Ok(Some(Self {
            handle,
            thread: Some(thread),
        }))
    }

    /// Uninstall and restore default signal handling.
    pub fn close(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.handle.close();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for SignalGuard {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
#[path = "signals_tests.rs"]
mod tests;
