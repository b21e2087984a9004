// SPDX-License-Identifier: MIT

//! Event ingest pipeline.
//!
//! Progress events converge here from the file tailer, the stdout tee, and
//! direct callbacks. Each non-duplicate event is persisted to the journal,
//! offered to the stop coordinator, and fanned out to the UI hook — in that
//! order.

use crate::coordinator::StopCoordinator;
use crate::dedupe::EventDedupe;
use crate::marker;
use fleetbench_core::{Clock, RunEvent, RunId};
use fleetbench_journal::{EventLogSink, JournalError};
use parking_lot::Mutex;
use std::sync::Arc;

type EventHook = Box<dyn Fn(&RunEvent, &str) + Send + Sync>;

pub struct EventPipeline<C: Clock> {
    clock: C,
    run_id: RunId,
    default_total: u32,
    token: String,
    dedupe: Mutex<EventDedupe>,
    sink: EventLogSink,
    coordinator: Arc<StopCoordinator>,
    on_event: Mutex<Option<EventHook>>,
}

impl<C: Clock> EventPipeline<C> {
    pub fn new(
        clock: C,
        run_id: RunId,
        default_total: u32,
        sink: EventLogSink,
        coordinator: Arc<StopCoordinator>,
    ) -> Self {
        Self {
            clock,
            run_id,
            default_total,
            token: marker::EVENT_TOKEN.to_string(),
            dedupe: Mutex::new(EventDedupe::default()),
            sink,
            coordinator,
            on_event: Mutex::new(None),
        }
    }

    /// Install the UI fan-out hook (called once per accepted event).
    pub fn set_on_event(&self, hook: impl Fn(&RunEvent, &str) + Send + Sync + 'static) {
        *self.on_event.lock() = Some(Box::new(hook));
    }

    /// Ingest one event. Returns whether it was accepted (false = duplicate,
    /// dropped silently).
    pub fn ingest(&self, event: &RunEvent, source: &str) -> Result<bool, JournalError> {
        if !self.dedupe.lock().record(event) {
            return Ok(false);
        }
        self.sink.emit(event, self.clock.epoch_secs())?;
        self.coordinator.process_event(event);
        if let Some(hook) = &*self.on_event.lock() {
            hook(event, source);
        }
        Ok(true)
    }

    /// Ingest a decoded JSON payload (tail/callback sources).
    pub fn ingest_payload(&self, payload: &serde_json::Value, source: &str) -> Result<bool, JournalError> {
        let Some(event) = RunEvent::from_payload(
            payload,
            self.run_id.as_str(),
            self.default_total,
            self.clock.epoch_secs(),
        ) else {
            return Ok(false);
        };
        self.ingest(&event, source)
    }

    /// Scan one stdout line for the marker token. Journal errors here happen
    /// on a sink thread with nowhere to surface; they are logged and the run
    /// continues on the orchestrator's own updates.
    pub fn scan_stdout_line(&self, line: &str) {
        let Some(payload) = marker::extract_event_payload(line, &self.token) else {
            return;
        };
        if let Err(err) = self.ingest_payload(&payload, "stdout") {
            tracing::error!(%err, "failed to persist stdout progress event");
        }
    }

    /// Deliver a tailed event-log payload.
    pub fn accept_tailed_payload(&self, payload: &serde_json::Value) {
        if let Err(err) = self.ingest_payload(payload, "tail") {
            tracing::error!(%err, "failed to persist tailed progress event");
        }
    }
}

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod tests;
