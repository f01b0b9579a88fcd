// src/report/mod.rs

//! Status reporting.
//!
//! The orchestrator publishes [`OrchestratorEvent`]s into an [`EventSink`].
//! The [`StatusReporter`] folds them into a [`StatusSnapshot`] that the
//! presentation layer (console, CLI output) observes through a `watch`
//! channel. Data only flows one way: nothing here can reach back into the
//! orchestrator.

use std::fmt;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::engine::FailureKind;
use crate::exec::EnvironmentReport;
use crate::types::ModelKind;
use crate::worker::OutputSnapshot;

/// Everything the orchestrator makes observable.
#[derive(Debug, Clone)]
pub enum OrchestratorEvent {
    ActiveModelChanged(ModelKind),
    /// A start of `kind` begins; sent on every start, even of the same model.
    ModelStarting(ModelKind),
    RunningChanged(bool),
    StatusChanged(String),
    /// A worker slot failed (configuration, launch, crash, non-zero exit).
    ProcessError {
        kind: ModelKind,
        failure: FailureKind,
        exit_code: Option<i32>,
        message: String,
        output: OutputSnapshot,
    },
    /// A worker exited with code 0.
    ProcessFinished {
        kind: ModelKind,
        exit_code: i32,
        output: OutputSnapshot,
    },
    /// Launch went ahead despite a problem (e.g. script not found).
    Warning {
        kind: ModelKind,
        message: String,
    },
    /// A worker was stopped by a teardown. `forced` means the grace period
    /// ran out and the process was killed.
    WorkerStopped {
        kind: ModelKind,
        forced: bool,
    },
    EnvironmentChecked(EnvironmentReport),
}

/// Sending side used by the orchestrator. Never blocks.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: mpsc::UnboundedSender<OrchestratorEvent>,
}

impl EventSink {
    pub fn new(tx: mpsc::UnboundedSender<OrchestratorEvent>) -> Self {
        Self { tx }
    }

    /// Create a sink plus the receiving end.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<OrchestratorEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }

    pub fn publish(&self, event: OrchestratorEvent) {
        if self.tx.send(event).is_err() {
            debug!("status reporter gone; dropping orchestrator event");
        }
    }
}

/// Observable projection of the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusSnapshot {
    pub active_model: ModelKind,
    pub running: bool,
    pub status_message: String,
    /// Most recent error message, cleared whenever a model is selected or
    /// started.
    pub last_error: Option<String>,
}

impl Default for StatusSnapshot {
    fn default() -> Self {
        Self {
            active_model: ModelKind::None,
            running: false,
            status_message: "Ready".to_string(),
            last_error: None,
        }
    }
}

impl StatusSnapshot {
    /// Fold one event into the snapshot. Returns whether anything changed.
    pub fn apply(&mut self, event: &OrchestratorEvent) -> bool {
        let before = self.clone();
        match event {
            OrchestratorEvent::ActiveModelChanged(kind) => {
                self.active_model = *kind;
                self.last_error = None;
            }
            OrchestratorEvent::ModelStarting(_) => self.last_error = None,
            OrchestratorEvent::RunningChanged(running) => self.running = *running,
            OrchestratorEvent::StatusChanged(message) => self.status_message = message.clone(),
            OrchestratorEvent::ProcessError { message, .. } => {
                self.last_error = Some(message.clone());
            }
            OrchestratorEvent::ProcessFinished { .. }
            | OrchestratorEvent::Warning { .. }
            | OrchestratorEvent::WorkerStopped { .. }
            | OrchestratorEvent::EnvironmentChecked(_) => {}
        }
        *self != before
    }

    /// Single human-readable status line.
    pub fn status_line(&self) -> String {
        let run_state = if self.running { "running" } else { "idle" };
        match &self.last_error {
            Some(err) if !self.status_message.contains(err.as_str()) => format!(
                "[{}] {run_state} | {} (last error: {err})",
                self.active_model.label(),
                self.status_message
            ),
            _ => format!(
                "[{}] {run_state} | {}",
                self.active_model.label(),
                self.status_message
            ),
        }
    }
}

impl fmt::Display for StatusSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.status_line())
    }
}

/// Consumes orchestrator events and maintains the [`StatusSnapshot`].
#[derive(Debug)]
pub struct StatusReporter {
    events: mpsc::UnboundedReceiver<OrchestratorEvent>,
    snapshot: watch::Sender<StatusSnapshot>,
}

impl StatusReporter {
    pub fn new(
        events: mpsc::UnboundedReceiver<OrchestratorEvent>,
    ) -> (Self, watch::Receiver<StatusSnapshot>) {
        let (snapshot, rx) = watch::channel(StatusSnapshot::default());
        (Self { events, snapshot }, rx)
    }

    /// Run until the orchestrator drops its sink.
    pub async fn run(mut self) {
        while let Some(event) = self.events.recv().await {
            log_event(&event);
            self.snapshot.send_if_modified(|snapshot| snapshot.apply(&event));
        }
        debug!("status reporter finished (event channel closed)");
    }

    /// Spawn the reporter on the current runtime.
    pub fn spawn(
        events: mpsc::UnboundedReceiver<OrchestratorEvent>,
    ) -> (JoinHandle<()>, watch::Receiver<StatusSnapshot>) {
        let (reporter, rx) = Self::new(events);
        (tokio::spawn(reporter.run()), rx)
    }
}

fn log_event(event: &OrchestratorEvent) {
    match event {
        OrchestratorEvent::ActiveModelChanged(kind) => info!(model = %kind, "active model changed"),
        OrchestratorEvent::ModelStarting(kind) => debug!(model = %kind, "model starting"),
        OrchestratorEvent::RunningChanged(running) => info!(running, "running state changed"),
        OrchestratorEvent::StatusChanged(message) => debug!(%message, "status changed"),
        OrchestratorEvent::ProcessError {
            kind,
            failure,
            exit_code,
            message,
            output,
        } => error!(
            model = %kind,
            failure = failure.as_str(),
            exit_code = ?exit_code,
            stderr = output.last_stderr_line().unwrap_or(""),
            "{message}"
        ),
        OrchestratorEvent::ProcessFinished { kind, exit_code, .. } => {
            info!(model = %kind, exit_code, "worker finished")
        }
        OrchestratorEvent::Warning { kind, message } => warn!(model = %kind, "{message}"),
        OrchestratorEvent::WorkerStopped { kind, forced } => {
            if *forced {
                info!(model = %kind, "worker ignored the stop request and was killed");
            } else {
                debug!(model = %kind, "worker stopped");
            }
        }
        OrchestratorEvent::EnvironmentChecked(report) => {
            info!(success = report.success, "{}", report.summary())
        }
    }
}
