// src/engine/orchestrator.rs

//! The model-switching state machine.
//!
//! The orchestrator owns the [`Registry`] and the [`OrchestratorState`]. It
//! is only ever driven from the runtime loop, one input at a time, so it
//! needs no locking. The only await points are teardowns, which are bounded
//! by the grace period plus the kill timeout.

use std::collections::HashSet;
use std::fmt;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::Settings;
use crate::engine::classify::{Outcome, classify_configuration, classify_error, classify_exit};
use crate::engine::{ControlCommand, RuntimeEvent, WorkerEvent};
use crate::exec::{EnvironmentReport, WorkerLauncher, check_interpreter};
use crate::report::{EventSink, OrchestratorEvent};
use crate::types::{ModelKind, WorkerState};
use crate::worker::{OutputSnapshot, Registry, WorkerId, descriptors_for};

/// Observable orchestrator fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrchestratorState {
    /// Last explicitly requested model, kept after its workers exit.
    pub active_model: ModelKind,
    /// True iff at least one registered worker is `Running`.
    pub aggregate_running: bool,
    pub status_message: String,
    pub interpreter: String,
}

impl OrchestratorState {
    fn new(interpreter: impl Into<String>) -> Self {
        Self {
            active_model: ModelKind::None,
            aggregate_running: false,
            status_message: "Ready".to_string(),
            interpreter: interpreter.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    /// Workers were launched but none has reported `Running` yet.
    Starting(ModelKind),
    Active(ModelKind),
    Stopping,
}

pub struct Orchestrator<L: WorkerLauncher> {
    settings: Settings,
    launcher: L,
    registry: Registry,
    state: OrchestratorState,
    phase: Phase,
    /// Handed to launched workers and probe tasks; events come back through
    /// the runtime loop.
    worker_tx: mpsc::UnboundedSender<RuntimeEvent>,
    sink: EventSink,
    next_seq: u64,
    /// Workers that were already terminal when a teardown removed them but
    /// whose terminal event had not been consumed yet.
    unreported: HashSet<WorkerId>,
}

impl<L: WorkerLauncher> fmt::Debug for Orchestrator<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Orchestrator")
            .field("state", &self.state)
            .field("phase", &self.phase)
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

impl<L: WorkerLauncher> Orchestrator<L> {
    pub fn new(
        settings: Settings,
        launcher: L,
        worker_tx: mpsc::UnboundedSender<RuntimeEvent>,
        sink: EventSink,
    ) -> Self {
        let state = OrchestratorState::new(settings.interpreter());
        Self {
            settings,
            launcher,
            registry: Registry::new(),
            state,
            phase: Phase::Idle,
            worker_tx,
            sink,
            next_seq: 0,
            unreported: HashSet::new(),
        }
    }

    pub fn state(&self) -> &OrchestratorState {
        &self.state
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// No workers left and no terminal events outstanding.
    pub fn is_idle(&self) -> bool {
        self.phase == Phase::Idle && self.registry.is_empty() && self.unreported.is_empty()
    }

    /// Apply one operator command.
    pub async fn apply(&mut self, command: ControlCommand) {
        debug!(?command, "applying control command");
        match command {
            ControlCommand::StartModel(kind) => self.start_model(kind).await,
            ControlCommand::StopCurrentModel => self.stop_current_model().await,
            ControlCommand::TestEnvironment => self.test_environment(),
            ControlCommand::SetScriptPath { kind, path } => self.set_script_path(kind, path),
            ControlCommand::SetInterpreter(name) => self.set_interpreter(name),
        }
    }

    /// Switch to `kind`: tear down whatever runs, then launch every slot the
    /// model needs. Slots that fail do not prevent the others.
    pub async fn start_model(&mut self, kind: ModelKind) {
        self.teardown().await;
        self.set_active_model(kind);

        if kind == ModelKind::None {
            self.set_status("Invalid model selected");
            self.phase = Phase::Idle;
            return;
        }

        info!(model = %kind, "starting model");
        self.phase = Phase::Starting(kind);
        self.sink.publish(OrchestratorEvent::ModelStarting(kind));

        let mut launched = 0usize;
        for (slot, descriptor) in descriptors_for(kind, &self.settings) {
            let descriptor = match descriptor {
                Ok(descriptor) => descriptor,
                Err(err) => {
                    warn!(model = %kind, slot = %slot, error = %err, "cannot build worker");
                    self.report(classify_configuration(slot, &err), OutputSnapshot::default());
                    continue;
                }
            };

            let id = self.next_id(slot);
            let handle = self.launcher.launch(descriptor, id, self.worker_tx.clone());

            for warning in handle.warnings() {
                self.sink.publish(OrchestratorEvent::Warning {
                    kind: slot,
                    message: warning.clone(),
                });
            }

            // A rejected launch stays registered until its error event is
            // consumed, so the error is reported like any other outcome.
            if handle.state() != WorkerState::FailedToStart {
                launched += 1;
            }

            if let Err(rejected) = self.registry.insert(handle) {
                let err = rejected.error();
                let mut handle = rejected.handle;
                warn!(worker = %handle.id(), error = %err, "slot still occupied; discarding new worker");
                handle.terminate(self.settings.grace_period()).await;
                launched = launched.saturating_sub(1);
                self.report(classify_configuration(slot, &err), OutputSnapshot::default());
            }
        }

        if launched == 0 {
            debug!(model = %kind, "no worker could be launched");
            self.phase = Phase::Idle;
        } else {
            self.set_status(format!("{} started", kind.label()));
        }
        self.recompute_running();
    }

    /// Tear everything down and reset to `None`. Safe to call at any time.
    pub async fn stop_current_model(&mut self) {
        self.teardown().await;
        self.set_active_model(ModelKind::None);
        self.recompute_running();
        self.set_status("Model stopped");
        self.phase = Phase::Idle;
    }

    /// Apply an event a worker reported.
    pub fn handle_worker_event(&mut self, event: WorkerEvent) {
        let id = event.id();
        if !self.registry.is_current(id) {
            if event_is_terminal(&event) && self.unreported.remove(&id) {
                // Still owed to observers, but the model it belonged to is
                // gone, so state and status stay untouched.
                if let Some(outcome) = terminal_outcome(&event) {
                    self.publish_outcome(&outcome, event_output(&event));
                }
            } else {
                debug!(worker = %id, "ignoring event from retired worker");
            }
            return;
        }

        match event {
            WorkerEvent::StateChanged { id, state } => {
                debug!(worker = %id, %state, "worker state changed");
                if state == WorkerState::Running {
                    if let Phase::Starting(kind) = self.phase {
                        self.phase = Phase::Active(kind);
                    }
                }
                self.recompute_running();
            }
            WorkerEvent::Exited { id, exit, output } => {
                self.finish_worker(id, classify_exit(id.kind, exit), output);
            }
            WorkerEvent::Error { id, error, output } => {
                self.finish_worker(id, classify_error(id.kind, &error), output);
            }
        }
    }

    /// Run the interpreter check off the loop; the result comes back as
    /// [`RuntimeEvent::EnvironmentChecked`].
    pub fn test_environment(&self) {
        let interpreter = self.settings.interpreter().to_string();
        let limit = self.settings.probe_timeout();
        let tx = self.worker_tx.clone();
        info!(%interpreter, "testing environment");

        tokio::spawn(async move {
            let report = check_interpreter(&interpreter, limit).await;
            if tx.send(RuntimeEvent::EnvironmentChecked(report)).is_err() {
                debug!("runtime gone before environment check finished");
            }
        });
    }

    pub fn record_environment(&mut self, report: EnvironmentReport) {
        let summary = report.summary();
        self.sink.publish(OrchestratorEvent::EnvironmentChecked(report));
        self.set_status(summary);
    }

    /// Takes effect on the next start; running workers keep their
    /// descriptor.
    pub fn set_script_path(&mut self, kind: ModelKind, path: String) {
        if kind == ModelKind::None {
            warn!("ignoring script path for the empty model");
            self.sink.publish(OrchestratorEvent::Warning {
                kind,
                message: "cannot set a script path for no model".to_string(),
            });
            return;
        }
        info!(model = %kind, %path, "script path updated");
        self.settings.set_script_path(kind, path);
    }

    pub fn set_interpreter(&mut self, interpreter: String) {
        info!(%interpreter, "interpreter updated");
        self.settings.set_interpreter(interpreter.clone());
        self.state.interpreter = interpreter;
    }

    /// Stop every worker before the runtime exits.
    pub async fn shutdown(&mut self) {
        info!("shutting down orchestrator");
        self.teardown().await;
        self.recompute_running();
        self.phase = Phase::Idle;
    }

    async fn teardown(&mut self) {
        if self.registry.is_empty() {
            return;
        }
        self.phase = Phase::Stopping;

        let live: HashSet<WorkerId> = self.registry.all_live().map(|h| h.id()).collect();
        debug!(workers = live.len(), "tearing down workers");

        let reports = self
            .registry
            .terminate_all(self.settings.grace_period())
            .await;

        for report in reports {
            if !live.contains(&report.id) {
                self.unreported.insert(report.id);
                continue;
            }
            if report.forced {
                info!(
                    worker = %report.id,
                    grace_ms = self.settings.grace_period().as_millis() as u64,
                    "teardown timeout; worker was killed"
                );
            }
            self.sink.publish(OrchestratorEvent::WorkerStopped {
                kind: report.id.kind,
                forced: report.forced,
            });
        }

        self.recompute_running();
        self.phase = Phase::Idle;
    }

    fn finish_worker(&mut self, id: WorkerId, outcome: Outcome, output: OutputSnapshot) {
        self.registry.reap(id);
        self.publish_outcome(&outcome, output);
        self.set_status(outcome.status_message());
        self.recompute_running();

        if !self.registry.any_live() {
            debug!(worker = %id, "no live workers left");
            self.phase = Phase::Idle;
        }
    }

    fn report(&mut self, outcome: Outcome, output: OutputSnapshot) {
        self.publish_outcome(&outcome, output);
        self.set_status(outcome.status_message());
    }

    fn publish_outcome(&self, outcome: &Outcome, output: OutputSnapshot) {
        let event = match outcome.clone() {
            Outcome::Completed { kind, exit_code } => OrchestratorEvent::ProcessFinished {
                kind,
                exit_code,
                output,
            },
            Outcome::Failed {
                kind,
                failure,
                exit_code,
                message,
            } => OrchestratorEvent::ProcessError {
                kind,
                failure,
                exit_code,
                message,
                output,
            },
        };
        self.sink.publish(event);
    }

    fn set_active_model(&mut self, kind: ModelKind) {
        if self.state.active_model != kind {
            self.state.active_model = kind;
            self.sink.publish(OrchestratorEvent::ActiveModelChanged(kind));
        }
    }

    fn set_status(&mut self, message: impl Into<String>) {
        let message = message.into();
        self.state.status_message = message.clone();
        self.sink.publish(OrchestratorEvent::StatusChanged(message));
    }

    fn recompute_running(&mut self) {
        let running = self.registry.any_running();
        if self.state.aggregate_running != running {
            self.state.aggregate_running = running;
            self.sink.publish(OrchestratorEvent::RunningChanged(running));
        }
    }

    fn next_id(&mut self, kind: ModelKind) -> WorkerId {
        self.next_seq += 1;
        WorkerId::new(kind, self.next_seq)
    }
}

fn event_is_terminal(event: &WorkerEvent) -> bool {
    !matches!(event, WorkerEvent::StateChanged { .. })
}

fn terminal_outcome(event: &WorkerEvent) -> Option<Outcome> {
    match event {
        WorkerEvent::StateChanged { .. } => None,
        WorkerEvent::Exited { id, exit, .. } => Some(classify_exit(id.kind, *exit)),
        WorkerEvent::Error { id, error, .. } => Some(classify_error(id.kind, error)),
    }
}

fn event_output(event: &WorkerEvent) -> OutputSnapshot {
    match event {
        WorkerEvent::StateChanged { .. } => OutputSnapshot::default(),
        WorkerEvent::Exited { output, .. } | WorkerEvent::Error { output, .. } => output.clone(),
    }
}
