// src/engine/control.rs

//! Control surface and wiring.
//!
//! [`Controller`] is the handle the presentation layer uses to talk to the
//! runtime. [`assemble`] builds a runtime, its controller and the event
//! stream for the status reporter in one go.

use tokio::sync::mpsc;

use crate::config::Settings;
use crate::engine::orchestrator::Orchestrator;
use crate::engine::runtime::Runtime;
use crate::engine::{ControlCommand, RuntimeEvent, RuntimeOptions};
use crate::errors::{NeurodriveError, Result};
use crate::exec::WorkerLauncher;
use crate::report::{EventSink, OrchestratorEvent};
use crate::types::ModelKind;

/// Cloneable sender of operator requests.
///
/// Every call only enqueues; outcomes are observed through
/// [`OrchestratorEvent`]s.
#[derive(Debug, Clone)]
pub struct Controller {
    tx: mpsc::UnboundedSender<RuntimeEvent>,
}

impl Controller {
    pub fn new(tx: mpsc::UnboundedSender<RuntimeEvent>) -> Self {
        Self { tx }
    }

    pub fn start_model(&self, kind: ModelKind) -> Result<()> {
        self.command(ControlCommand::StartModel(kind))
    }

    pub fn stop_current_model(&self) -> Result<()> {
        self.command(ControlCommand::StopCurrentModel)
    }

    pub fn test_environment(&self) -> Result<()> {
        self.command(ControlCommand::TestEnvironment)
    }

    pub fn set_script_path(&self, kind: ModelKind, path: impl Into<String>) -> Result<()> {
        self.command(ControlCommand::SetScriptPath {
            kind,
            path: path.into(),
        })
    }

    pub fn set_interpreter(&self, interpreter: impl Into<String>) -> Result<()> {
        self.command(ControlCommand::SetInterpreter(interpreter.into()))
    }

    /// Ask the runtime to stop all workers and exit.
    pub fn shutdown(&self) -> Result<()> {
        self.send(RuntimeEvent::ShutdownRequested)
    }

    fn command(&self, command: ControlCommand) -> Result<()> {
        self.send(RuntimeEvent::Control(command))
    }

    fn send(&self, event: RuntimeEvent) -> Result<()> {
        self.tx
            .send(event)
            .map_err(|_| NeurodriveError::RuntimeClosed)
    }
}

/// Everything [`assemble`] wires together.
#[derive(Debug)]
pub struct Assembled<L: WorkerLauncher> {
    pub runtime: Runtime<L>,
    pub controller: Controller,
    /// Feed for [`StatusReporter`](crate::report::StatusReporter).
    pub events: mpsc::UnboundedReceiver<OrchestratorEvent>,
}

pub fn assemble<L: WorkerLauncher>(
    settings: Settings,
    launcher: L,
    options: RuntimeOptions,
) -> Assembled<L> {
    let (tx, rx) = mpsc::unbounded_channel();
    let (sink, events) = EventSink::channel();

    let orchestrator = Orchestrator::new(settings, launcher, tx.clone(), sink);
    let runtime = Runtime::new(orchestrator, rx, options);

    Assembled {
        runtime,
        controller: Controller::new(tx),
        events,
    }
}
