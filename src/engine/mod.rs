// src/engine/mod.rs

//! Orchestration engine for neurodrive.
//!
//! This module ties together:
//! - the [`Orchestrator`] state machine (model switches, teardown, failure
//!   handling),
//! - the runtime event loop that serialises every input onto one
//!   coordination context:
//!   - operator commands from a [`Controller`],
//!   - worker state changes and terminal events,
//!   - environment check results,
//!   - shutdown requests.
//!
//! Worker events are produced on the workers' own tasks but only ever
//! applied here, so the registry and [`OrchestratorState`] need no locking.

use crate::exec::EnvironmentReport;
use crate::types::{ModelKind, WorkerExit, WorkerState};
use crate::worker::{OutputSnapshot, WorkerId};

pub mod classify;
pub mod control;
pub mod orchestrator;
pub mod runtime;

pub use classify::{FailureKind, Outcome};
pub use control::{Assembled, Controller, assemble};
pub use orchestrator::{Orchestrator, OrchestratorState, Phase};
pub use runtime::Runtime;

/// Operator requests (the control surface).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlCommand {
    StartModel(ModelKind),
    StopCurrentModel,
    TestEnvironment,
    SetScriptPath { kind: ModelKind, path: String },
    SetInterpreter(String),
}

/// Errors a worker can report instead of an exit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessError {
    /// The OS refused to launch the process.
    FailedToStart(String),
    /// The process could not be waited on.
    Other(String),
}

/// Events a worker's supervising task reports.
///
/// Per worker: zero or more `StateChanged`, then at most one of `Exited` or
/// `Error`. Workers stopped by the orchestrator report no terminal event.
#[derive(Debug, Clone)]
pub enum WorkerEvent {
    StateChanged {
        id: WorkerId,
        state: WorkerState,
    },
    Exited {
        id: WorkerId,
        exit: WorkerExit,
        output: OutputSnapshot,
    },
    Error {
        id: WorkerId,
        error: ProcessError,
        output: OutputSnapshot,
    },
}

impl WorkerEvent {
    pub fn id(&self) -> WorkerId {
        match self {
            WorkerEvent::StateChanged { id, .. }
            | WorkerEvent::Exited { id, .. }
            | WorkerEvent::Error { id, .. } => *id,
        }
    }
}

/// Events flowing into the runtime loop.
#[derive(Debug, Clone)]
pub enum RuntimeEvent {
    Control(ControlCommand),
    Worker(WorkerEvent),
    /// Result of a `TestEnvironment` request, run off the loop.
    EnvironmentChecked(EnvironmentReport),
    /// Graceful shutdown requested (e.g. Ctrl-C, console `quit`).
    ShutdownRequested,
}

/// Runtime loop options.
#[derive(Debug, Clone, Copy, Default)]
pub struct RuntimeOptions {
    /// Stop the loop once a started model has no live workers left
    /// (used by `neurodrive run`).
    pub exit_when_idle: bool,
}
