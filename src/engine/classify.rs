// src/engine/classify.rs

//! Pure failure classification for worker outcomes.
//!
//! Maps what a worker reported (exit, launch error, configuration error) to
//! an [`Outcome`] and the status line the operator sees. No Tokio, no IO.

use crate::engine::ProcessError;
use crate::errors::NeurodriveError;
use crate::types::{ExitKind, ModelKind, WorkerExit};

/// Failure categories surfaced to the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Script path (or interpreter) missing; detected before spawn.
    Configuration,
    /// The process could not be launched.
    Launch,
    /// The process ended abnormally (signal) without being asked to.
    RuntimeCrash,
    /// The process exited normally with a non-zero code, or could not be
    /// waited on.
    RuntimeFailure,
}

impl FailureKind {
    pub fn as_str(self) -> &'static str {
        match self {
            FailureKind::Configuration => "configuration",
            FailureKind::Launch => "launch",
            FailureKind::RuntimeCrash => "crash",
            FailureKind::RuntimeFailure => "failure",
        }
    }
}

/// Terminal outcome of one worker slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Completed {
        kind: ModelKind,
        exit_code: i32,
    },
    Failed {
        kind: ModelKind,
        failure: FailureKind,
        exit_code: Option<i32>,
        message: String,
    },
}

impl Outcome {
    pub fn kind(&self) -> ModelKind {
        match self {
            Outcome::Completed { kind, .. } | Outcome::Failed { kind, .. } => *kind,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Outcome::Failed { .. })
    }

    pub fn status_message(&self) -> String {
        match self {
            Outcome::Completed { kind, exit_code } => {
                format!("{} finished with exit code {exit_code}", kind.label())
            }
            Outcome::Failed { message, .. } => format!("Error: {message}"),
        }
    }
}

/// Classify a process that ended on its own.
pub fn classify_exit(kind: ModelKind, exit: WorkerExit) -> Outcome {
    match exit.kind {
        ExitKind::Normal if exit.code == 0 => Outcome::Completed {
            kind,
            exit_code: 0,
        },
        ExitKind::Normal => Outcome::Failed {
            kind,
            failure: FailureKind::RuntimeFailure,
            exit_code: Some(exit.code),
            message: format!("{} exited with code {}", kind.label(), exit.code),
        },
        ExitKind::Abnormal => Outcome::Failed {
            kind,
            failure: FailureKind::RuntimeCrash,
            exit_code: None,
            message: format!("{} crashed", kind.label()),
        },
    }
}

/// Classify an error reported instead of an exit.
pub fn classify_error(kind: ModelKind, error: &ProcessError) -> Outcome {
    match error {
        ProcessError::FailedToStart(reason) => Outcome::Failed {
            kind,
            failure: FailureKind::Launch,
            exit_code: None,
            message: format!("{} failed to start ({reason})", kind.label()),
        },
        ProcessError::Other(reason) => Outcome::Failed {
            kind,
            failure: FailureKind::RuntimeFailure,
            exit_code: None,
            message: format!("{} process error ({reason})", kind.label()),
        },
    }
}

/// Classify a descriptor that could not be built.
pub fn classify_configuration(kind: ModelKind, error: &NeurodriveError) -> Outcome {
    Outcome::Failed {
        kind,
        failure: FailureKind::Configuration,
        exit_code: None,
        message: error.to_string(),
    }
}
