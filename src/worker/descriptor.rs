// src/worker/descriptor.rs

//! Launch parameters for one worker process.

use std::path::{Path, PathBuf};

use crate::config::Settings;
use crate::errors::{NeurodriveError, Result};
use crate::types::ModelKind;

/// Everything needed to start one worker: interpreter, arguments and the
/// working directory (the directory containing the script).
///
/// Built fresh for every start attempt and never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerDescriptor {
    kind: ModelKind,
    script_path: PathBuf,
    interpreter: String,
    working_directory: PathBuf,
    arguments: Vec<String>,
}

impl WorkerDescriptor {
    /// Build the descriptor for a single registry slot.
    ///
    /// Fails only when the slot has no script path (or no interpreter is
    /// set). Whether the script exists on disk is checked at spawn time.
    pub fn build(kind: ModelKind, settings: &Settings) -> Result<Self> {
        if kind == ModelKind::None {
            return Err(NeurodriveError::MissingScript(kind));
        }

        let interpreter = settings.interpreter().trim();
        if interpreter.is_empty() {
            return Err(NeurodriveError::MissingInterpreter);
        }

        let script_cfg = settings
            .script(kind)
            .filter(|s| !s.script.trim().is_empty())
            .ok_or(NeurodriveError::MissingScript(kind))?;

        let script_path = absolutize(Path::new(script_cfg.script.trim()));
        let working_directory = match script_path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let mut arguments = Vec::with_capacity(1 + script_cfg.args.len());
        arguments.push(script_path.to_string_lossy().into_owned());
        arguments.extend(script_cfg.args.iter().cloned());

        Ok(Self {
            kind,
            script_path,
            interpreter: interpreter.to_string(),
            working_directory,
            arguments,
        })
    }

    pub fn kind(&self) -> ModelKind {
        self.kind
    }

    pub fn script_path(&self) -> &Path {
        &self.script_path
    }

    pub fn interpreter(&self) -> &str {
        &self.interpreter
    }

    pub fn working_directory(&self) -> &Path {
        &self.working_directory
    }

    /// Arguments passed to the interpreter; the script path comes first.
    pub fn arguments(&self) -> &[String] {
        &self.arguments
    }
}

/// Descriptors for every slot a model activation needs, in spawn order.
///
/// Each slot is built independently so a bad `Combined` constituent does not
/// prevent the others from starting.
pub fn descriptors_for(
    model: ModelKind,
    settings: &Settings,
) -> Vec<(ModelKind, Result<WorkerDescriptor>)> {
    model
        .constituents()
        .iter()
        .map(|&slot| (slot, WorkerDescriptor::build(slot, settings)))
        .collect()
}

/// Resolve relative script paths against the current directory so the
/// script argument stays valid after the working directory changes.
fn absolutize(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}
