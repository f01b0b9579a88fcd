// src/exec/backend.rs

//! Pluggable worker launcher abstraction.
//!
//! The orchestrator asks a `WorkerLauncher` for handles instead of spawning
//! processes itself. Production uses [`ProcessLauncher`]; tests can supply a
//! launcher that builds handles around simulated workers (see
//! [`WorkerHandle::from_parts`]).

use tokio::sync::mpsc;

use crate::config::Settings;
use crate::engine::RuntimeEvent;
use crate::exec::process::{SpawnOptions, spawn_worker};
use crate::worker::{WorkerDescriptor, WorkerHandle, WorkerId};

/// Trait abstracting how worker processes are started.
pub trait WorkerLauncher: Send {
    /// Start the worker for `descriptor`.
    ///
    /// Must not block beyond the launch itself. State changes and the
    /// terminal outcome are reported through `events`.
    fn launch(
        &mut self,
        descriptor: WorkerDescriptor,
        id: WorkerId,
        events: mpsc::UnboundedSender<RuntimeEvent>,
    ) -> WorkerHandle;
}

/// Launcher spawning real OS processes via `tokio::process`.
#[derive(Debug, Clone, Copy)]
pub struct ProcessLauncher {
    options: SpawnOptions,
}

impl ProcessLauncher {
    pub fn new(options: SpawnOptions) -> Self {
        Self { options }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(SpawnOptions {
            output_history_lines: settings.output_history_lines(),
            kill_timeout: settings.kill_timeout(),
        })
    }
}

impl WorkerLauncher for ProcessLauncher {
    fn launch(
        &mut self,
        descriptor: WorkerDescriptor,
        id: WorkerId,
        events: mpsc::UnboundedSender<RuntimeEvent>,
    ) -> WorkerHandle {
        spawn_worker(descriptor, id, events, self.options)
    }
}
