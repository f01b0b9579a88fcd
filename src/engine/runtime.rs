// src/engine/runtime.rs

use std::fmt;

use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::errors::Result;
use crate::exec::WorkerLauncher;

use super::orchestrator::Orchestrator;
use super::{ControlCommand, RuntimeEvent, RuntimeOptions};

/// Drives the [`Orchestrator`] in response to `RuntimeEvent`s.
///
/// This is the single coordination context: operator commands, worker
/// events and probe results all arrive on one channel and are applied in
/// order. Workers never touch orchestrator state directly.
pub struct Runtime<L: WorkerLauncher> {
    orchestrator: Orchestrator<L>,
    event_rx: mpsc::UnboundedReceiver<RuntimeEvent>,
    options: RuntimeOptions,
}

impl<L: WorkerLauncher> fmt::Debug for Runtime<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("orchestrator", &self.orchestrator)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl<L: WorkerLauncher> Runtime<L> {
    pub fn new(
        orchestrator: Orchestrator<L>,
        event_rx: mpsc::UnboundedReceiver<RuntimeEvent>,
        options: RuntimeOptions,
    ) -> Self {
        Self {
            orchestrator,
            event_rx,
            options,
        }
    }

    pub fn orchestrator(&self) -> &Orchestrator<L> {
        &self.orchestrator
    }

    /// Main event loop.
    ///
    /// - Consumes `RuntimeEvent`s from `event_rx`.
    /// - Feeds them into the orchestrator.
    /// - Stops on `ShutdownRequested`, on a closed channel, or (with
    ///   `exit_when_idle`) once a started model has nothing left running.
    ///
    /// Every worker is stopped before this returns.
    pub async fn run(mut self) -> Result<()> {
        info!("neurodrive runtime started");
        let mut started = false;

        loop {
            let event = match self.event_rx.recv().await {
                Some(e) => e,
                None => {
                    info!("runtime event channel closed; exiting");
                    break;
                }
            };

            debug!(?event, "runtime received event");

            match event {
                RuntimeEvent::Control(command) => {
                    if matches!(command, ControlCommand::StartModel(_)) {
                        started = true;
                    }
                    self.orchestrator.apply(command).await;
                }
                RuntimeEvent::Worker(event) => self.orchestrator.handle_worker_event(event),
                RuntimeEvent::EnvironmentChecked(report) => {
                    self.orchestrator.record_environment(report)
                }
                RuntimeEvent::ShutdownRequested => {
                    info!("shutdown requested; stopping runtime");
                    break;
                }
            }

            if self.options.exit_when_idle && started && self.orchestrator.is_idle() {
                info!("no workers left; stopping runtime");
                break;
            }
        }

        self.orchestrator.shutdown().await;
        info!("runtime exiting");
        Ok(())
    }
}
