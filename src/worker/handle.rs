// src/worker/handle.rs

//! In-process representative of one worker process.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, timeout_at};
use tracing::{debug, warn};

use crate::engine::RuntimeEvent;
use crate::exec::process::{SpawnOptions, spawn_worker};
use crate::types::{ModelKind, WorkerExit, WorkerState};
use crate::worker::descriptor::WorkerDescriptor;
use crate::worker::output::{CapturedOutput, OUTPUT_DRAIN_TIMEOUT};
use crate::worker::state::StateCell;

/// Identity of one spawn: the registry slot plus a sequence number that is
/// never reused. Events carry it so late events from a replaced worker can
/// be told apart from the current one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WorkerId {
    pub kind: ModelKind,
    pub seq: u64,
}

impl WorkerId {
    pub fn new(kind: ModelKind, seq: u64) -> Self {
        Self { kind, seq }
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.kind, self.seq)
    }
}

/// Value the supervising task resolves to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SupervisorExit {
    /// The grace period ran out and the process had to be killed.
    pub forced: bool,
}

/// Result of [`WorkerHandle::terminate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TerminateReport {
    pub id: WorkerId,
    /// Grace period exceeded; escalated to a kill.
    pub forced: bool,
    /// Final state, always terminal.
    pub state: WorkerState,
}

/// Building blocks of a handle, for launchers other than [`spawn_worker`].
#[derive(Debug)]
pub struct HandleParts {
    pub id: WorkerId,
    pub script: PathBuf,
    pub state: StateCell,
    pub output: CapturedOutput,
    pub warnings: Vec<String>,
    /// Receives the grace period when a stop is requested.
    pub stop_tx: Option<oneshot::Sender<Duration>>,
    pub task: Option<JoinHandle<SupervisorExit>>,
    pub kill_timeout: Duration,
}

/// Owns one worker process (through its supervising task) and exposes its
/// state and captured output.
///
/// Dropping the handle without terminating it aborts nothing by itself, but
/// the supervising task notices the closed stop channel and kills the
/// process immediately.
pub struct WorkerHandle {
    id: WorkerId,
    script: PathBuf,
    state: StateCell,
    output: CapturedOutput,
    warnings: Vec<String>,
    stop_tx: Option<oneshot::Sender<Duration>>,
    task: Option<JoinHandle<SupervisorExit>>,
    kill_timeout: Duration,
    stop_deadline: Option<Instant>,
}

impl fmt::Debug for WorkerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerHandle")
            .field("id", &self.id)
            .field("script", &self.script)
            .field("state", &self.state.get())
            .finish_non_exhaustive()
    }
}

impl WorkerHandle {
    /// Launch the process described by `descriptor`.
    ///
    /// Returns as soon as the OS accepted or rejected the launch; state
    /// changes and the terminal outcome are reported on `events`.
    pub fn spawn(
        descriptor: WorkerDescriptor,
        id: WorkerId,
        events: mpsc::UnboundedSender<RuntimeEvent>,
        options: SpawnOptions,
    ) -> Self {
        spawn_worker(descriptor, id, events, options)
    }

    pub fn from_parts(parts: HandleParts) -> Self {
        Self {
            id: parts.id,
            script: parts.script,
            state: parts.state,
            output: parts.output,
            warnings: parts.warnings,
            stop_tx: parts.stop_tx,
            task: parts.task,
            kill_timeout: parts.kill_timeout,
            stop_deadline: None,
        }
    }

    pub fn id(&self) -> WorkerId {
        self.id
    }

    pub fn kind(&self) -> ModelKind {
        self.id.kind
    }

    pub fn script(&self) -> &Path {
        &self.script
    }

    pub fn state(&self) -> WorkerState {
        self.state.get()
    }

    pub fn is_live(&self) -> bool {
        self.state().is_live()
    }

    pub fn is_running(&self) -> bool {
        self.state() == WorkerState::Running
    }

    pub fn subscribe(&self) -> watch::Receiver<WorkerState> {
        self.state.subscribe()
    }

    pub fn output(&self) -> &CapturedOutput {
        &self.output
    }

    /// Problems noticed at launch that did not prevent it.
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// Ask the worker to stop cooperatively within `grace`.
    ///
    /// Does not wait; see [`WorkerHandle::wait_stopped`]. Calling it twice
    /// keeps the first deadline.
    pub fn begin_stop(&mut self, grace: Duration) {
        if self.stop_deadline.is_some() {
            return;
        }
        // The supervisor drains the pipes after the process is gone.
        self.stop_deadline =
            Some(Instant::now() + grace + self.kill_timeout + OUTPUT_DRAIN_TIMEOUT);
        if let Some(stop) = self.stop_tx.take() {
            if stop.send(grace).is_err() {
                debug!(worker = %self.id, "worker already finished when stop was requested");
            }
        }
    }

    /// Wait until the worker is confirmed stopped or killed.
    ///
    /// Bounded by the grace period, the kill timeout and the output drain
    /// bound. If the supervising task has not finished by then it is
    /// aborted, which drops (and kills) the child process.
    pub async fn wait_stopped(&mut self) -> TerminateReport {
        if self.stop_deadline.is_none() {
            self.begin_stop(Duration::ZERO);
        }
        let deadline = self.stop_deadline.unwrap_or_else(Instant::now);

        let forced = match self.task.take() {
            None => false,
            Some(mut task) => match timeout_at(deadline, &mut task).await {
                Ok(Ok(exit)) => exit.forced,
                Ok(Err(err)) => {
                    warn!(worker = %self.id, error = %err, "worker supervisor task failed");
                    true
                }
                Err(_) => {
                    warn!(
                        worker = %self.id,
                        "worker did not stop within grace period plus kill timeout; aborting supervisor"
                    );
                    task.abort();
                    let _ = task.await;
                    true
                }
            },
        };

        // A live state here means the supervisor never got to record the
        // exit (aborted or panicked).
        self.state.advance(WorkerState::Exited(WorkerExit::killed()));

        TerminateReport {
            id: self.id,
            forced,
            state: self.state(),
        }
    }

    /// Cooperative stop with escalation to kill; returns once stopped.
    pub async fn terminate(&mut self, grace: Duration) -> TerminateReport {
        self.begin_stop(grace);
        self.wait_stopped().await
    }
}
