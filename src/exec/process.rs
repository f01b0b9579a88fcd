// src/exec/process.rs

//! Real worker processes.
//!
//! [`spawn_worker`] launches the interpreter and hands the child to a
//! supervising Tokio task which:
//! - marks the worker `Running` and reports it,
//! - captures stdout/stderr,
//! - reports exactly one terminal event when the process ends on its own,
//! - or, when a stop is requested, sends the cooperative stop, waits for the
//!   grace period and kills the process if it is still alive. Stopped
//!   workers report nothing; the orchestrator already retired them.

use std::process::Stdio;
use std::time::Duration;

use tokio::process::{Child, Command};
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::engine::{ProcessError, RuntimeEvent, WorkerEvent};
use crate::exec::signal::request_graceful_stop;
use crate::types::{WorkerExit, WorkerState};
use crate::worker::{
    CapturedOutput, HandleParts, OUTPUT_DRAIN_TIMEOUT, OutputPumps, OutputSnapshot, StateCell,
    Stream, SupervisorExit, WorkerDescriptor, WorkerHandle, WorkerId,
};

/// Per-spawn knobs taken from [`Settings`](crate::config::Settings).
#[derive(Debug, Clone, Copy)]
pub struct SpawnOptions {
    pub output_history_lines: usize,
    pub kill_timeout: Duration,
}

/// Launch a worker process and start supervising it.
///
/// A missing script file only produces a warning: the interpreter is still
/// started and reports the problem itself. A launch the OS rejects (missing
/// interpreter, missing working directory, permissions) leaves the handle in
/// `FailedToStart` and reports `ProcessError::FailedToStart`.
pub fn spawn_worker(
    descriptor: WorkerDescriptor,
    id: WorkerId,
    events: mpsc::UnboundedSender<RuntimeEvent>,
    options: SpawnOptions,
) -> WorkerHandle {
    let state = StateCell::new(WorkerState::Starting);
    let output = CapturedOutput::new(options.output_history_lines);
    let mut warnings = Vec::new();

    if !descriptor.script_path().is_file() {
        warn!(
            worker = %id,
            script = %descriptor.script_path().display(),
            "worker script not found; launching anyway"
        );
        warnings.push(format!(
            "script {} not found",
            descriptor.script_path().display()
        ));
    }

    info!(
        worker = %id,
        interpreter = %descriptor.interpreter(),
        args = ?descriptor.arguments(),
        cwd = %descriptor.working_directory().display(),
        "starting worker process"
    );

    let mut cmd = Command::new(descriptor.interpreter());
    cmd.args(descriptor.arguments())
        .current_dir(descriptor.working_directory())
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let (stop_tx, task) = match cmd.spawn() {
        Ok(child) => {
            let (stop_tx, stop_rx) = oneshot::channel::<Duration>();
            let supervisor = Supervisor {
                id,
                state: state.clone(),
                output: output.clone(),
                events,
            };
            let task = tokio::spawn(supervisor.run(child, stop_rx));
            (Some(stop_tx), Some(task))
        }
        Err(err) => {
            error!(
                worker = %id,
                interpreter = %descriptor.interpreter(),
                error = %err,
                "failed to launch worker process"
            );
            state.advance(WorkerState::FailedToStart);
            let message = format!("{}: {err}", descriptor.interpreter());
            emit(
                &events,
                WorkerEvent::Error {
                    id,
                    error: ProcessError::FailedToStart(message),
                    output: OutputSnapshot::default(),
                },
            );
            (None, None)
        }
    };

    WorkerHandle::from_parts(HandleParts {
        id,
        script: descriptor.script_path().to_path_buf(),
        state,
        output,
        warnings,
        stop_tx,
        task,
        kill_timeout: options.kill_timeout,
    })
}

fn emit(events: &mpsc::UnboundedSender<RuntimeEvent>, event: WorkerEvent) {
    if events.send(RuntimeEvent::Worker(event)).is_err() {
        debug!("runtime event channel closed; dropping worker event");
    }
}

struct Supervisor {
    id: WorkerId,
    state: StateCell,
    output: CapturedOutput,
    events: mpsc::UnboundedSender<RuntimeEvent>,
}

impl Supervisor {
    async fn run(
        self,
        mut child: Child,
        mut stop_rx: oneshot::Receiver<Duration>,
    ) -> SupervisorExit {
        let mut pumps = OutputPumps::new();
        if let Some(stdout) = child.stdout.take() {
            pumps.attach(stdout, Stream::Stdout, &self.output, self.id);
        }
        if let Some(stderr) = child.stderr.take() {
            pumps.attach(stderr, Stream::Stderr, &self.output, self.id);
        }

        debug!(worker = %self.id, pid = ?child.id(), "worker process running");
        if self.state.advance(WorkerState::Running) {
            emit(
                &self.events,
                WorkerEvent::StateChanged {
                    id: self.id,
                    state: WorkerState::Running,
                },
            );
        }

        tokio::select! {
            status_res = child.wait() => {
                pumps.drain(OUTPUT_DRAIN_TIMEOUT).await;
                let output = self.output.snapshot();

                match status_res {
                    Ok(status) => {
                        let exit = WorkerExit::from(status);
                        info!(
                            worker = %self.id,
                            exit_code = exit.code,
                            normal = ?exit.kind,
                            "worker process exited"
                        );
                        self.state.advance(exit.natural_state());
                        emit(&self.events, WorkerEvent::Exited { id: self.id, exit, output });
                    }
                    Err(err) => {
                        error!(worker = %self.id, error = %err, "waiting for worker process failed");
                        self.state.advance(WorkerState::Crashed);
                        emit(
                            &self.events,
                            WorkerEvent::Error {
                                id: self.id,
                                error: ProcessError::Other(err.to_string()),
                                output,
                            },
                        );
                    }
                }

                SupervisorExit { forced: false }
            }

            request = &mut stop_rx => {
                // A dropped handle counts as a stop request with no grace.
                let grace = request.unwrap_or(Duration::ZERO);
                let (exit, forced) = stop_child(&mut child, grace, self.id).await;
                pumps.drain(OUTPUT_DRAIN_TIMEOUT).await;
                self.state.advance(WorkerState::Exited(exit));
                SupervisorExit { forced }
            }
        }
    }
}

/// Cooperative stop, escalating to a kill once `grace` has elapsed.
///
/// Returns the exit and whether the kill was needed.
async fn stop_child(child: &mut Child, grace: Duration, id: WorkerId) -> (WorkerExit, bool) {
    debug!(worker = %id, grace_ms = grace.as_millis() as u64, "requesting worker stop");
    if let Err(err) = request_graceful_stop(child) {
        warn!(worker = %id, error = %err, "failed to send stop request to worker");
    }

    match timeout(grace, child.wait()).await {
        Ok(Ok(status)) => (WorkerExit::from(status), false),
        Ok(Err(err)) => {
            warn!(worker = %id, error = %err, "waiting for stopped worker failed");
            (WorkerExit::killed(), false)
        }
        Err(_) => {
            info!(
                worker = %id,
                grace_ms = grace.as_millis() as u64,
                "grace period elapsed; killing worker process"
            );
            if let Err(err) = child.kill().await {
                warn!(worker = %id, error = %err, "failed to kill worker process");
            }
            (WorkerExit::killed(), true)
        }
    }
}
