use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::time::sleep;
use tracing::debug;

use neurodrive::engine::{ProcessError, RuntimeEvent, WorkerEvent};
use neurodrive::exec::WorkerLauncher;
use neurodrive::types::{ModelKind, WorkerExit, WorkerState};
use neurodrive::worker::{
    CapturedOutput, HandleParts, StateCell, Stream, SupervisorExit, WorkerDescriptor,
    WorkerHandle, WorkerId,
};

/// How a simulated worker behaves once launched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FakeBehaviour {
    /// Reports `Running` and exits cleanly when asked to stop.
    RunUntilStopped,
    /// Exits on its own with `code` after `delay`.
    ExitAfter { delay: Duration, code: i32 },
    /// Ends abnormally after `delay`.
    CrashAfter(Duration),
    /// The launch is rejected by the "OS".
    FailToStart,
    /// Ignores the stop request; killed once the grace period elapses.
    IgnoreStop,
}

/// What the fake launcher observed, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchRecord {
    Launched(WorkerId),
    /// The worker stopped because it was asked to.
    Stopped { id: WorkerId, forced: bool },
}

impl LaunchRecord {
    pub fn kind(&self) -> ModelKind {
        match self {
            LaunchRecord::Launched(id) | LaunchRecord::Stopped { id, .. } => id.kind,
        }
    }
}

/// Shared view of the launch log, usable after the launcher moved into the
/// runtime.
#[derive(Debug, Clone, Default)]
pub struct LaunchLog(Arc<Mutex<Vec<LaunchRecord>>>);

impl LaunchLog {
    fn push(&self, record: LaunchRecord) {
        self.0.lock().unwrap().push(record);
    }

    pub fn records(&self) -> Vec<LaunchRecord> {
        self.0.lock().unwrap().clone()
    }

    pub fn launched(&self) -> Vec<ModelKind> {
        self.records()
            .into_iter()
            .filter_map(|r| match r {
                LaunchRecord::Launched(id) => Some(id.kind),
                LaunchRecord::Stopped { .. } => None,
            })
            .collect()
    }

    pub fn stopped(&self) -> Vec<(ModelKind, bool)> {
        self.records()
            .into_iter()
            .filter_map(|r| match r {
                LaunchRecord::Stopped { id, forced } => Some((id.kind, forced)),
                LaunchRecord::Launched(_) => None,
            })
            .collect()
    }
}

/// A launcher that simulates workers with tokio tasks instead of processes.
///
/// Workers follow the same event contract as real ones: `StateChanged`
/// (Running), then one terminal event unless they were stopped.
pub struct FakeLauncher {
    behaviours: BTreeMap<ModelKind, FakeBehaviour>,
    default: FakeBehaviour,
    start_delay: Duration,
    kill_timeout: Duration,
    log: LaunchLog,
}

impl FakeLauncher {
    pub fn new() -> Self {
        Self {
            behaviours: BTreeMap::new(),
            default: FakeBehaviour::RunUntilStopped,
            start_delay: Duration::ZERO,
            kill_timeout: Duration::from_millis(500),
            log: LaunchLog::default(),
        }
    }

    pub fn with(mut self, kind: ModelKind, behaviour: FakeBehaviour) -> Self {
        self.behaviours.insert(kind, behaviour);
        self
    }

    /// Delay before workers report `Running`.
    pub fn with_start_delay(mut self, delay: Duration) -> Self {
        self.start_delay = delay;
        self
    }

    pub fn log(&self) -> LaunchLog {
        self.log.clone()
    }
}

impl Default for FakeLauncher {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkerLauncher for FakeLauncher {
    fn launch(
        &mut self,
        descriptor: WorkerDescriptor,
        id: WorkerId,
        events: mpsc::UnboundedSender<RuntimeEvent>,
    ) -> WorkerHandle {
        let behaviour = self
            .behaviours
            .get(&id.kind)
            .copied()
            .unwrap_or(self.default);
        debug!(worker = %id, ?behaviour, "fake launch");

        self.log.push(LaunchRecord::Launched(id));

        let state = StateCell::new(WorkerState::Starting);
        let output = CapturedOutput::new(50);
        let script = descriptor.script_path().to_path_buf();

        if behaviour == FakeBehaviour::FailToStart {
            state.advance(WorkerState::FailedToStart);
            let _ = events.send(RuntimeEvent::Worker(WorkerEvent::Error {
                id,
                error: ProcessError::FailedToStart(format!(
                    "{}: No such file or directory",
                    descriptor.interpreter()
                )),
                output: output.snapshot(),
            }));
            return handle(id, script, state, output, None, None, self.kill_timeout);
        }

        let (stop_tx, stop_rx) = oneshot::channel();
        let worker = SimulatedWorker {
            id,
            behaviour,
            start_delay: self.start_delay,
            state: state.clone(),
            output: output.clone(),
            events,
            log: self.log.clone(),
        };
        let task = tokio::spawn(worker.run(stop_rx));

        handle(
            id,
            script,
            state,
            output,
            Some(stop_tx),
            Some(task),
            self.kill_timeout,
        )
    }
}

fn handle(
    id: WorkerId,
    script: PathBuf,
    state: StateCell,
    output: CapturedOutput,
    stop_tx: Option<oneshot::Sender<Duration>>,
    task: Option<tokio::task::JoinHandle<SupervisorExit>>,
    kill_timeout: Duration,
) -> WorkerHandle {
    WorkerHandle::from_parts(HandleParts {
        id,
        script,
        state,
        output,
        warnings: Vec::new(),
        stop_tx,
        task,
        kill_timeout,
    })
}

struct SimulatedWorker {
    id: WorkerId,
    behaviour: FakeBehaviour,
    start_delay: Duration,
    state: StateCell,
    output: CapturedOutput,
    events: mpsc::UnboundedSender<RuntimeEvent>,
    log: LaunchLog,
}

impl SimulatedWorker {
    async fn run(self, mut stop_rx: oneshot::Receiver<Duration>) -> SupervisorExit {
        if !self.start_delay.is_zero() {
            tokio::select! {
                _ = sleep(self.start_delay) => {}
                request = &mut stop_rx => return self.stopped(request.unwrap_or_default()).await,
            }
        }

        if self.state.advance(WorkerState::Running) {
            self.send(WorkerEvent::StateChanged {
                id: self.id,
                state: WorkerState::Running,
            });
        }
        self.output
            .push(Stream::Stdout, format!("{} ready", self.id.kind.label()));

        let natural_end = match self.behaviour {
            FakeBehaviour::ExitAfter { delay, code } => Some((delay, WorkerExit::normal(code))),
            FakeBehaviour::CrashAfter(delay) => Some((delay, WorkerExit::killed())),
            _ => None,
        };

        match natural_end {
            Some((delay, exit)) => {
                tokio::select! {
                    _ = sleep(delay) => self.exited(exit),
                    request = &mut stop_rx => self.stopped(request.unwrap_or_default()).await,
                }
            }
            None => {
                let grace = stop_rx.await.unwrap_or_default();
                self.stopped(grace).await
            }
        }
    }

    fn exited(self, exit: WorkerExit) -> SupervisorExit {
        if exit.code != 0 {
            self.output.push(Stream::Stderr, "simulated failure");
        }
        self.state.advance(exit.natural_state());
        self.send(WorkerEvent::Exited {
            id: self.id,
            exit,
            output: self.output.snapshot(),
        });
        SupervisorExit { forced: false }
    }

    async fn stopped(self, grace: Duration) -> SupervisorExit {
        let forced = self.behaviour == FakeBehaviour::IgnoreStop;
        if forced {
            sleep(grace).await;
            self.state.advance(WorkerState::Exited(WorkerExit::killed()));
        } else {
            self.state.advance(WorkerState::Exited(WorkerExit::normal(0)));
        }
        self.log.push(LaunchRecord::Stopped {
            id: self.id,
            forced,
        });
        SupervisorExit { forced }
    }

    fn send(&self, event: WorkerEvent) {
        let _ = self.events.send(RuntimeEvent::Worker(event));
    }
}
