#![allow(dead_code)]

use std::time::Duration;

use tokio::sync::mpsc;

use neurodrive::config::Settings;
use neurodrive::engine::{Orchestrator, RuntimeEvent};
use neurodrive::exec::WorkerLauncher;
use neurodrive::report::{EventSink, OrchestratorEvent};

pub use neurodrive_test_utils::{init_tracing, with_timeout};

/// An orchestrator driven by hand: the test decides when worker events are
/// delivered, which keeps orderings deterministic.
pub struct Driven<L: WorkerLauncher> {
    pub orchestrator: Orchestrator<L>,
    pub worker_rx: mpsc::UnboundedReceiver<RuntimeEvent>,
    pub events: mpsc::UnboundedReceiver<OrchestratorEvent>,
    seen: Vec<OrchestratorEvent>,
}

pub fn driven<L: WorkerLauncher>(settings: Settings, launcher: L) -> Driven<L> {
    init_tracing();
    let (tx, worker_rx) = mpsc::unbounded_channel();
    let (sink, events) = EventSink::channel();
    Driven {
        orchestrator: Orchestrator::new(settings, launcher, tx, sink),
        worker_rx,
        events,
        seen: Vec::new(),
    }
}

impl<L: WorkerLauncher> Driven<L> {
    /// Deliver queued worker events until `done` holds (5 s limit).
    pub async fn pump_until(&mut self, mut done: impl FnMut(&Orchestrator<L>) -> bool) {
        with_timeout(async {
            while !done(&self.orchestrator) {
                match self.worker_rx.recv().await {
                    Some(RuntimeEvent::Worker(event)) => {
                        self.orchestrator.handle_worker_event(event)
                    }
                    Some(RuntimeEvent::EnvironmentChecked(report)) => {
                        self.orchestrator.record_environment(report)
                    }
                    Some(other) => panic!("unexpected runtime event: {other:?}"),
                    None => panic!("worker channel closed"),
                }
            }
        })
        .await
    }

    /// Deliver whatever arrives within `window`.
    pub async fn pump_for(&mut self, window: Duration) {
        let deadline = tokio::time::Instant::now() + window;
        while let Ok(Some(event)) =
            tokio::time::timeout_at(deadline, self.worker_rx.recv()).await
        {
            if let RuntimeEvent::Worker(event) = event {
                self.orchestrator.handle_worker_event(event);
            }
        }
    }

    /// Every orchestrator event published so far.
    pub fn events(&mut self) -> &[OrchestratorEvent] {
        while let Ok(event) = self.events.try_recv() {
            self.seen.push(event);
        }
        &self.seen
    }

    pub fn statuses(&mut self) -> Vec<String> {
        self.events()
            .iter()
            .filter_map(|e| match e {
                OrchestratorEvent::StatusChanged(s) => Some(s.clone()),
                _ => None,
            })
            .collect()
    }
}
