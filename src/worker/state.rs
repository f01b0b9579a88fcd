// src/worker/state.rs

use std::sync::Arc;

use tokio::sync::watch;

use crate::types::WorkerState;

/// Shared, observable state of one worker.
///
/// The supervising task writes it, the handle (and anyone subscribed) reads
/// it. Once a terminal state is stored the cell refuses further changes.
#[derive(Debug, Clone)]
pub struct StateCell(Arc<watch::Sender<WorkerState>>);

impl StateCell {
    pub fn new(initial: WorkerState) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self(Arc::new(tx))
    }

    pub fn get(&self) -> WorkerState {
        *self.0.borrow()
    }

    /// Move to `next` unless the current state is already terminal.
    ///
    /// Returns whether the state changed.
    pub fn advance(&self, next: WorkerState) -> bool {
        self.0.send_if_modified(|current| {
            if current.is_terminal() || *current == next {
                return false;
            }
            *current = next;
            true
        })
    }

    pub fn subscribe(&self) -> watch::Receiver<WorkerState> {
        self.0.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::WorkerExit;

    #[test]
    fn terminal_state_is_sticky() {
        let cell = StateCell::new(WorkerState::Starting);
        assert!(cell.advance(WorkerState::Running));
        assert!(cell.advance(WorkerState::Exited(WorkerExit::normal(0))));

        assert!(!cell.advance(WorkerState::Running));
        assert!(!cell.advance(WorkerState::Crashed));
        assert_eq!(cell.get(), WorkerState::Exited(WorkerExit::normal(0)));
    }

    #[test]
    fn subscribers_see_transitions() {
        let cell = StateCell::new(WorkerState::Starting);
        let mut rx = cell.subscribe();
        assert!(!rx.has_changed().unwrap_or(true));

        cell.advance(WorkerState::Running);
        assert!(rx.has_changed().unwrap_or(false));
        assert_eq!(*rx.borrow_and_update(), WorkerState::Running);
    }
}
