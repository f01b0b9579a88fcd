// src/worker/registry.rs

//! One slot per [`ModelKind`], each holding at most one worker handle.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use tracing::{debug, info};

use crate::errors::NeurodriveError;
use crate::types::ModelKind;
use crate::worker::handle::{TerminateReport, WorkerHandle, WorkerId};

/// Returned by [`Registry::insert`] when the slot still holds a live handle.
///
/// The rejected handle is handed back so the caller can terminate it.
pub struct InsertRejected {
    pub handle: WorkerHandle,
}

impl InsertRejected {
    pub fn error(&self) -> NeurodriveError {
        NeurodriveError::SlotOccupied(self.handle.kind())
    }
}

impl fmt::Debug for InsertRejected {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InsertRejected")
            .field("handle", &self.handle.id())
            .finish()
    }
}

/// Exclusive owner of all worker handles.
///
/// Invariant: a live handle is never overwritten. A slot can only be reused
/// once its handle is terminal or has been removed (and terminated).
#[derive(Debug, Default)]
pub struct Registry {
    slots: BTreeMap<ModelKind, WorkerHandle>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Put `handle` into its slot.
    ///
    /// A terminal handle already in the slot is released; a live one causes
    /// the insert to be rejected.
    pub fn insert(&mut self, handle: WorkerHandle) -> Result<(), InsertRejected> {
        let kind = handle.kind();
        if let Some(existing) = self.slots.get(&kind) {
            if existing.is_live() {
                return Err(InsertRejected { handle });
            }
            debug!(worker = %existing.id(), "releasing terminal handle from slot");
        }
        self.slots.insert(kind, handle);
        Ok(())
    }

    /// Remove the slot's handle and stop it. No-op when the slot is empty.
    pub async fn remove_and_terminate(
        &mut self,
        kind: ModelKind,
        grace: Duration,
    ) -> Option<TerminateReport> {
        let mut handle = self.slots.remove(&kind)?;
        Some(handle.terminate(grace).await)
    }

    /// Empty the registry, stopping every handle.
    ///
    /// All stops are requested before any is awaited, so the whole call is
    /// bounded by one grace period plus the kill timeout.
    pub async fn terminate_all(&mut self, grace: Duration) -> Vec<TerminateReport> {
        let mut handles: Vec<WorkerHandle> =
            std::mem::take(&mut self.slots).into_values().collect();

        for handle in handles.iter_mut() {
            handle.begin_stop(grace);
        }

        let mut reports = Vec::with_capacity(handles.len());
        for handle in handles.iter_mut() {
            let report = handle.wait_stopped().await;
            info!(
                worker = %report.id,
                forced = report.forced,
                state = %report.state,
                "worker stopped"
            );
            reports.push(report);
        }
        reports
    }

    /// Release the handle for `id` once its terminal outcome was consumed.
    ///
    /// Does nothing if the slot has since been given to another spawn.
    pub fn reap(&mut self, id: WorkerId) -> Option<WorkerHandle> {
        if self.is_current(id) {
            self.slots.remove(&id.kind)
        } else {
            None
        }
    }

    /// Whether `id` is the spawn currently held in its slot.
    pub fn is_current(&self, id: WorkerId) -> bool {
        self.slots.get(&id.kind).is_some_and(|h| h.id() == id)
    }

    pub fn get(&self, kind: ModelKind) -> Option<&WorkerHandle> {
        self.slots.get(&kind)
    }

    /// Handles that are still starting or running.
    pub fn all_live(&self) -> impl Iterator<Item = &WorkerHandle> {
        self.slots.values().filter(|h| h.is_live())
    }

    pub fn any_live(&self) -> bool {
        self.all_live().next().is_some()
    }

    pub fn any_running(&self) -> bool {
        self.slots.values().any(|h| h.is_running())
    }

    pub fn kinds(&self) -> impl Iterator<Item = ModelKind> + '_ {
        self.slots.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
