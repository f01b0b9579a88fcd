// src/worker/mod.rs

//! Worker model: what to launch, the handle owning a launched process, and
//! the registry enforcing one handle per slot.
//!
//! - [`descriptor`] turns settings into immutable launch parameters.
//! - [`handle`] wraps one spawned process and its supervising task.
//! - [`state`] is the observable state cell shared with that task.
//! - [`output`] captures stdout/stderr for diagnostics.
//! - [`registry`] maps each [`ModelKind`](crate::types::ModelKind) to at
//!   most one handle.

pub mod descriptor;
pub mod handle;
pub mod output;
pub mod registry;
pub mod state;

pub use descriptor::{WorkerDescriptor, descriptors_for};
pub use handle::{HandleParts, SupervisorExit, TerminateReport, WorkerHandle, WorkerId};
pub use output::{CapturedOutput, OUTPUT_DRAIN_TIMEOUT, OutputPumps, OutputSnapshot, Stream};
pub use registry::{InsertRejected, Registry};
pub use state::StateCell;
