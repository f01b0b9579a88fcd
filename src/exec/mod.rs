// src/exec/mod.rs

//! Process execution layer.
//!
//! This module is responsible for actually running the worker scripts, using
//! `tokio::process::Command`, and reporting back to the orchestration runtime
//! via `RuntimeEvent`s.
//!
//! - [`process`] spawns a worker and owns its supervising task.
//! - [`signal`] sends the cooperative stop request.
//! - [`probe`] runs `--version` checks for `test-env` and interpreter
//!   detection.
//! - [`backend`] provides the `WorkerLauncher` trait and the concrete
//!   `ProcessLauncher` the orchestrator uses in production, and which tests
//!   can replace with a fake implementation.

pub mod backend;
pub mod probe;
pub mod process;
pub mod signal;

pub use backend::{ProcessLauncher, WorkerLauncher};
pub use probe::{EnvironmentReport, check_interpreter, detect_interpreter, resolve_interpreter};
pub use process::{SpawnOptions, spawn_worker};
