// src/config/mod.rs

//! Configuration loading and validation for neurodrive.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a config file from disk (`loader.rs`).
//! - Validate it and fill in built-in worker scripts (`validate.rs`).
//! - Hold the runtime-mutable view the orchestrator works from (`settings.rs`).

pub mod loader;
pub mod model;
pub mod settings;
pub mod validate;

pub use loader::{default_config_path, load_and_validate, load_from_path, load_or_default};
pub use model::{ConfigFile, ConfigSection, RawConfigFile, ScriptConfig, default_workers};
pub use settings::Settings;
