// src/errors.rs

//! Crate-wide error aliases and helpers.

use thiserror::Error;

use crate::types::ModelKind;

#[derive(Error, Debug)]
pub enum NeurodriveError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("no script path configured for {}", .0.label())]
    MissingScript(ModelKind),

    #[error("no interpreter configured")]
    MissingInterpreter,

    #[error("a live worker already occupies the {0} slot")]
    SlotOccupied(ModelKind),

    #[error("orchestrator runtime is no longer running")]
    RuntimeClosed,

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, NeurodriveError>;
