// src/config/settings.rs

//! Runtime configuration owned by the orchestrator.
//!
//! Unlike [`ConfigFile`], settings can be changed between runs (script paths,
//! interpreter). Changes only affect the next start; live workers keep the
//! descriptor they were spawned with.

use std::collections::BTreeMap;
use std::time::Duration;

use crate::config::model::{ConfigFile, ScriptConfig};
use crate::types::ModelKind;

#[derive(Debug, Clone)]
pub struct Settings {
    interpreter: String,
    workers: BTreeMap<ModelKind, ScriptConfig>,
    grace_period: Duration,
    kill_timeout: Duration,
    probe_timeout: Duration,
    output_history_lines: usize,
}

impl Settings {
    /// Settings with no worker scripts and default timings.
    pub fn new(interpreter: impl Into<String>) -> Self {
        let defaults = ConfigFile::default().config;
        Self {
            interpreter: interpreter.into(),
            workers: BTreeMap::new(),
            grace_period: Duration::from_millis(defaults.grace_timeout_ms),
            kill_timeout: Duration::from_millis(defaults.kill_timeout_ms),
            probe_timeout: Duration::from_millis(defaults.probe_timeout_ms),
            output_history_lines: defaults.output_history_lines,
        }
    }

    /// Build settings from a validated config and an already resolved
    /// interpreter.
    pub fn from_config(cfg: &ConfigFile, interpreter: impl Into<String>) -> Self {
        Self {
            interpreter: interpreter.into(),
            workers: cfg.worker.clone(),
            grace_period: Duration::from_millis(cfg.config.grace_timeout_ms),
            kill_timeout: Duration::from_millis(cfg.config.kill_timeout_ms),
            probe_timeout: Duration::from_millis(cfg.config.probe_timeout_ms),
            output_history_lines: cfg.config.output_history_lines,
        }
    }

    pub fn interpreter(&self) -> &str {
        &self.interpreter
    }

    pub fn script(&self, kind: ModelKind) -> Option<&ScriptConfig> {
        self.workers.get(&kind)
    }

    pub fn workers(&self) -> impl Iterator<Item = (ModelKind, &ScriptConfig)> {
        self.workers.iter().map(|(k, v)| (*k, v))
    }

    pub fn grace_period(&self) -> Duration {
        self.grace_period
    }

    pub fn kill_timeout(&self) -> Duration {
        self.kill_timeout
    }

    pub fn probe_timeout(&self) -> Duration {
        self.probe_timeout
    }

    pub fn output_history_lines(&self) -> usize {
        self.output_history_lines
    }

    pub fn set_interpreter(&mut self, interpreter: impl Into<String>) {
        self.interpreter = interpreter.into();
    }

    /// Replace the script path of one slot, keeping its extra arguments.
    pub fn set_script_path(&mut self, kind: ModelKind, path: impl Into<String>) {
        self.workers.entry(kind).or_default().script = path.into();
    }

    pub fn set_worker(&mut self, kind: ModelKind, script: ScriptConfig) {
        self.workers.insert(kind, script);
    }

    pub fn set_grace_period(&mut self, grace: Duration) {
        self.grace_period = grace;
    }

    pub fn set_kill_timeout(&mut self, timeout: Duration) {
        self.kill_timeout = timeout;
    }

    pub fn set_probe_timeout(&mut self, timeout: Duration) {
        self.probe_timeout = timeout;
    }

    pub fn set_output_history_lines(&mut self, lines: usize) {
        self.output_history_lines = lines.max(1);
    }
}
