// src/config/model.rs

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::types::ModelKind;

/// Top-level configuration as read from a TOML file.
///
/// ```toml
/// [config]
/// interpreter = "python3"
/// grace_timeout_ms = 3000
///
/// [worker.traffic_sign_recognition]
/// script = "/home/root/traffic/tf/tf.py"
///
/// [worker.combined]
/// script = "/path/to/model3/script3.py"
/// args = ["--camera", "1"]
/// ```
///
/// All sections are optional. Worker slots missing from the file fall back
/// to [`default_workers`] once validated.
#[derive(Debug, Clone, Deserialize)]
pub struct RawConfigFile {
    /// Supervisor behaviour from `[config]`.
    #[serde(default)]
    pub config: ConfigSection,

    /// Worker scripts from `[worker.<model>]`.
    #[serde(default)]
    pub worker: BTreeMap<ModelKind, ScriptConfig>,
}

/// Validated configuration.
///
/// Only constructible through `TryFrom<RawConfigFile>` (see `validate.rs`)
/// or [`ConfigFile::default`].
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub config: ConfigSection,
    pub worker: BTreeMap<ModelKind, ScriptConfig>,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(
        config: ConfigSection,
        worker: BTreeMap<ModelKind, ScriptConfig>,
    ) -> Self {
        Self { config, worker }
    }

    pub fn script(&self, kind: ModelKind) -> Option<&ScriptConfig> {
        self.worker.get(&kind)
    }
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self::new_unchecked(ConfigSection::default(), default_workers())
    }
}

/// `[config]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigSection {
    /// Explicit interpreter. When unset, `interpreter_candidates` are probed.
    #[serde(default)]
    pub interpreter: Option<String>,

    /// Interpreter names tried in order when no explicit one is given.
    #[serde(default = "default_interpreter_candidates")]
    pub interpreter_candidates: Vec<String>,

    /// Time a worker gets to exit after the cooperative stop request.
    #[serde(default = "default_grace_timeout_ms")]
    pub grace_timeout_ms: u64,

    /// Upper bound for the forced kill after the grace period.
    #[serde(default = "default_kill_timeout_ms")]
    pub kill_timeout_ms: u64,

    /// Upper bound for `--version` probes of the interpreter.
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,

    /// Lines retained per stream for each worker.
    #[serde(default = "default_output_history_lines")]
    pub output_history_lines: usize,
}

fn default_interpreter_candidates() -> Vec<String> {
    vec!["python3".to_string(), "python".to_string()]
}

fn default_grace_timeout_ms() -> u64 {
    3000
}

fn default_kill_timeout_ms() -> u64 {
    2000
}

fn default_probe_timeout_ms() -> u64 {
    5000
}

fn default_output_history_lines() -> usize {
    500
}

impl Default for ConfigSection {
    fn default() -> Self {
        Self {
            interpreter: None,
            interpreter_candidates: default_interpreter_candidates(),
            grace_timeout_ms: default_grace_timeout_ms(),
            kill_timeout_ms: default_kill_timeout_ms(),
            probe_timeout_ms: default_probe_timeout_ms(),
            output_history_lines: default_output_history_lines(),
        }
    }
}

/// `[worker.<model>]` section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ScriptConfig {
    /// Path of the script handed to the interpreter. Empty means "not
    /// configured"; that is reported when the model is started.
    #[serde(default)]
    pub script: String,

    /// Extra arguments appended after the script path.
    #[serde(default)]
    pub args: Vec<String>,
}

impl ScriptConfig {
    pub fn new(script: impl Into<String>) -> Self {
        Self {
            script: script.into(),
            args: Vec::new(),
        }
    }
}

/// Built-in worker scripts, matching the on-device layout.
///
/// Lane detection has no default location and must be configured.
pub fn default_workers() -> BTreeMap<ModelKind, ScriptConfig> {
    BTreeMap::from([
        (
            ModelKind::TrafficSignRecognition,
            ScriptConfig::new("/home/root/traffic/tf/tf.py"),
        ),
        (
            ModelKind::Drowsiness,
            ScriptConfig::new("/home/root/DROWSINESS/tf/drowsiness_detectorr.py"),
        ),
        (ModelKind::LaneDetection, ScriptConfig::default()),
        (
            ModelKind::Combined,
            ScriptConfig::new("/path/to/model3/script3.py"),
        ),
    ])
}
