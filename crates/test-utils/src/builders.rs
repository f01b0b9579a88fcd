#![allow(dead_code)]

use std::collections::BTreeMap;
use std::time::Duration;

use neurodrive::config::{ConfigFile, ConfigSection, RawConfigFile, ScriptConfig, Settings};
use neurodrive::types::ModelKind;

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile {
                config: ConfigSection::default(),
                worker: BTreeMap::new(),
            },
        }
    }

    pub fn with_worker(mut self, kind: ModelKind, script: &str) -> Self {
        self.config.worker.insert(kind, ScriptConfig::new(script));
        self
    }

    pub fn with_worker_args(mut self, kind: ModelKind, script: &str, args: &[&str]) -> Self {
        let mut cfg = ScriptConfig::new(script);
        cfg.args = args.iter().map(|a| a.to_string()).collect();
        self.config.worker.insert(kind, cfg);
        self
    }

    pub fn with_interpreter(mut self, interpreter: &str) -> Self {
        self.config.config.interpreter = Some(interpreter.to_string());
        self
    }

    pub fn with_grace_ms(mut self, ms: u64) -> Self {
        self.config.config.grace_timeout_ms = ms;
        self
    }

    pub fn with_kill_ms(mut self, ms: u64) -> Self {
        self.config.config.kill_timeout_ms = ms;
        self
    }

    pub fn raw(self) -> RawConfigFile {
        self.config
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `Settings` with short timings suited to tests.
pub struct SettingsBuilder {
    settings: Settings,
}

impl SettingsBuilder {
    /// `python3`, no scripts, 200 ms grace, 500 ms kill bound.
    pub fn new() -> Self {
        let mut settings = Settings::new("python3");
        settings.set_grace_period(Duration::from_millis(200));
        settings.set_kill_timeout(Duration::from_millis(500));
        settings.set_probe_timeout(Duration::from_secs(2));
        Self { settings }
    }

    /// Settings with a placeholder script for every worker slot.
    pub fn with_all_scripts() -> Self {
        let mut builder = Self::new();
        for kind in ModelKind::WORKER_SLOTS {
            builder = builder.script(kind, &format!("/opt/neurodrive/{}/main.py", kind.id()));
        }
        builder
    }

    pub fn interpreter(mut self, interpreter: &str) -> Self {
        self.settings.set_interpreter(interpreter);
        self
    }

    pub fn script(mut self, kind: ModelKind, path: &str) -> Self {
        self.settings.set_script_path(kind, path);
        self
    }

    pub fn worker(mut self, kind: ModelKind, script: &str, args: &[&str]) -> Self {
        let mut cfg = ScriptConfig::new(script);
        cfg.args = args.iter().map(|a| a.to_string()).collect();
        self.settings.set_worker(kind, cfg);
        self
    }

    pub fn grace(mut self, grace: Duration) -> Self {
        self.settings.set_grace_period(grace);
        self
    }

    pub fn kill_timeout(mut self, timeout: Duration) -> Self {
        self.settings.set_kill_timeout(timeout);
        self
    }

    pub fn output_history_lines(mut self, lines: usize) -> Self {
        self.settings.set_output_history_lines(lines);
        self
    }

    pub fn build(self) -> Settings {
        self.settings
    }
}

impl Default for SettingsBuilder {
    fn default() -> Self {
        Self::new()
    }
}
