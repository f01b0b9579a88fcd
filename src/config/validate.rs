// src/config/validate.rs

use crate::config::model::{default_workers, ConfigFile, RawConfigFile};
use crate::errors::{NeurodriveError, Result};
use crate::types::ModelKind;

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = crate::errors::NeurodriveError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;

        let mut worker = raw.worker;
        for (kind, script) in default_workers() {
            worker.entry(kind).or_insert(script);
        }

        Ok(ConfigFile::new_unchecked(raw.config, worker))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    validate_timeouts(cfg)?;
    validate_interpreter(cfg)?;
    validate_workers(cfg)?;
    Ok(())
}

fn validate_timeouts(cfg: &RawConfigFile) -> Result<()> {
    let checks = [
        ("grace_timeout_ms", cfg.config.grace_timeout_ms),
        ("kill_timeout_ms", cfg.config.kill_timeout_ms),
        ("probe_timeout_ms", cfg.config.probe_timeout_ms),
        ("output_history_lines", cfg.config.output_history_lines as u64),
    ];

    for (field, value) in checks {
        if value == 0 {
            return Err(NeurodriveError::ConfigError(format!(
                "[config].{field} must be >= 1 (got 0)"
            )));
        }
    }
    Ok(())
}

fn validate_interpreter(cfg: &RawConfigFile) -> Result<()> {
    match cfg.config.interpreter.as_deref() {
        Some(name) if name.trim().is_empty() => Err(NeurodriveError::ConfigError(
            "[config].interpreter must not be blank".to_string(),
        )),
        Some(_) => Ok(()),
        None => {
            let usable = cfg
                .config
                .interpreter_candidates
                .iter()
                .any(|c| !c.trim().is_empty());
            if usable {
                Ok(())
            } else {
                Err(NeurodriveError::ConfigError(
                    "[config].interpreter_candidates must name at least one interpreter \
                     when [config].interpreter is unset"
                        .to_string(),
                ))
            }
        }
    }
}

fn validate_workers(cfg: &RawConfigFile) -> Result<()> {
    if cfg.worker.contains_key(&ModelKind::None) {
        return Err(NeurodriveError::ConfigError(
            "[worker.none] is not a worker slot".to_string(),
        ));
    }
    Ok(())
}
