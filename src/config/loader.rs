// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::Result;

/// Load a configuration file from a given path and return the raw `RawConfigFile`.
///
/// This only performs TOML deserialization; it does **not** perform semantic
/// validation or fill in default worker scripts. Use [`load_and_validate`]
/// for that.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawConfigFile> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;

    let config: RawConfigFile = toml::from_str(&contents)?;

    Ok(config)
}

/// Load a configuration file from path and run validation.
///
/// - Reads TOML.
/// - Applies field defaults (handled by `serde` + `Default` impls).
/// - Checks timeouts, the interpreter settings and worker slot names.
/// - Fills worker slots the file does not mention with built-in scripts.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<ConfigFile> {
    let raw_config = load_from_path(&path)?;
    let config = ConfigFile::try_from(raw_config)?;
    Ok(config)
}

/// Load the config the CLI points at.
///
/// The default path is optional: when it does not exist the built-in
/// configuration is used. Any other path must exist.
pub fn load_or_default(path: impl AsRef<Path>) -> Result<ConfigFile> {
    let path = path.as_ref();
    if path == default_config_path() && !path.exists() {
        info!(
            path = %path.display(),
            "no config file found; using built-in worker configuration"
        );
        return Ok(ConfigFile::default());
    }
    load_and_validate(path)
}

/// `Neurodrive.toml` in the current working directory.
pub fn default_config_path() -> PathBuf {
    PathBuf::from("Neurodrive.toml")
}
