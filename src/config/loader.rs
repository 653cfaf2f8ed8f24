// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::model::{Config, RawConfig};
use crate::errors::Result;

/// Environment variable that turns on tracing of the bootstrap's own frames.
pub const TRACE_INTERNALS_ENV: &str = "PYSCOPE_TRACE_INTERNALS";

/// Environment variable that overrides `[exec].interpreter`.
pub const INTERPRETER_ENV: &str = "PYSCOPE_PYTHON";

/// Load a configuration file from a given path and return the raw `RawConfig`.
///
/// This only performs TOML deserialization; it does **not** perform semantic
/// validation. Use [`load_and_validate`] for that.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawConfig> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;

    let config: RawConfig = toml::from_str(&contents)?;

    Ok(config)
}

/// Load a configuration file from path and run validation.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<Config> {
    let raw_config = load_from_path(&path)?;
    let config = Config::try_from(raw_config)?;
    Ok(config)
}

/// Resolve the effective configuration for a run.
///
/// - An explicit path must exist and be valid.
/// - Otherwise `Pyscope.toml` in the working directory is used if present.
/// - Otherwise built-in defaults.
///
/// Environment overrides from the process environment are applied last.
pub fn resolve(explicit: Option<&Path>) -> Result<Config> {
    let raw = match explicit {
        Some(path) => load_from_path(path)?,
        None => {
            let path = default_config_path();
            if path.is_file() {
                debug!(path = %path.display(), "using config from working directory");
                load_from_path(&path)?
            } else {
                RawConfig::default()
            }
        }
    };

    let raw = apply_env_overrides(raw, |key| std::env::var(key).ok());
    Config::try_from(raw)
}

/// Apply `PYSCOPE_*` overrides, reading variables through `lookup`.
pub fn apply_env_overrides<F>(mut raw: RawConfig, lookup: F) -> RawConfig
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(value) = lookup(TRACE_INTERNALS_ENV) {
        match parse_flag(&value) {
            Some(flag) => raw.trace.trace_internals = flag,
            None => debug!(%value, "ignoring unrecognised {TRACE_INTERNALS_ENV} value"),
        }
    }

    if let Some(interpreter) = lookup(INTERPRETER_ENV) {
        if !interpreter.trim().is_empty() {
            raw.exec.interpreter = interpreter;
        }
    }

    raw
}

fn parse_flag(s: &str) -> Option<bool> {
    match s.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}

/// Default config file looked up in the working directory.
pub fn default_config_path() -> PathBuf {
    PathBuf::from("Pyscope.toml")
}
