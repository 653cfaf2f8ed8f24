// src/config/validate.rs

use crate::config::model::{Config, RawConfig};
use crate::errors::{PyscopeError, Result};
use crate::format::TRUNCATION_MARKER;
use crate::trace::filter::build_exclude_set;

impl TryFrom<RawConfig> for Config {
    type Error = PyscopeError;

    fn try_from(raw: RawConfig) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(Config::new_unchecked(raw.exec, raw.trace, raw.format))
    }
}

/// Re-run validation on an already constructed config (e.g. one built by
/// hand in tests).
pub fn validate_config(cfg: &Config) -> Result<()> {
    let raw = RawConfig {
        exec: cfg.exec.clone(),
        trace: cfg.trace.clone(),
        format: cfg.format,
    };
    validate_raw_config(&raw)
}

fn validate_raw_config(cfg: &RawConfig) -> Result<()> {
    validate_exec(cfg)?;
    validate_trace(cfg)?;
    validate_format(cfg)?;
    Ok(())
}

fn validate_exec(cfg: &RawConfig) -> Result<()> {
    if cfg.exec.interpreter.trim().is_empty() {
        return Err(PyscopeError::ConfigError(
            "[exec].interpreter must not be empty".to_string(),
        ));
    }

    for key in cfg.exec.env.keys() {
        if key.is_empty() || key.contains('=') || key.contains('\0') {
            return Err(PyscopeError::ConfigError(format!(
                "[exec].env contains an invalid variable name: {key:?}"
            )));
        }
    }

    Ok(())
}

fn validate_trace(cfg: &RawConfig) -> Result<()> {
    if cfg.trace.queue_capacity == 0 {
        return Err(PyscopeError::ConfigError(
            "[trace].queue_capacity must be >= 1 (got 0)".to_string(),
        ));
    }

    build_exclude_set(&cfg.trace.exclude)?;
    Ok(())
}

fn validate_format(cfg: &RawConfig) -> Result<()> {
    let min = TRUNCATION_MARKER.chars().count() + 1;

    if cfg.format.compact_limit < min {
        return Err(PyscopeError::ConfigError(format!(
            "[format].compact_limit must be >= {min} (got {})",
            cfg.format.compact_limit
        )));
    }

    if cfg.format.argument_limit < cfg.format.compact_limit {
        return Err(PyscopeError::ConfigError(format!(
            "[format].argument_limit ({}) must be >= compact_limit ({})",
            cfg.format.argument_limit, cfg.format.compact_limit
        )));
    }

    Ok(())
}
