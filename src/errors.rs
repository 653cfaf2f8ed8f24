// src/errors.rs

//! Crate-wide error type and result alias.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PyscopeError {
    #[error("Script not found: {}", .0.display())]
    ScriptNotFound(PathBuf),

    #[error("Failed to spawn interpreter for {}: {source}", script.display())]
    Spawn {
        script: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Trace protocol error: {0}")]
    WireError(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl PyscopeError {
    /// Stable short name, used as the `exception_type` of events the
    /// executor records on its own behalf (e.g. spawn failures).
    pub fn kind(&self) -> &'static str {
        match self {
            PyscopeError::ScriptNotFound(_) => "ScriptNotFound",
            PyscopeError::Spawn { .. } => "SpawnError",
            PyscopeError::ConfigError(_) => "ConfigError",
            PyscopeError::IoError(_) => "IoError",
            PyscopeError::TomlError(_) => "TomlError",
            PyscopeError::WireError(_) => "WireError",
            PyscopeError::Other(_) => "Error",
        }
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, PyscopeError>;
