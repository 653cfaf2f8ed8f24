// src/config/model.rs

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Deserialize;

use crate::format::{ARGUMENT_LIMIT, COMPACT_LIMIT};

/// Top-level configuration as read from a TOML file.
///
/// ```toml
/// [exec]
/// interpreter = "python3"
/// stop_grace_ms = 2000
/// env = { APP_MODE = "debug" }
///
/// [trace]
/// include_private = false
/// exclude = ["**/vendor/**"]
///
/// [format]
/// compact_limit = 100
/// argument_limit = 1000
/// ```
///
/// All sections are optional and have reasonable defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawConfig {
    #[serde(default)]
    pub exec: ExecSection,

    #[serde(default)]
    pub trace: TraceSection,

    #[serde(default)]
    pub format: FormatSection,
}

/// `[exec]` section: how the script process is launched and stopped.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ExecSection {
    /// Interpreter used to run the tracing bootstrap.
    #[serde(default = "default_interpreter")]
    pub interpreter: String,

    /// How long `stop` waits after the graceful signal before force-killing.
    #[serde(default = "default_stop_grace_ms")]
    pub stop_grace_ms: u64,

    /// How long to wait for output readers to hit EOF after the process
    /// exits (a grandchild may still hold the pipes).
    #[serde(default = "default_drain_timeout_ms")]
    pub drain_timeout_ms: u64,

    /// Extra environment variables for the script, on top of the parent
    /// environment.
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

fn default_interpreter() -> String {
    "python3".to_string()
}

fn default_stop_grace_ms() -> u64 {
    2000
}

fn default_drain_timeout_ms() -> u64 {
    2000
}

impl Default for ExecSection {
    fn default() -> Self {
        Self {
            interpreter: default_interpreter(),
            stop_grace_ms: default_stop_grace_ms(),
            drain_timeout_ms: default_drain_timeout_ms(),
            env: BTreeMap::new(),
        }
    }
}

impl ExecSection {
    pub fn stop_grace(&self) -> Duration {
        Duration::from_millis(self.stop_grace_ms)
    }

    pub fn drain_timeout(&self) -> Duration {
        Duration::from_millis(self.drain_timeout_ms)
    }
}

/// `[trace]` section: which calls are reported.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TraceSection {
    /// Report functions whose name starts with `_`.
    #[serde(default)]
    pub include_private: bool,

    /// Glob patterns; calls from matching files are never reported.
    #[serde(default)]
    pub exclude: Vec<String>,

    /// Report the tracing bootstrap's own frames. Only useful when debugging
    /// pyscope itself.
    #[serde(default)]
    pub trace_internals: bool,

    /// Capacity of the event queue inside the traced process.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

fn default_queue_capacity() -> usize {
    10_000
}

impl Default for TraceSection {
    fn default() -> Self {
        Self {
            include_private: false,
            exclude: Vec::new(),
            trace_internals: false,
            queue_capacity: default_queue_capacity(),
        }
    }
}

/// `[format]` section: display bounds for values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct FormatSection {
    #[serde(default = "default_compact_limit")]
    pub compact_limit: usize,

    #[serde(default = "default_argument_limit")]
    pub argument_limit: usize,
}

fn default_compact_limit() -> usize {
    COMPACT_LIMIT
}

fn default_argument_limit() -> usize {
    ARGUMENT_LIMIT
}

impl Default for FormatSection {
    fn default() -> Self {
        Self {
            compact_limit: default_compact_limit(),
            argument_limit: default_argument_limit(),
        }
    }
}

/// Validated configuration.
///
/// Constructed from [`RawConfig`] via `TryFrom` (see `validate.rs`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub exec: ExecSection,
    pub trace: TraceSection,
    pub format: FormatSection,
}

impl Config {
    pub(crate) fn new_unchecked(
        exec: ExecSection,
        trace: TraceSection,
        format: FormatSection,
    ) -> Self {
        Self {
            exec,
            trace,
            format,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new_unchecked(
            ExecSection::default(),
            TraceSection::default(),
            FormatSection::default(),
        )
    }
}
