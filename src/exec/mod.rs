// src/exec/mod.rs

//! Script execution layer.
//!
//! This module runs the traced script as a child process and reports
//! everything it does to the collector.
//!
//! - [`executor`] owns the public [`ScriptExecutor`] state machine.
//! - [`supervisor`] is the per-run task that waits for the child (or a stop
//!   request), tears the process tree down and finalises the session.
//! - [`readers`] turns the child's stdout/stderr into output events.
//! - [`process`] holds the OS-facing signal and process-tree helpers.

pub mod executor;
pub mod process;
pub mod readers;
pub mod supervisor;

use std::fmt;

pub use executor::ScriptExecutor;

/// Lifecycle of a script execution.
///
/// `Idle → Running → {Paused ⇄ Running} → Stopped`; a restart goes from
/// `Stopped` back to `Running` with a fresh process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExecState {
    Idle,
    Running,
    Paused,
    Stopped,
}

impl ExecState {
    /// A child process exists (running or suspended).
    pub fn is_active(self) -> bool {
        matches!(self, ExecState::Running | ExecState::Paused)
    }
}

impl fmt::Display for ExecState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExecState::Idle => "idle",
            ExecState::Running => "running",
            ExecState::Paused => "paused",
            ExecState::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Observable status of the executor, published on a watch channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecStatus {
    pub state: ExecState,
    /// Pid of the live child; `None` unless running or paused.
    pub pid: Option<u32>,
    /// Exit code of the last run. `None` while running, when the process
    /// was killed by a signal, or when it never started.
    pub exit_code: Option<i32>,
}

impl ExecStatus {
    pub(crate) fn idle() -> Self {
        Self {
            state: ExecState::Idle,
            pid: None,
            exit_code: None,
        }
    }
}
