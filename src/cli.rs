// src/cli.rs

//! CLI argument parsing using `clap`.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// Command-line arguments for `pyscope`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "pyscope",
    version,
    about = "Run a Python script and watch its output, calls, returns and exceptions live.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    ///
    /// Default: `Pyscope.toml` in the current working directory if it
    /// exists, otherwise built-in defaults.
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `PYSCOPE_LOG` or a default level will be used.
    #[arg(long, global = true, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Run a script under instrumentation.
    Run(RunArgs),
}

#[derive(Debug, Clone, Args)]
pub struct RunArgs {
    /// Script to run.
    #[arg(value_name = "SCRIPT")]
    pub script: PathBuf,

    /// Print events as JSON lines instead of text.
    #[arg(long)]
    pub json: bool,

    /// Read control commands (pause, resume, restart, stop) from stdin.
    #[arg(long)]
    pub interactive: bool,

    /// Exit with the script's own exit code.
    #[arg(long)]
    pub exit_code: bool,

    /// Arguments passed through to the script.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true, value_name = "ARGS")]
    pub script_args: Vec<String>,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// A line typed on stdin in `--interactive` mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Pause,
    Resume,
    Restart,
    Stop,
    Quit,
}

impl FromStr for Control {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "p" | "pause" => Ok(Control::Pause),
            "r" | "resume" | "continue" => Ok(Control::Resume),
            "restart" => Ok(Control::Restart),
            "s" | "stop" => Ok(Control::Stop),
            "q" | "quit" | "exit" => Ok(Control::Quit),
            other => Err(format!(
                "unknown command: {other} (expected pause, resume, restart, stop or quit)"
            )),
        }
    }
}

impl fmt::Display for Control {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Control::Pause => "pause",
            Control::Resume => "resume",
            Control::Restart => "restart",
            Control::Stop => "stop",
            Control::Quit => "quit",
        };
        f.write_str(name)
    }
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
