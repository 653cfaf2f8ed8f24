// src/lib.rs

pub mod cli;
pub mod collector;
pub mod config;
pub mod errors;
pub mod exec;
pub mod format;
pub mod logging;
pub mod render;
pub mod trace;

use std::io::Write;

use anyhow::Result;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::cli::{CliArgs, Command, Control, RunArgs};
use crate::collector::{Event, EventStream};
use crate::config::Config;
use crate::exec::{ExecState, ScriptExecutor};
use crate::render::{MAX_ERROR_TRACE_LINES, TextRenderer, render_failure, render_json};

/// High-level entry point used by `main.rs`.
///
/// Returns the process exit code.
pub async fn run(args: CliArgs) -> Result<i32> {
    let config = config::resolve(args.config.as_deref())?;
    debug!(?config, "effective configuration");

    match args.command {
        Command::Run(run_args) => run_script(config, run_args).await,
    }
}

/// Writes events to stdout in the selected format.
struct Printer {
    json: bool,
    text: TextRenderer,
}

impl Printer {
    fn print(&mut self, event: &Event) -> Result<()> {
        let rendered = if self.json {
            render_json(event)?
        } else {
            self.text.render(event)
        };
        let mut stdout = std::io::stdout().lock();
        writeln!(stdout, "{rendered}")?;
        stdout.flush()?;
        Ok(())
    }

    fn drain(&mut self, events: &EventStream) -> Result<()> {
        while let Some(event) = events.try_next_event() {
            self.print(&event)?;
        }
        Ok(())
    }
}

async fn run_script(config: Config, args: RunArgs) -> Result<i32> {
    let executor = ScriptExecutor::new(&args.script, args.script_args.clone(), config);
    let events = executor.events();
    let mut printer = Printer {
        json: args.json,
        text: TextRenderer::new(),
    };

    // Subscribe before starting so a script that exits immediately is seen.
    let mut status_rx = executor.subscribe();

    if executor.start().await.is_err() {
        report_failure(&events);
        return Ok(1);
    }

    let mut controls = args.interactive.then(spawn_control_reader);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut interrupted = false;

    loop {
        tokio::select! {
            event = events.next_event() => printer.print(&event)?,

            res = &mut ctrl_c, if !interrupted => {
                interrupted = true;
                if let Err(e) = res {
                    warn!(error = %e, "failed to listen for Ctrl+C");
                    continue;
                }
                info!("Ctrl+C received; stopping script");
                executor.stop().await;
                break;
            }

            command = next_control(&mut controls) => {
                let command = command.unwrap_or(Control::Quit);
                debug!(%command, "control command");
                match command {
                    Control::Pause => executor.pause(),
                    Control::Resume => executor.resume(),
                    Control::Stop => executor.stop().await,
                    Control::Restart => {
                        // Finish the old session first so its last lines are
                        // printed before the collector is cleared.
                        executor.stop().await;
                        printer.drain(&events)?;
                        printer.text.reset();
                        if executor.restart().await.is_err() {
                            report_failure(&events);
                        }
                    }
                    Control::Quit => {
                        executor.stop().await;
                        break;
                    }
                }
            }

            changed = status_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = status_rx.borrow_and_update().state;
                debug!(%state, "executor state changed");
                if state == ExecState::Stopped && !args.interactive {
                    break;
                }
            }
        }
    }

    printer.drain(&events)?;
    warn_on_diagnostics(&events);

    let status = executor.status();
    if args.exit_code {
        Ok(status.exit_code.unwrap_or(1))
    } else {
        Ok(0)
    }
}

fn report_failure(events: &EventStream) {
    match events.history().exceptions.last() {
        Some(exc) => eprintln!("{}", render_failure(exc, MAX_ERROR_TRACE_LINES)),
        None => eprintln!("pyscope: failed to start script"),
    }
}

fn warn_on_diagnostics(events: &EventStream) {
    let d = events.diagnostics();
    if d.orphan_returns + d.mismatched_returns + d.malformed_messages + d.dropped_in_child > 0 {
        warn!(
            orphan_returns = d.orphan_returns,
            mismatched_returns = d.mismatched_returns,
            malformed_messages = d.malformed_messages,
            dropped_in_child = d.dropped_in_child,
            "event stream is incomplete"
        );
    }
}

/// Read control commands from stdin. The channel closes at EOF.
fn spawn_control_reader() -> mpsc::Receiver<Control> {
    let (tx, rx) = mpsc::channel(8);
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if line.trim().is_empty() {
                continue;
            }
            match line.parse::<Control>() {
                Ok(command) => {
                    if tx.send(command).await.is_err() {
                        break;
                    }
                }
                Err(msg) => eprintln!("pyscope: {msg}"),
            }
        }
        debug!("control input closed");
    });
    rx
}

/// Next control command; pending forever when there is no control input.
async fn next_control(controls: &mut Option<mpsc::Receiver<Control>>) -> Option<Control> {
    match controls {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}
