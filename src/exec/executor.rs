// src/exec/executor.rs

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;

use anyhow::anyhow;
use tokio::process::Command;
use tokio::sync::{Mutex, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::collector::events::source_chain;
use crate::collector::{Collector, EventStream, ExceptionReport, OutputStream};
use crate::config::Config;
use crate::errors::{PyscopeError, Result};
use crate::format::ValueFormatter;
use crate::trace::bootstrap;
use crate::trace::{CollectorProvider, TraceFilter, TraceListener};

use super::process;
use super::readers::spawn_reader;
use super::supervisor::{Supervised, supervise};
use super::{ExecState, ExecStatus};

/// Handle on the current run.
struct Session {
    pid: u32,
    cancel: oneshot::Sender<()>,
    supervisor: JoinHandle<()>,
}

/// Runs one script under instrumentation and supervises its process.
///
/// The executor owns the session's [`Collector`]; consumers read it through
/// [`ScriptExecutor::events`]. Lifecycle operations are serialised: a `stop`
/// racing a `start` sees either no process or a fully started one.
pub struct ScriptExecutor {
    script: PathBuf,
    args: Vec<String>,
    config: Config,
    collector: Arc<Collector>,
    status: Arc<watch::Sender<ExecStatus>>,
    session: Mutex<Option<Session>>,
}

impl ScriptExecutor {
    pub fn new(script: impl Into<PathBuf>, args: Vec<String>, config: Config) -> Self {
        let (status, _) = watch::channel(ExecStatus::idle());
        Self {
            script: script.into(),
            args,
            config,
            collector: Arc::new(Collector::new()),
            status: Arc::new(status),
            session: Mutex::new(None),
        }
    }

    pub fn script(&self) -> &Path {
        &self.script
    }

    /// Launch the script.
    ///
    /// No-op while a process is running or paused. On failure the error is
    /// also recorded as an exception event and the executor ends up
    /// `Stopped`.
    pub async fn start(&self) -> Result<()> {
        let mut session = self.session.lock().await;
        if self.state().is_active() {
            debug!(script = %self.script.display(), "start ignored; already running");
            return Ok(());
        }
        if let Some(previous) = session.take() {
            let _ = previous.supervisor.await;
        }

        match self.spawn().await {
            Ok(started) => {
                *session = Some(started);
                Ok(())
            }
            Err(err) => {
                debug!(script = %self.script.display(), error = %err, "failed to start script");
                self.record_failure(&err);
                Err(err)
            }
        }
    }

    async fn spawn(&self) -> Result<Session> {
        let script = resolve_script(&self.script).await?;
        let workdir = script
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        let filter = TraceFilter::from_config(&self.config.trace)?;
        let formatter = ValueFormatter::from_config(&self.config.format);
        let token = Uuid::new_v4().to_string();
        let listener = TraceListener::bind(token.clone()).await?;

        let mut cmd = Command::new(&self.config.exec.interpreter);
        cmd.args(bootstrap::command_args(&script, &self.args))
            .current_dir(&workdir)
            .envs(&self.config.exec.env)
            .env("PYTHONUNBUFFERED", "1")
            .env(bootstrap::ADDR_ENV, listener.addr().to_string())
            .env(bootstrap::TOKEN_ENV, &token)
            .env(
                bootstrap::INTERNALS_ENV,
                if self.config.trace.trace_internals { "1" } else { "0" },
            )
            .env(
                bootstrap::QUEUE_CAPACITY_ENV,
                self.config.trace.queue_capacity.to_string(),
            )
            .env(
                bootstrap::REPR_LIMIT_ENV,
                formatter.argument_limit().to_string(),
            )
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        // Own process group, so signals reach everything the script spawns.
        #[cfg(unix)]
        cmd.process_group(0);

        let mut child = cmd.spawn().map_err(|source| PyscopeError::Spawn {
            script: script.clone(),
            source,
        })?;
        let pid = child
            .id()
            .ok_or_else(|| PyscopeError::Other(anyhow!("spawned process has no pid")))?;

        info!(pid, script = %script.display(), interpreter = %self.config.exec.interpreter, "script started");
        self.collector
            .add_output(format!("process started (pid {pid})"), OutputStream::System);
        self.status.send_replace(ExecStatus {
            state: ExecState::Running,
            pid: Some(pid),
            exit_code: None,
        });

        let mut readers = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            readers.push(spawn_reader(stdout, OutputStream::Stdout, Arc::clone(&self.collector)));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(spawn_reader(stderr, OutputStream::Stderr, Arc::clone(&self.collector)));
        }

        let provider = CollectorProvider::new(Arc::clone(&self.collector), filter, formatter);
        let (stop_accepting, stop_accepting_rx) = oneshot::channel();
        let listener = listener.spawn(provider, stop_accepting_rx);

        let (cancel, cancel_rx) = oneshot::channel();
        let supervisor = tokio::spawn(supervise(
            Supervised {
                child,
                pid,
                readers,
                listener,
                stop_accepting,
                collector: Arc::clone(&self.collector),
                status: Arc::clone(&self.status),
                stop_grace: self.config.exec.stop_grace(),
                drain_timeout: self.config.exec.drain_timeout(),
            },
            cancel_rx,
        ));

        Ok(Session {
            pid,
            cancel,
            supervisor,
        })
    }

    fn record_failure(&self, err: &PyscopeError) {
        self.collector.add_exception(ExceptionReport::new(
            err.kind(),
            err.to_string(),
            source_chain(err),
        ));
        self.status.send_replace(ExecStatus {
            state: ExecState::Stopped,
            pid: None,
            exit_code: None,
        });
    }

    /// Terminate the whole process tree and wait until the session is
    /// finalised. Safe to call in any state.
    pub async fn stop(&self) {
        let mut session = self.session.lock().await;
        let Some(current) = session.take() else {
            debug!("stop ignored; no process");
            return;
        };

        if current.cancel.send(()).is_err() {
            debug!(pid = current.pid, "process already exited");
        }
        if let Err(e) = current.supervisor.await {
            error!(pid = current.pid, error = %e, "supervisor task failed");
        }
        self.status.send_if_modified(|s| {
            if s.state == ExecState::Stopped {
                return false;
            }
            s.state = ExecState::Stopped;
            s.pid = None;
            true
        });
    }

    /// Suspend the running process tree. Only valid while running; a no-op
    /// otherwise and on platforms without job-control signals.
    pub fn pause(&self) {
        if !process::supports_suspend() {
            debug!("pause not supported on this platform");
            return;
        }
        let mut target = None;
        self.status.send_if_modified(|s| match (s.state, s.pid) {
            (ExecState::Running, Some(pid)) => {
                s.state = ExecState::Paused;
                target = Some(pid);
                true
            }
            _ => false,
        });
        if let Some(pid) = target {
            process::suspend_tree(pid);
            info!(pid, "script paused");
        }
    }

    /// Continue a paused process tree. Only valid while paused.
    pub fn resume(&self) {
        let mut target = None;
        self.status.send_if_modified(|s| match (s.state, s.pid) {
            (ExecState::Paused, Some(pid)) => {
                s.state = ExecState::Running;
                target = Some(pid);
                true
            }
            _ => false,
        });
        if let Some(pid) = target {
            process::resume_tree(pid);
            info!(pid, "script resumed");
        }
    }

    /// Stop, clear the collector, start a fresh process.
    pub async fn restart(&self) -> Result<()> {
        info!(script = %self.script.display(), "restarting script");
        self.stop().await;
        self.collector.clear();
        self.start().await
    }

    /// Wait until the current run has finished.
    ///
    /// Returns immediately when nothing is running.
    pub async fn wait(&self) -> ExecStatus {
        let mut rx = self.status.subscribe();
        match rx.wait_for(|s| !s.state.is_active()).await {
            Ok(status) => *status,
            Err(_) => self.status(),
        }
    }

    pub fn status(&self) -> ExecStatus {
        *self.status.borrow()
    }

    pub fn state(&self) -> ExecState {
        self.status.borrow().state
    }

    pub fn exit_code(&self) -> Option<i32> {
        self.status.borrow().exit_code
    }

    pub fn pid(&self) -> Option<u32> {
        self.status.borrow().pid
    }

    /// Status updates, for consumers that react to state changes.
    pub fn subscribe(&self) -> watch::Receiver<ExecStatus> {
        self.status.subscribe()
    }

    /// Read-only view of the session's events.
    pub fn events(&self) -> EventStream {
        EventStream::new(Arc::clone(&self.collector))
    }
}

async fn resolve_script(path: &Path) -> Result<PathBuf> {
    match tokio::fs::canonicalize(path).await {
        Ok(resolved) if resolved.is_file() => Ok(resolved),
        _ => Err(PyscopeError::ScriptNotFound(path.to_path_buf())),
    }
}
