// src/exec/supervisor.rs

//! Per-run supervision task.

use std::process::ExitStatus;
use std::sync::Arc;
use std::time::Duration;

use tokio::process::Child;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::collector::{Collector, OutputStream};
use crate::trace::listener::ListenerSummary;

use super::process;
use super::{ExecState, ExecStatus};

/// Everything the supervisor owns for one run.
pub(crate) struct Supervised {
    pub child: Child,
    pub pid: u32,
    pub readers: Vec<JoinHandle<u64>>,
    pub listener: JoinHandle<ListenerSummary>,
    pub stop_accepting: oneshot::Sender<()>,
    pub collector: Arc<Collector>,
    pub status: Arc<watch::Sender<ExecStatus>>,
    pub stop_grace: Duration,
    pub drain_timeout: Duration,
}

enum Ending {
    Exited(std::io::Result<ExitStatus>),
    Stopped(std::io::Result<ExitStatus>),
}

/// Wait for the child to exit on its own or for a stop request, then drain
/// the readers and the trace channel and mark the session stopped.
///
/// A dropped `cancel_rx` sender counts as a stop request.
pub(crate) async fn supervise(run: Supervised, mut cancel_rx: oneshot::Receiver<()>) {
    let Supervised {
        mut child,
        pid,
        readers,
        listener,
        stop_accepting,
        collector,
        status,
        stop_grace,
        drain_timeout,
    } = run;

    let ending = tokio::select! {
        res = child.wait() => Ending::Exited(res),
        _ = &mut cancel_rx => {
            info!(pid, "stop requested; terminating process tree");
            process::kill_tree(pid, stop_grace).await;
            Ending::Stopped(child.wait().await)
        }
    };

    // Background children still hold the output pipes; kill them while the
    // group id is still ours.
    let leftovers = process::reap_group(pid);
    if leftovers > 0 {
        info!(pid, leftovers, "killed processes the script left behind");
    }

    drain_readers(readers, drain_timeout).await;

    // No connection can arrive any more; if one is open, its EOF follows
    // the child's exit.
    let _ = stop_accepting.send(());
    finish_listener(listener, drain_timeout).await;

    let (notice, exit_code) = describe(&ending);
    info!(pid, ?exit_code, "{notice}");
    collector.add_output(notice, OutputStream::System);

    status.send_modify(|s| {
        s.state = ExecState::Stopped;
        s.pid = None;
        s.exit_code = exit_code;
    });
}

async fn drain_readers(readers: Vec<JoinHandle<u64>>, limit: Duration) {
    for mut reader in readers {
        match tokio::time::timeout(limit, &mut reader).await {
            Ok(Ok(lines)) => debug!(lines, "output reader finished"),
            Ok(Err(e)) => warn!(error = %e, "output reader task failed"),
            Err(_) => {
                // A descendant outside the killed tree still holds the pipe.
                warn!("output reader did not reach EOF in time; abandoning it");
                reader.abort();
            }
        }
    }
}

async fn finish_listener(mut listener: JoinHandle<ListenerSummary>, limit: Duration) {
    match tokio::time::timeout(limit, &mut listener).await {
        Ok(Ok(summary)) => {
            if !summary.connected {
                debug!("script ran without a trace connection");
            }
            debug!(lines = summary.lines, "trace listener finished");
        }
        Ok(Err(e)) => warn!(error = %e, "trace listener task failed"),
        Err(_) => {
            warn!("trace channel still open after exit; abandoning it");
            listener.abort();
        }
    }
}

fn describe(ending: &Ending) -> (String, Option<i32>) {
    match ending {
        Ending::Exited(Ok(status)) => match status.code() {
            Some(code) => (format!("process exited with code {code}"), Some(code)),
            None => (terminated_by_signal(status), None),
        },
        Ending::Stopped(Ok(status)) => ("process stopped".to_string(), status.code()),
        Ending::Exited(Err(e)) | Ending::Stopped(Err(e)) => {
            (format!("lost track of process: {e}"), None)
        }
    }
}

#[cfg(unix)]
fn terminated_by_signal(status: &ExitStatus) -> String {
    use std::os::unix::process::ExitStatusExt;
    match status.signal() {
        Some(sig) => format!("process terminated by signal {sig}"),
        None => "process terminated".to_string(),
    }
}

#[cfg(not(unix))]
fn terminated_by_signal(_status: &ExitStatus) -> String {
    "process terminated".to_string()
}
