// src/exec/process.rs

//! OS-facing process-tree control.
//!
//! The script runs as the leader of its own process group (unix), so most
//! signals go to the whole group at once. Descendants that moved to another
//! group (`setsid`, daemonising helpers) are found through parent links in a
//! `sysinfo` snapshot and signalled individually.
//!
//! Every function here swallows "no such process" and similar failures:
//! a process that is already gone needs no signal.

use std::collections::{HashMap, HashSet, VecDeque};
use std::time::Duration;

use sysinfo::{Pid, ProcessStatus, System};
use tracing::{debug, trace, warn};

/// How often `kill_tree` re-checks for survivors during the grace period.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// All transitive children of `root`, excluding `root` itself.
pub fn descendants(root: u32) -> Vec<u32> {
    let mut system = System::new();
    system.refresh_processes();
    descendants_in(&system, root)
}

fn descendants_in(system: &System, root: u32) -> Vec<u32> {
    let mut children: HashMap<u32, Vec<u32>> = HashMap::new();
    for (pid, process) in system.processes() {
        if let Some(parent) = process.parent() {
            children
                .entry(parent.as_u32())
                .or_default()
                .push(pid.as_u32());
        }
    }

    let mut seen = HashSet::from([root]);
    let mut queue = VecDeque::from([root]);
    let mut out = Vec::new();
    while let Some(pid) = queue.pop_front() {
        for &child in children.get(&pid).into_iter().flatten() {
            if seen.insert(child) {
                out.push(child);
                queue.push_back(child);
            }
        }
    }
    out
}

/// Pids from `pids` that still exist and are not zombies.
fn survivors(pids: &[u32]) -> Vec<u32> {
    let mut system = System::new();
    system.refresh_processes();
    pids.iter()
        .copied()
        .filter(|&pid| {
            system
                .process(Pid::from_u32(pid))
                .is_some_and(|p| p.status() != ProcessStatus::Zombie)
        })
        .collect()
}

/// Terminate `root` and every process it spawned.
///
/// Sends a graceful termination signal to the whole tree, waits up to
/// `grace` for it to disappear, then force-kills whatever is left. The tree
/// is snapshotted before signalling so reparented orphans are not missed.
pub async fn kill_tree(root: u32, grace: Duration) {
    let mut tree = vec![root];
    tree.extend(descendants(root));
    debug!(root, members = tree.len(), "terminating process tree");

    platform::terminate(root, &tree);

    let deadline = tokio::time::Instant::now() + grace;
    let mut remaining = survivors(&tree);
    while !remaining.is_empty() && tokio::time::Instant::now() < deadline {
        tokio::time::sleep(POLL_INTERVAL).await;
        remaining = survivors(&tree);
    }

    if remaining.is_empty() {
        trace!(root, "process tree exited gracefully");
        return;
    }

    warn!(root, ?remaining, "processes ignored termination; force killing");
    platform::force_kill(root, &remaining);
}

/// Suspend the script's process group.
pub fn suspend_tree(root: u32) {
    platform::suspend(root);
}

/// Continue a suspended process group.
pub fn resume_tree(root: u32) {
    platform::resume(root);
}

/// Kill whatever is left in the script's process group, without waiting,
/// and return how many processes were found there.
///
/// Call right after the script itself has been reaped. The group is only
/// signalled while it still has members: an empty group's id is free for
/// reuse and may already name someone else's group.
pub fn reap_group(root: u32) -> usize {
    platform::reap_group(root)
}

/// Whether pause/resume do anything on this platform.
pub const fn supports_suspend() -> bool {
    cfg!(unix)
}

#[cfg(unix)]
mod platform {
    use nix::sys::signal::{Signal, kill, killpg};
    use nix::unistd::{Pid, getpgid};
    use sysinfo::System;
    use tracing::trace;

    fn signal_pid(pid: u32, signal: Signal) {
        let Ok(raw) = i32::try_from(pid) else {
            return;
        };
        if let Err(e) = kill(Pid::from_raw(raw), signal) {
            trace!(pid, ?signal, error = %e, "signal not delivered");
        }
    }

    fn signal_group(pgid: u32, signal: Signal) {
        let Ok(raw) = i32::try_from(pgid) else {
            return;
        };
        if let Err(e) = killpg(Pid::from_raw(raw), signal) {
            trace!(pgid, ?signal, error = %e, "group signal not delivered");
        }
    }

    pub(super) fn terminate(root: u32, tree: &[u32]) {
        signal_group(root, Signal::SIGTERM);
        for &pid in tree {
            signal_pid(pid, Signal::SIGTERM);
        }
        // A paused tree cannot act on SIGTERM until it runs again.
        signal_group(root, Signal::SIGCONT);
        for &pid in tree {
            signal_pid(pid, Signal::SIGCONT);
        }
    }

    pub(super) fn force_kill(root: u32, remaining: &[u32]) {
        signal_group(root, Signal::SIGKILL);
        for &pid in remaining {
            signal_pid(pid, Signal::SIGKILL);
        }
    }

    pub(super) fn suspend(root: u32) {
        signal_group(root, Signal::SIGSTOP);
    }

    pub(super) fn resume(root: u32) {
        signal_group(root, Signal::SIGCONT);
    }

    /// Live processes whose process group is `pgid`.
    pub(super) fn group_members(pgid: u32) -> Vec<u32> {
        let Ok(group) = i32::try_from(pgid) else {
            return Vec::new();
        };
        let mut system = System::new();
        system.refresh_processes();
        system
            .processes()
            .keys()
            .map(|pid| pid.as_u32())
            .filter(|&pid| {
                i32::try_from(pid)
                    .ok()
                    .and_then(|raw| getpgid(Some(Pid::from_raw(raw))).ok())
                    .is_some_and(|g| g.as_raw() == group)
            })
            .collect()
    }

    pub(super) fn reap_group(root: u32) -> usize {
        let members = group_members(root);
        if !members.is_empty() {
            signal_group(root, Signal::SIGKILL);
        }
        members.len()
    }
}

#[cfg(not(unix))]
mod platform {
    use sysinfo::{Pid, System};
    use tracing::trace;

    fn kill_all(pids: &[u32]) {
        let mut system = System::new();
        system.refresh_processes();
        for &pid in pids {
            if let Some(process) = system.process(Pid::from_u32(pid)) {
                if !process.kill() {
                    trace!(pid, "kill not delivered");
                }
            }
        }
    }

    pub(super) fn terminate(_root: u32, tree: &[u32]) {
        kill_all(tree);
    }

    pub(super) fn force_kill(_root: u32, remaining: &[u32]) {
        kill_all(remaining);
    }

    pub(super) fn suspend(_root: u32) {}

    pub(super) fn resume(_root: u32) {}

    // The root is gone and its pid may be reused; only orphans that still
    // point at it are ours.
    pub(super) fn reap_group(root: u32) -> usize {
        let orphans = super::descendants(root);
        kill_all(&orphans);
        orphans.len()
    }
}
