//! Graceful-close-then-kill termination of policy-violating processes
//!
//! Termination is best effort: a process that has already exited counts as
//! success, and failures are logged but never propagated to the caller.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use nix::errno::Errno;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid as UnixPid;
use sysinfo::{Pid, PidExt, ProcessExt, ProcessStatus, System, SystemExt};
use tracing::{debug, info, warn};

use crate::constants::{EXIT_POLL_INTERVAL, GRACEFUL_EXIT_TIMEOUT, KILL_EXIT_TIMEOUT};

#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessController;

impl ProcessController {
    /// Ask the process to shut down (SIGTERM) and give it five seconds to
    /// exit; escalate to a forced kill of the whole tree on timeout.
    /// Returns true once the process is gone.
    pub async fn close_gracefully(&self, pid: i32) -> bool {
        if !process_is_running(pid) {
            debug!("process {pid} has already exited");
            return true;
        }

        info!("requesting graceful close of process {pid}");
        match kill(UnixPid::from_raw(pid), Signal::SIGTERM) {
            Ok(()) => {
                if wait_for_exit(pid, GRACEFUL_EXIT_TIMEOUT).await {
                    info!("process {pid} closed gracefully");
                    return true;
                }
            }
            Err(Errno::ESRCH) => return true,
            Err(err) => warn!("failed to signal process {pid}: {err}"),
        }

        warn!("graceful close failed for process {pid}, forcing kill");
        self.kill_tree(pid).await
    }

    /// Forcibly terminate a process and its descendants, children first.
    /// A process that is already gone counts as success.
    pub async fn kill_tree(&self, pid: i32) -> bool {
        if !process_is_running(pid) {
            debug!("process {pid} not found, nothing to kill");
            return true;
        }

        let descendants = descendant_pids(pid);
        info!(
            "killing process tree for {pid} ({} descendant(s))",
            descendants.len()
        );

        let mut all_exited = true;
        for child in descendants {
            all_exited &= self.terminate(child).await;
        }
        all_exited &= self.terminate(pid).await;
        all_exited
    }

    async fn terminate(&self, pid: i32) -> bool {
        match kill(UnixPid::from_raw(pid), Signal::SIGKILL) {
            Err(Errno::ESRCH) => true,
            Err(err) => {
                warn!("failed to kill process {pid}: {err}");
                false
            }
            Ok(()) => {
                if wait_for_exit(pid, KILL_EXIT_TIMEOUT).await {
                    debug!("process {pid} terminated");
                    true
                } else {
                    warn!("process {pid} did not exit after SIGKILL");
                    false
                }
            }
        }
    }
}

/// Whether the process exists and is not a zombie. Reaped-but-unwaited
/// children would otherwise count as alive forever.
pub fn process_is_running(pid: i32) -> bool {
    if pid <= 0 {
        return false;
    }
    let target = Pid::from_u32(pid as u32);
    let mut system = System::new();
    if !system.refresh_process(target) {
        return false;
    }
    match system.process(target) {
        Some(process) => !matches!(process.status(), ProcessStatus::Zombie | ProcessStatus::Dead),
        None => false,
    }
}

async fn wait_for_exit(pid: i32, timeout: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if !process_is_running(pid) {
            return true;
        }
        tokio::time::sleep(EXIT_POLL_INTERVAL).await;
    }
    !process_is_running(pid)
}

/// Transitive descendants of a process, deepest first, discovered by
/// walking parent links in the live process table.
fn descendant_pids(root: i32) -> Vec<i32> {
    let mut system = System::new();
    system.refresh_processes();

    let mut children: HashMap<i32, Vec<i32>> = HashMap::new();
    for (pid, process) in system.processes() {
        if let Some(parent) = process.parent() {
            children
                .entry(parent.as_u32() as i32)
                .or_default()
                .push(pid.as_u32() as i32);
        }
    }

    let mut ordered = Vec::new();
    let mut queue = VecDeque::from([root]);
    while let Some(next) = queue.pop_front() {
        if let Some(kids) = children.get(&next) {
            for &kid in kids {
                ordered.push(kid);
                queue.push_back(kid);
            }
        }
    }
    // Children die before their parents
    ordered.reverse();
    ordered
}
