//! Periodic process enumeration and policy enforcement
//!
//! The enforcement loop runs inside the daemon: every tick it refreshes the
//! process table, evaluates each process against the current policy
//! snapshot, and invokes the controller on matches. Decisions are computed
//! by a pure function so the matching semantics are testable without
//! touching live processes.
//!
//! Presentation is decoupled through a broadcast channel of typed events;
//! the daemon's activity log is just one subscriber.

pub mod foreground;

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Local, Utc};
use sysinfo::{PidExt, ProcessExt, System, SystemExt};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::control::ProcessController;
use crate::models::ProcessInfo;
use crate::monitor::foreground::ForegroundDetector;
use crate::policy::{PolicyEngine, PolicyStore};

/// Typed notifications emitted by the enforcement core. Subscribers decide
/// how to present them; the monitor itself stays UI-agnostic.
#[derive(Debug, Clone)]
pub enum MonitorEvent {
    /// A process matched policy and a local termination was attempted
    ProcessBlocked {
        process: ProcessInfo,
        reason: String,
        terminated: bool,
    },
    /// A close command was sent to the reporter for a reported process
    CloseCommandIssued { process: ProcessInfo, reason: String },
    /// The policy snapshot was replaced from disk
    PolicyReloaded { rules: usize, policies: usize },
}

/// One pending termination decided during a tick
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct EnforcementAction {
    pub process: ProcessInfo,
    pub reason: String,
}

/// Evaluate one tick's worth of detections. Within a single call a given
/// process ID produces at most one action, and a foreground rule match
/// short-circuits any further foreground handling.
pub(crate) fn tick_decisions(
    engine: &PolicyEngine,
    processes: &[ProcessInfo],
    foreground: Option<&ProcessInfo>,
    now: DateTime<Local>,
) -> Vec<EnforcementAction> {
    let mut handled: HashSet<i32> = HashSet::new();
    let mut actions = Vec::new();

    for process in processes {
        if let Some(reason) = engine.violation(process, false, now) {
            if handled.insert(process.process_id) {
                actions.push(EnforcementAction {
                    process: process.clone(),
                    reason,
                });
            }
        }
    }

    if let Some(process) = foreground {
        if let Some(reason) = engine.violation(process, true, now) {
            if handled.insert(process.process_id) {
                actions.push(EnforcementAction {
                    process: process.clone(),
                    reason,
                });
            }
        }
    }

    actions
}

/// Daemon-local monitoring loop. Ticks are single-flight: all termination
/// actions of one tick are awaited before the next tick can start.
pub async fn run_enforcement_loop(
    store: Arc<PolicyStore>,
    controller: ProcessController,
    events: broadcast::Sender<MonitorEvent>,
    shutdown: CancellationToken,
) {
    let mut system = System::new_all();
    let detector = ForegroundDetector;
    info!("process monitoring started");

    loop {
        if store.reload_if_changed() {
            let snapshot = store.snapshot();
            let _ = events.send(MonitorEvent::PolicyReloaded {
                rules: snapshot.rules.len(),
                policies: snapshot.policies.len(),
            });
        }

        let snapshot = store.snapshot();
        if snapshot.enable_monitoring {
            let engine = PolicyEngine::from_config(snapshot.clone());
            system.refresh_processes();

            let processes = enumerate_processes(&system);
            let foreground = detector.foreground_process(&system);
            let actions = tick_decisions(&engine, &processes, foreground.as_ref(), Local::now());

            for action in actions {
                warn!(
                    "process {} (PID {}) matched '{}', attempting closure",
                    action.process.process_name, action.process.process_id, action.reason
                );
                let terminated = controller.close_gracefully(action.process.process_id).await;
                let _ = events.send(MonitorEvent::ProcessBlocked {
                    process: action.process,
                    reason: action.reason,
                    terminated,
                });
            }
        }

        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = tokio::time::sleep(snapshot.check_interval()) => {}
        }
    }

    info!("process monitoring stopped");
}

/// Snapshot every readable process in the table. Processes whose metadata
/// cannot be read are excluded, not treated as errors.
fn enumerate_processes(system: &System) -> Vec<ProcessInfo> {
    system
        .processes()
        .iter()
        .filter_map(|(pid, process)| {
            let name = process.name();
            if name.is_empty() {
                return None;
            }
            Some(ProcessInfo {
                process_id: pid.as_u32() as i32,
                process_name: name.to_string(),
                window_title: String::new(),
                executable_path: process.exe().display().to_string(),
                detected_at: Utc::now(),
            })
        })
        .collect()
}
