//! Privileged enforcement daemon
//!
//! Owns the policy store and wires the long-running tasks together: the
//! pipe server answering reporter requests, the enforcement loop, and the
//! activity log subscribed to monitor events. Shutdown is cooperative: the
//! accept loop stops immediately, in-flight handlers finish their current
//! message, and the enforcement loop exits at the next suspension point.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use chrono::Local;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::constants::{CLOSE_COMMAND_REASON, EVENT_CHANNEL_CAPACITY};
use crate::control::ProcessController;
use crate::ipc::messages::PipeMessage;
use crate::ipc::server::PipeServer;
use crate::monitor::{self, MonitorEvent};
use crate::policy::{store::default_policy_path, PolicyEngine, PolicyStore};

pub struct DaemonOptions {
    pub policy_path: Option<PathBuf>,
    pub socket_path: Option<PathBuf>,
}

/// Answers requests arriving over the control socket
pub struct DaemonHandler {
    store: Arc<PolicyStore>,
    events: broadcast::Sender<MonitorEvent>,
}

impl DaemonHandler {
    pub fn new(store: Arc<PolicyStore>, events: broadcast::Sender<MonitorEvent>) -> Self {
        Self { store, events }
    }

    pub async fn handle(&self, message: PipeMessage) -> PipeMessage {
        match message {
            PipeMessage::ProcessReport { process, .. } => {
                info!(
                    "process reported: {} (PID {})",
                    process.process_name, process.process_id
                );
                let snapshot = self.store.snapshot();
                if !snapshot.enable_monitoring {
                    return PipeMessage::success("Process allowed");
                }

                let engine = PolicyEngine::from_config(snapshot);
                match engine.violation(&process, true, Local::now()) {
                    Some(reason) => {
                        warn!(
                            "process {} (PID {}) violates policy '{}', requesting closure",
                            process.process_name, process.process_id, reason
                        );
                        let command =
                            PipeMessage::close_process(process.process_id, CLOSE_COMMAND_REASON);
                        let _ = self.events.send(MonitorEvent::CloseCommandIssued {
                            process,
                            reason,
                        });
                        command
                    }
                    None => PipeMessage::success("Process allowed"),
                }
            }
            PipeMessage::GetPolicy { .. } => {
                PipeMessage::policy_response((*self.store.snapshot()).clone())
            }
            other => {
                warn!("unsupported message type: {}", other.message_type());
                PipeMessage::failure(format!(
                    "Unsupported message type: {}",
                    other.message_type()
                ))
            }
        }
    }
}

/// Run the daemon until a shutdown signal arrives
pub async fn run(options: DaemonOptions) -> Result<()> {
    let policy_path = options.policy_path.unwrap_or_else(default_policy_path);
    let socket_path = options
        .socket_path
        .unwrap_or_else(crate::ipc::resolve_socket_path);

    let store = Arc::new(PolicyStore::new(policy_path));
    store.load();

    let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
    let shutdown = CancellationToken::new();
    let controller = ProcessController;

    // Bind before spawning so startup failures surface immediately
    let server = PipeServer::bind(socket_path)?;

    let log_task = tokio::spawn(run_activity_log(
        events.subscribe(),
        store.clone(),
        shutdown.clone(),
    ));

    let handler = Arc::new(DaemonHandler::new(store.clone(), events.clone()));
    let server_task = {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            server
                .run(
                    move |message| {
                        let handler = handler.clone();
                        async move { handler.handle(message).await }
                    },
                    shutdown,
                )
                .await;
        })
    };

    let monitor_task = tokio::spawn(monitor::run_enforcement_loop(
        store,
        controller,
        events,
        shutdown.clone(),
    ));

    shutdown_signal().await;
    info!("shutdown signal received");
    shutdown.cancel();

    let _ = tokio::join!(monitor_task, server_task, log_task);
    Ok(())
}

/// Logs monitor events when activity logging is enabled in policy
async fn run_activity_log(
    mut events: broadcast::Receiver<MonitorEvent>,
    store: Arc<PolicyStore>,
    shutdown: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            event = events.recv() => match event {
                Ok(event) => {
                    if store.snapshot().log_activity {
                        log_event(&event);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    warn!("activity log lagged, {missed} event(s) dropped");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    }
}

fn log_event(event: &MonitorEvent) {
    match event {
        MonitorEvent::ProcessBlocked {
            process,
            reason,
            terminated,
        } => {
            if *terminated {
                info!(
                    "blocked {} (PID {}) per '{}'",
                    process.process_name, process.process_id, reason
                );
            } else {
                warn!(
                    "blocked {} (PID {}) per '{}' but termination did not complete",
                    process.process_name, process.process_id, reason
                );
            }
        }
        MonitorEvent::CloseCommandIssued { process, reason } => info!(
            "close command sent for {} (PID {}) per '{}'",
            process.process_name, process.process_id, reason
        ),
        MonitorEvent::PolicyReloaded { rules, policies } => {
            info!("policy reloaded: {rules} rule(s), {policies} legacy policies");
        }
    }
}

async fn shutdown_signal() {
    let sigterm = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                error!("failed to install SIGTERM handler: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(err) = result {
                error!("failed to wait for ctrl-c, shutting down: {err}");
            }
        }
        _ = sigterm => {}
    }
}
