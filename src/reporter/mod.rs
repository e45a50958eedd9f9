//! Unprivileged reporter endpoint
//!
//! Watches the foreground window on a fixed short interval, reports
//! changes to the daemon over the control socket, and executes any close
//! command the daemon answers with. An unreachable daemon degrades to a
//! status message; enforcement resumes when it comes back.

use sysinfo::{System, SystemExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::constants::REPORT_INTERVAL;
use crate::control::ProcessController;
use crate::ipc::client::PipeClient;
use crate::ipc::messages::PipeMessage;
use crate::ipc::TransportError;
use crate::monitor::foreground::ForegroundDetector;

pub async fn run_reporter_loop(
    client: PipeClient,
    controller: ProcessController,
    shutdown: CancellationToken,
) {
    let mut system = System::new_all();
    let detector = ForegroundDetector;

    if client.is_service_available().await {
        info!("enforcement service is reachable");
    } else {
        warn!("enforcement service is not reachable, reports will fail until it starts");
    }

    // Last reported (PID, window title); identical sightings are not re-sent
    let mut last_reported: Option<(i32, String)> = None;

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = tokio::time::sleep(REPORT_INTERVAL) => {}
        }

        system.refresh_processes();
        let Some(process) = detector.foreground_process(&system) else {
            continue;
        };

        let current = (process.process_id, process.window_title.clone());
        if last_reported.as_ref() == Some(&current) {
            continue;
        }
        last_reported = Some(current);
        debug!(
            "foreground changed: {} (PID {}) '{}'",
            process.process_name, process.process_id, process.window_title
        );

        match client.send(&PipeMessage::process_report(process)).await {
            Ok(PipeMessage::CloseProcess {
                process_id, reason, ..
            }) => {
                info!("close command received for PID {process_id}: {reason}");
                controller.close_gracefully(process_id).await;
            }
            Ok(PipeMessage::Response { success, message, .. }) => {
                if success {
                    debug!("report acknowledged: {message}");
                } else {
                    warn!("service rejected report: {message}");
                }
            }
            Ok(other) => {
                warn!("unexpected reply to process report: {}", other.message_type());
            }
            Err(TransportError::Unavailable) => {
                debug!("service unavailable, skipping enforcement this cycle");
            }
            Err(err) => {
                warn!("failed to report foreground process: {err}");
            }
        }
    }

    info!("reporter stopped");
}
