#![forbid(unsafe_code)]

use anyhow::Result;
use tokio_util::sync::CancellationToken;
use tracing::info;

use procwarden::cli::{self, Mode};
use procwarden::control::ProcessController;
use procwarden::daemon::{self, DaemonOptions};
use procwarden::ipc::client::PipeClient;
use procwarden::ipc::messages::PipeMessage;
use procwarden::ipc::{resolve_socket_path, TransportError};
use procwarden::reporter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "procwarden=info".into()),
        )
        .compact()
        .init();

    match cli::parse_args() {
        Mode::Daemon { policy, socket } => {
            daemon::run(DaemonOptions {
                policy_path: policy,
                socket_path: socket,
            })
            .await
        }
        Mode::Agent { socket } => {
            let client = PipeClient::new(socket.unwrap_or_else(resolve_socket_path));
            let shutdown = CancellationToken::new();

            let signal_shutdown = shutdown.clone();
            tokio::spawn(async move {
                let _ = tokio::signal::ctrl_c().await;
                info!("shutdown signal received");
                signal_shutdown.cancel();
            });

            reporter::run_reporter_loop(client, ProcessController, shutdown).await;
            Ok(())
        }
        Mode::Status { socket } => {
            let client = PipeClient::new(socket.unwrap_or_else(resolve_socket_path));
            if client.is_service_available().await {
                println!("daemon is reachable at {}", client.socket_path().display());
                Ok(())
            } else {
                println!("daemon is not reachable at {}", client.socket_path().display());
                std::process::exit(1);
            }
        }
        Mode::Policy { socket } => {
            let client = PipeClient::new(socket.unwrap_or_else(resolve_socket_path));
            match client.send(&PipeMessage::get_policy()).await {
                Ok(PipeMessage::PolicyResponse { configuration, .. }) => {
                    println!("{}", serde_json::to_string_pretty(&configuration)?);
                    Ok(())
                }
                Ok(other) => {
                    eprintln!("unexpected reply: {}", other.message_type());
                    std::process::exit(1);
                }
                Err(TransportError::Unavailable) => {
                    eprintln!("daemon is not reachable at {}", client.socket_path().display());
                    std::process::exit(1);
                }
                Err(err) => Err(err.into()),
            }
        }
    }
}
