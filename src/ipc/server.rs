//! Server side of the control socket
//!
//! Binds the well-known socket, accepts connections in a loop, and hands
//! each connection to its own task so a slow peer never stalls the daemon.
//! Each handler task reads one message per line, dispatches it, and writes
//! exactly one response line until the peer disconnects.

use std::future::Future;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::constants::ACCEPT_RETRY_DELAY;
use crate::ipc::messages::PipeMessage;

pub struct PipeServer {
    socket_path: PathBuf,
    listener: UnixListener,
}

impl PipeServer {
    /// Bind the control socket, replacing any stale socket file
    pub fn bind(socket_path: PathBuf) -> Result<Self> {
        if socket_path.exists() {
            std::fs::remove_file(&socket_path).with_context(|| {
                format!("failed to remove stale socket {}", socket_path.display())
            })?;
        }
        if let Some(parent) = socket_path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create socket directory {}", parent.display())
            })?;
        }

        let listener = UnixListener::bind(&socket_path)
            .with_context(|| format!("failed to bind socket {}", socket_path.display()))?;

        Ok(Self {
            socket_path,
            listener,
        })
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Accept connections until shutdown. The accept loop stops taking new
    /// connections immediately on shutdown; live handlers finish their
    /// current message before exiting.
    pub async fn run<H, Fut>(self, handler: H, shutdown: CancellationToken)
    where
        H: Fn(PipeMessage) -> Fut + Clone + Send + Sync + 'static,
        Fut: Future<Output = PipeMessage> + Send + 'static,
    {
        info!("pipe server listening on {}", self.socket_path.display());

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, _)) => {
                        debug!("client connected");
                        let handler = handler.clone();
                        let shutdown = shutdown.clone();
                        tokio::spawn(async move {
                            if let Err(err) = handle_connection(stream, handler, shutdown).await {
                                warn!("connection handler ended with error: {err}");
                            }
                        });
                    }
                    Err(err) => {
                        error!("failed to accept connection: {err}");
                        tokio::time::sleep(ACCEPT_RETRY_DELAY).await;
                    }
                }
            }
        }

        info!("pipe server stopped");
        let _ = std::fs::remove_file(&self.socket_path);
    }
}

async fn handle_connection<H, Fut>(
    stream: UnixStream,
    handler: H,
    shutdown: CancellationToken,
) -> std::io::Result<()>
where
    H: Fn(PipeMessage) -> Fut,
    Fut: Future<Output = PipeMessage>,
{
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let mut line = String::new();

    loop {
        line.clear();
        // Shutdown is only observed between messages; a message already
        // being processed is always answered before the task exits.
        let bytes = tokio::select! {
            _ = shutdown.cancelled() => return Ok(()),
            read = reader.read_line(&mut line) => read?,
        };
        if bytes == 0 {
            debug!("client disconnected");
            return Ok(());
        }
        let raw = line.trim();
        if raw.is_empty() {
            continue;
        }

        let response = match serde_json::from_str::<PipeMessage>(raw) {
            Ok(message) => {
                debug!("received {}", message.message_type());
                handler(message).await
            }
            Err(err) => {
                warn!("rejecting malformed message: {err}");
                PipeMessage::failure(format!("Invalid message: {err}"))
            }
        };

        let mut payload = serde_json::to_string(&response)
            .unwrap_or_else(|err| format!("{{\"MessageType\":\"Response\",\"Success\":false,\"Message\":\"encoding error: {err}\"}}"));
        payload.push('\n');
        writer.write_all(payload.as_bytes()).await?;
        writer.flush().await?;
    }
}
