//! Client side of the control socket
//!
//! Each call opens a fresh connection, writes one message, reads one
//! response, and closes; the transport is not multiplexed. Connect attempts
//! are bounded so a missing daemon is reported as `Unavailable` quickly
//! instead of hanging the caller.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;
use tokio::time::timeout;

use crate::constants::{PROBE_CONNECT_TIMEOUT, SEND_CONNECT_TIMEOUT};
use crate::ipc::messages::PipeMessage;
use crate::ipc::TransportError;

pub struct PipeClient {
    socket_path: PathBuf,
}

impl PipeClient {
    pub fn new(socket_path: PathBuf) -> Self {
        Self { socket_path }
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Send one message and wait for the single response. Returns
    /// `TransportError::Unavailable` when the daemon cannot be reached.
    pub async fn send(&self, message: &PipeMessage) -> Result<PipeMessage, TransportError> {
        let stream = self.connect(SEND_CONNECT_TIMEOUT).await?;
        let (reader, mut writer) = stream.into_split();

        let mut payload = serde_json::to_string(message)?;
        payload.push('\n');
        writer.write_all(payload.as_bytes()).await?;
        writer.flush().await?;

        let mut reader = BufReader::new(reader);
        let mut line = String::new();
        let bytes = reader.read_line(&mut line).await?;
        if bytes == 0 {
            return Err(TransportError::Disconnected);
        }

        Ok(serde_json::from_str(line.trim())?)
    }

    /// Connect-only availability probe; never blocks past the probe timeout
    pub async fn is_service_available(&self) -> bool {
        matches!(
            timeout(PROBE_CONNECT_TIMEOUT, UnixStream::connect(&self.socket_path)).await,
            Ok(Ok(_))
        )
    }

    async fn connect(&self, connect_timeout: Duration) -> Result<UnixStream, TransportError> {
        match timeout(connect_timeout, UnixStream::connect(&self.socket_path)).await {
            Err(_) => Err(TransportError::Unavailable),
            Ok(Err(err)) if connection_unavailable(&err) => Err(TransportError::Unavailable),
            Ok(Err(err)) => Err(TransportError::Io(err)),
            Ok(Ok(stream)) => Ok(stream),
        }
    }
}

fn connection_unavailable(err: &std::io::Error) -> bool {
    matches!(
        err.kind(),
        ErrorKind::ConnectionRefused | ErrorKind::NotFound | ErrorKind::AddrNotAvailable
    )
}
