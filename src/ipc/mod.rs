//! Inter-process communication between the daemon and the reporter
//!
//! Both endpoints share one Unix domain socket identity. Each logical
//! message is a single JSON document terminated by a newline; the reader
//! buffers partial reads until the newline marker so the application layer
//! always sees whole messages.

pub mod client;
pub mod messages;
pub mod server;

use std::path::PathBuf;

use crate::constants::{APP_DIR_NAME, SOCKET_ENV_VAR, SOCKET_FILE_NAME};

/// Default control socket location for this machine
pub fn default_socket_path() -> PathBuf {
    if let Ok(runtime) = std::env::var("XDG_RUNTIME_DIR") {
        return PathBuf::from(runtime).join(APP_DIR_NAME).join(SOCKET_FILE_NAME);
    }
    PathBuf::from("/tmp").join(SOCKET_FILE_NAME)
}

/// Socket path, honoring the environment override
pub fn resolve_socket_path() -> PathBuf {
    if let Ok(value) = std::env::var(SOCKET_ENV_VAR) {
        return PathBuf::from(value);
    }
    default_socket_path()
}

/// Error taxonomy for transport calls. `Unavailable` is the expected
/// outcome when the peer is not running; callers degrade instead of failing.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("service unavailable")]
    Unavailable,
    #[error("peer disconnected before responding")]
    Disconnected,
    #[error("message encoding failed: {0}")]
    Codec(#[from] serde_json::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
