//! Global constants for procwarden
//!
//! Centralized location for application-wide constants

use std::time::Duration;

/// Environment variable overriding the control socket path
pub const SOCKET_ENV_VAR: &str = "PROCWARDEN_SOCKET";

/// Socket file name under the runtime directory
pub const SOCKET_FILE_NAME: &str = "procwarden.sock";

/// Directory name used under XDG_RUNTIME_DIR and the data dir
pub const APP_DIR_NAME: &str = "procwarden";

/// Policy document file name
pub const POLICY_FILE_NAME: &str = "policy.json";

/// Connect timeout for the availability probe (connect-only, no payload)
pub const PROBE_CONNECT_TIMEOUT: Duration = Duration::from_secs(1);

/// Connect timeout for real request/response calls
pub const SEND_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Delay before the accept loop retries after a failed accept
pub const ACCEPT_RETRY_DELAY: Duration = Duration::from_secs(1);

/// How long a process gets to exit after a graceful close request
pub const GRACEFUL_EXIT_TIMEOUT: Duration = Duration::from_secs(5);

/// How long each forced termination waits for exit confirmation
pub const KILL_EXIT_TIMEOUT: Duration = Duration::from_secs(5);

/// Poll interval while waiting for a process to exit
pub const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Fixed reporting interval for the foreground reporter
pub const REPORT_INTERVAL: Duration = Duration::from_secs(2);

/// Capacity of the monitor event channel
pub const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Reason attached to close commands sent over the pipe
pub const CLOSE_COMMAND_REASON: &str = "Application blocked by parental control policy";

/// Reason recorded when a legacy policy (not a named rule) triggers closure
pub const LEGACY_POLICY_REASON: &str = "Legacy policy";
