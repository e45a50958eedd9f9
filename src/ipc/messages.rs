//! Typed message envelopes carried over the control socket
//!
//! A closed tagged union: the `MessageType` discriminator selects the
//! variant, and every message carries a UTC timestamp. Unknown tags fail to
//! parse and are answered with a failure response by the server.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{PolicyConfiguration, ProcessInfo};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "MessageType", rename_all_fields = "PascalCase")]
pub enum PipeMessage {
    /// Reporter -> daemon: a detected foreground process
    ProcessReport {
        timestamp: DateTime<Utc>,
        process: ProcessInfo,
    },
    /// Daemon -> reporter: close the given process
    CloseProcess {
        timestamp: DateTime<Utc>,
        process_id: i32,
        reason: String,
    },
    /// Generic success/failure acknowledgement
    Response {
        timestamp: DateTime<Utc>,
        success: bool,
        message: String,
    },
    /// Request for the daemon's current policy snapshot
    GetPolicy { timestamp: DateTime<Utc> },
    /// Reply carrying the full policy configuration
    PolicyResponse {
        timestamp: DateTime<Utc>,
        configuration: PolicyConfiguration,
    },
}

impl PipeMessage {
    pub fn process_report(process: ProcessInfo) -> Self {
        PipeMessage::ProcessReport {
            timestamp: Utc::now(),
            process,
        }
    }

    pub fn close_process(process_id: i32, reason: impl Into<String>) -> Self {
        PipeMessage::CloseProcess {
            timestamp: Utc::now(),
            process_id,
            reason: reason.into(),
        }
    }

    pub fn success(message: impl Into<String>) -> Self {
        PipeMessage::Response {
            timestamp: Utc::now(),
            success: true,
            message: message.into(),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        PipeMessage::Response {
            timestamp: Utc::now(),
            success: false,
            message: message.into(),
        }
    }

    pub fn get_policy() -> Self {
        PipeMessage::GetPolicy {
            timestamp: Utc::now(),
        }
    }

    pub fn policy_response(configuration: PolicyConfiguration) -> Self {
        PipeMessage::PolicyResponse {
            timestamp: Utc::now(),
            configuration,
        }
    }

    /// Discriminator tag, for logging
    pub fn message_type(&self) -> &'static str {
        match self {
            PipeMessage::ProcessReport { .. } => "ProcessReport",
            PipeMessage::CloseProcess { .. } => "CloseProcess",
            PipeMessage::Response { .. } => "Response",
            PipeMessage::GetPolicy { .. } => "GetPolicy",
            PipeMessage::PolicyResponse { .. } => "PolicyResponse",
        }
    }
}
