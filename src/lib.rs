//! procwarden - parental-control process enforcement
//!
//! Two cooperating endpoints on one machine: a privileged daemon that owns
//! the policy document, monitors running processes, and terminates
//! violators; and an unprivileged agent that reports the foreground window
//! over a local socket and executes close commands.

pub mod cli;
pub mod constants;
pub mod control;
pub mod daemon;
pub mod ipc;
pub mod models;
pub mod monitor;
pub mod policy;
pub mod reporter;
