//! CLI argument parsing and validation module
//!
//! One binary exposes both endpoints and the maintenance commands:
//! - `daemon`: run the privileged enforcement daemon
//! - `agent`: run the unprivileged foreground reporter
//! - `status`: probe whether the daemon is reachable
//! - `policy`: fetch and print the daemon's current policy snapshot

use std::path::PathBuf;

use clap::{Arg, ArgMatches, Command};

/// Selected operating mode with its options
pub enum Mode {
    Daemon {
        policy: Option<PathBuf>,
        socket: Option<PathBuf>,
    },
    Agent {
        socket: Option<PathBuf>,
    },
    Status {
        socket: Option<PathBuf>,
    },
    Policy {
        socket: Option<PathBuf>,
    },
}

/// Parse command line arguments and return the selected mode
pub fn parse_args() -> Mode {
    let matches = build_command().get_matches();

    match matches.subcommand() {
        Some(("daemon", sub)) => Mode::Daemon {
            policy: path_arg(sub, "policy"),
            socket: path_arg(sub, "socket"),
        },
        Some(("agent", sub)) => Mode::Agent {
            socket: path_arg(sub, "socket"),
        },
        Some(("status", sub)) => Mode::Status {
            socket: path_arg(sub, "socket"),
        },
        Some(("policy", sub)) => Mode::Policy {
            socket: path_arg(sub, "socket"),
        },
        // subcommand_required makes this unreachable
        _ => unreachable!("a subcommand is required"),
    }
}

fn build_command() -> Command {
    let socket_arg = Arg::new("socket")
        .long("socket")
        .value_name("PATH")
        .help("Control socket path (defaults to the runtime directory)");

    Command::new("procwarden")
        .version(env!("PROCWARDEN_VERSION"))
        .about("Parental-control process enforcement")
        .long_about(
            "Watches running processes on this machine and closes the ones that \
             violate the configured policy. The daemon enforces policy and owns \
             the policy document; the agent reports the foreground window and \
             executes close commands on the daemon's behalf.",
        )
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            Command::new("daemon")
                .about("Run the enforcement daemon")
                .arg(
                    Arg::new("policy")
                        .long("policy")
                        .value_name("PATH")
                        .help("Policy document path (defaults to the data directory)"),
                )
                .arg(socket_arg.clone()),
        )
        .subcommand(
            Command::new("agent")
                .about("Run the foreground window reporter")
                .arg(socket_arg.clone()),
        )
        .subcommand(
            Command::new("status")
                .about("Check whether the daemon is reachable")
                .arg(socket_arg.clone()),
        )
        .subcommand(
            Command::new("policy")
                .about("Fetch and print the daemon's current policy")
                .arg(socket_arg),
        )
}

fn path_arg(matches: &ArgMatches, name: &str) -> Option<PathBuf> {
    matches.get_one::<String>(name).map(PathBuf::from)
}
