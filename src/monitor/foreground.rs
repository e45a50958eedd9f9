//! Foreground window detection
//!
//! Shells out to `xdotool` so no display-server bindings are linked in;
//! any failure (no X session, no active window, tool missing) yields
//! `None` and the caller simply skips foreground handling this tick.

use std::process::Command;

use sysinfo::{Pid, PidExt, ProcessExt, System, SystemExt};
use tracing::debug;

use crate::models::ProcessInfo;

#[derive(Debug, Clone, Copy, Default)]
pub struct ForegroundDetector;

impl ForegroundDetector {
    /// Snapshot of the process owning the currently focused window
    pub fn foreground_process(&self, system: &System) -> Option<ProcessInfo> {
        let output = Command::new("xdotool")
            .args(["getactivewindow", "getwindowpid", "getwindowname"])
            .output()
            .ok()?;
        if !output.status.success() {
            debug!("xdotool reported no active window");
            return None;
        }

        let (pid, title) = parse_active_window(&String::from_utf8_lossy(&output.stdout))?;
        let process = system.process(Pid::from_u32(pid as u32))?;

        Some(ProcessInfo::detected(
            pid,
            process.name(),
            title,
            process.exe().display().to_string(),
        ))
    }
}

/// Parse `xdotool getactivewindow getwindowpid getwindowname` output:
/// the window PID on the first line, the title on the second.
pub(crate) fn parse_active_window(output: &str) -> Option<(i32, String)> {
    let mut lines = output.lines();
    let pid = lines.next()?.trim().parse::<i32>().ok()?;
    if pid <= 0 {
        return None;
    }
    let title = lines.next().unwrap_or("").trim().to_string();
    Some((pid, title))
}
