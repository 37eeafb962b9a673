// Signal delivery for process termination

use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;

/// Result of signalling a single process
#[derive(Debug, PartialEq, Eq)]
pub enum KillResult {
    /// Signal was delivered
    Success,
    /// Permission denied (typically need root)
    PermissionDenied,
    /// Process exited before the signal arrived
    NotFound,
    /// Other error occurred
    Error(String),
}

impl KillResult {
    /// Get a human-readable description
    pub fn description(&self) -> &str {
        match self {
            KillResult::Success => "signal delivered",
            KillResult::PermissionDenied => "permission denied",
            KillResult::NotFound => "not found",
            KillResult::Error(msg) => msg,
        }
    }
}

/// Send SIGKILL to a process
pub fn sigkill(pid: i32) -> KillResult {
    match signal::kill(Pid::from_raw(pid), Signal::SIGKILL) {
        Ok(()) => KillResult::Success,
        Err(nix::errno::Errno::ESRCH) => KillResult::NotFound,
        Err(nix::errno::Errno::EPERM) => KillResult::PermissionDenied,
        Err(e) => KillResult::Error(format!("signal error: {e}")),
    }
}

/// Command name of a process, for logging
pub fn process_name(pid: i32) -> String {
    procfs::process::Process::new(pid)
        .and_then(|p| p.stat())
        .map_or_else(|_| "?".to_string(), |stat| stat.comm)
}
