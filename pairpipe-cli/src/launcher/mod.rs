//! Worker Launchers
//!
//! A [`Launcher`] creates channels and starts workers bound to one endpoint;
//! the [`Worker`] handle it returns is later resolved to a [`WorkerExit`].
//!
//! - [`ProcessLauncher`] - each worker is a separate OS process (default)
//! - [`ThreadLauncher`] - each worker is an OS thread in this process
//!
//! Either way, `spawn` takes the endpoint by value: once it returns, the
//! caller holds no copy of it, whether the spawn succeeded or not.

mod process;
mod thread;

pub use process::{ProcessLauncher, ProcessWorker};
pub use thread::{ThreadLauncher, ThreadWorker};

use pairpipe_core::{Pair, Role};
use pairpipe_ipc::{ChannelError, Endpoint, ReadEnd, WriteEnd, create_channel};
use std::fmt;
use std::io;

/// How a worker terminated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerExit {
    /// Normal exit with a status code
    Exited(i32),
    /// Killed by a signal
    Signaled(i32),
}

impl WorkerExit {
    /// Exit code 0
    pub fn success(self) -> bool {
        matches!(self, WorkerExit::Exited(0))
    }
}

impl From<std::process::ExitStatus> for WorkerExit {
    fn from(status: std::process::ExitStatus) -> Self {
        use std::os::unix::process::ExitStatusExt;

        match (status.code(), status.signal()) {
            (Some(code), _) => WorkerExit::Exited(code),
            (None, Some(signal)) => WorkerExit::Signaled(signal),
            // Stopped/continued states are never reported by wait()
            (None, None) => WorkerExit::Exited(-1),
        }
    }
}

impl fmt::Display for WorkerExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkerExit::Exited(code) => write!(f, "exited with status {}", code),
            WorkerExit::Signaled(signal) => write!(f, "ended abnormally (signal {})", signal),
        }
    }
}

/// What a worker's [`Worker::id`] refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerKind {
    /// A child process; the id is its PID
    Process,
    /// A thread of this process; the id is assigned by the launcher
    Thread,
}

/// A running worker. Waiting consumes the handle, so it can be waited once.
pub trait Worker {
    /// Process id (or launcher-assigned id for in-process workers)
    fn id(&self) -> u32;

    /// Whether [`Worker::id`] is a PID
    fn kind(&self) -> WorkerKind;

    /// Block until the worker terminates
    fn wait(self) -> io::Result<WorkerExit>;
}

/// Creates channels and starts workers
pub trait Launcher {
    /// Handle type for started workers
    type Worker: Worker;

    /// Create a fresh channel for one pair
    fn open_channel(&mut self) -> Result<(ReadEnd, WriteEnd), ChannelError> {
        create_channel()
    }

    /// Start `role` for `pair`, bound to `endpoint`.
    ///
    /// The endpoint is released before this returns, on success and on error.
    fn spawn(&mut self, role: Role, endpoint: Endpoint, pair: Pair) -> io::Result<Self::Worker>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::process::ExitStatusExt;
    use std::process::ExitStatus;

    #[test]
    fn test_exit_from_status() {
        // Raw wait statuses: code in the high byte, signal in the low bits
        assert_eq!(WorkerExit::from(ExitStatus::from_raw(0)), WorkerExit::Exited(0));
        assert_eq!(
            WorkerExit::from(ExitStatus::from_raw(1 << 8)),
            WorkerExit::Exited(1)
        );
        assert_eq!(
            WorkerExit::from(ExitStatus::from_raw(libc::SIGKILL)),
            WorkerExit::Signaled(libc::SIGKILL)
        );
    }

    #[test]
    fn test_exit_display() {
        assert!(WorkerExit::Exited(0).success());
        assert!(!WorkerExit::Exited(1).success());
        assert!(!WorkerExit::Signaled(9).success());
        assert_eq!(WorkerExit::Exited(0).to_string(), "exited with status 0");
        assert_eq!(
            WorkerExit::Signaled(9).to_string(),
            "ended abnormally (signal 9)"
        );
    }
}
