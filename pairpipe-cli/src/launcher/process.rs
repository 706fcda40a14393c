//! Process-per-worker launcher
//!
//! Re-executes a pairpipe binary with the hidden `--pair-worker` flag. The
//! endpoint's descriptor stays close-on-exec in this process and is made
//! inheritable only inside the forked child, right before exec, so no other
//! child ever picks it up.

use super::{Launcher, Worker, WorkerExit, WorkerKind};
use pairpipe_core::{Pair, Role};
use pairpipe_ipc::{Endpoint, IPC_FD_ENV};
use std::env;
use std::io;
use std::os::fd::AsRawFd;
use std::os::unix::process::CommandExt;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};

/// Starts each worker as a child process
#[derive(Debug, Clone)]
pub struct ProcessLauncher {
    binary: PathBuf,
    log_filter: Option<String>,
}

impl ProcessLauncher {
    /// Launch workers from the currently running executable
    pub fn current_exe() -> io::Result<Self> {
        Ok(Self::with_binary(env::current_exe()?))
    }

    /// Launch workers from a specific pairpipe binary (for testing)
    pub fn with_binary(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            log_filter: None,
        }
    }

    /// Log filter handed to workers when `RUST_LOG` is not already set
    pub fn log_filter(mut self, filter: impl Into<String>) -> Self {
        self.log_filter = Some(filter.into());
        self
    }

    /// Binary workers are started from
    pub fn binary(&self) -> &Path {
        &self.binary
    }

    fn command(&self, role: Role, pair: Pair, fd: i32) -> Command {
        let mut command = Command::new(&self.binary);
        command
            .arg("--pair-worker")
            .arg(role.as_str())
            .arg("--start")
            .arg(pair.start().to_string())
            .arg("--pair")
            .arg(pair.label().to_string())
            .env(IPC_FD_ENV, fd.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());

        if let Some(filter) = &self.log_filter {
            if env::var_os("RUST_LOG").is_none() {
                command.env("RUST_LOG", filter);
            }
        }
        command
    }
}

impl Launcher for ProcessLauncher {
    type Worker = ProcessWorker;

    fn spawn(&mut self, role: Role, endpoint: Endpoint, pair: Pair) -> io::Result<ProcessWorker> {
        let fd = endpoint.as_raw_fd();
        let mut command = self.command(role, pair, fd);

        // In the child: clear close-on-exec on the endpoint so it survives exec.
        // Only async-signal-safe calls are allowed here.
        unsafe {
            command.pre_exec(move || {
                let flags = libc::fcntl(fd, libc::F_GETFD);
                if flags == -1 || libc::fcntl(fd, libc::F_SETFD, flags & !libc::FD_CLOEXEC) == -1 {
                    return Err(io::Error::last_os_error());
                }
                Ok(())
            });
        }

        let spawned = command.spawn();

        // The child has its own copy now (or never will); release ours.
        drop(endpoint);
        tracing::debug!(%pair, %role, fd, "released orchestrator copy of endpoint");

        let child = spawned?;
        tracing::debug!(%pair, %role, pid = child.id(), "worker process spawned");
        Ok(ProcessWorker { child })
    }
}

/// Handle to a worker process
#[derive(Debug)]
pub struct ProcessWorker {
    child: Child,
}

impl Worker for ProcessWorker {
    fn id(&self) -> u32 {
        self.child.id()
    }

    fn kind(&self) -> WorkerKind {
        WorkerKind::Process
    }

    fn wait(mut self) -> io::Result<WorkerExit> {
        self.child.wait().map(WorkerExit::from)
    }
}
