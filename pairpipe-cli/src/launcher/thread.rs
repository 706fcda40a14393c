//! Thread-per-worker launcher
//!
//! Runs the same role logic over the same kind of pipe, but on an OS thread.
//! The endpoint is moved into the thread, so the orchestrator still holds no
//! copy once `spawn` returns. Exit codes mirror what a worker process would
//! report: 0 on success, 1 on a worker error, 101 on panic.

use super::{Launcher, Worker, WorkerExit, WorkerKind};
use pairpipe_core::{Pair, Role, RoleReport, WorkerError, run_role};
use pairpipe_ipc::Endpoint;
use std::io;
use std::thread::{self, JoinHandle};

/// Exit code reported for a worker thread that panicked
pub const PANIC_EXIT_CODE: i32 = 101;

/// Starts each worker as a thread
#[derive(Debug, Default)]
pub struct ThreadLauncher {
    next_id: u32,
    quiet: bool,
}

impl ThreadLauncher {
    /// Create a launcher whose workers print status lines to stdout
    pub fn new() -> Self {
        Self::default()
    }

    /// Suppress worker status lines
    pub fn quiet(mut self) -> Self {
        self.quiet = true;
        self
    }
}

impl Launcher for ThreadLauncher {
    type Worker = ThreadWorker;

    fn spawn(&mut self, role: Role, endpoint: Endpoint, pair: Pair) -> io::Result<ThreadWorker> {
        self.next_id += 1;
        let id = self.next_id;
        let quiet = self.quiet;

        // On spawn failure the closure, and the endpoint with it, is dropped.
        let handle = thread::Builder::new()
            .name(format!("pairpipe-{}-{}", role, pair.label()))
            .spawn(move || {
                if quiet {
                    run_role(role, endpoint, pair.start(), &mut io::sink())
                } else {
                    run_role(role, endpoint, pair.start(), &mut io::stdout())
                }
            })?;

        tracing::debug!(%pair, %role, id, "worker thread spawned");
        Ok(ThreadWorker {
            id,
            role,
            pair,
            handle,
        })
    }
}

/// Handle to a worker thread
#[derive(Debug)]
pub struct ThreadWorker {
    id: u32,
    role: Role,
    pair: Pair,
    handle: JoinHandle<Result<RoleReport, WorkerError>>,
}

impl Worker for ThreadWorker {
    fn id(&self) -> u32 {
        self.id
    }

    fn kind(&self) -> WorkerKind {
        WorkerKind::Thread
    }

    fn wait(self) -> io::Result<WorkerExit> {
        match self.handle.join() {
            Ok(Ok(_)) => Ok(WorkerExit::Exited(0)),
            Ok(Err(e)) => {
                eprintln!("{} ({}) failed: {}", self.role, self.pair, e);
                tracing::error!(pair = %self.pair, role = %self.role, error = %e, "worker failed");
                Ok(WorkerExit::Exited(1))
            }
            Err(_) => {
                tracing::error!(pair = %self.pair, role = %self.role, "worker panicked");
                Ok(WorkerExit::Exited(PANIC_EXIT_CODE))
            }
        }
    }
}
