//! Worker Process Entry Point
//!
//! Handles the worker side of the orchestrator-worker architecture.
//!
//! The orchestrator lets the endpoint's own descriptor survive exec (only its
//! close-on-exec flag is cleared, in the child) and names its number in
//! `PAIRPIPE_IPC_FD`. Without that variable the worker falls back
//! to stdout (producer) or stdin (consumer), so two workers can also be
//! joined by a shell pipe; the producer's status lines then go to stderr.

use crate::{ConsumerReport, ProducerReport, Role, WorkerError, consume, produce};
use pairpipe_ipc::{Endpoint, IPC_FD_ENV, ReadEnd, Unit, UnitReader, UnitWriter, WriteEnd};
use std::io::{self, Write};
use std::os::fd::RawFd;

/// Result of running one role to completion
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoleReport {
    /// Producer finished writing
    Produced(ProducerReport),
    /// Consumer reached end-of-stream
    Consumed(ConsumerReport),
}

/// Run `role` over `endpoint`. The endpoint is released when this returns.
pub fn run_role<O: Write>(
    role: Role,
    endpoint: Endpoint,
    start: Unit,
    status: &mut O,
) -> Result<RoleReport, WorkerError> {
    match (role, endpoint) {
        (Role::Producer, Endpoint::Write(end)) => {
            produce(UnitWriter::from(end), start, status).map(RoleReport::Produced)
        }
        (Role::Consumer, Endpoint::Read(end)) => {
            consume(UnitReader::from(end), status).map(RoleReport::Consumed)
        }
        (role, endpoint) => Err(WorkerError::EndpointMismatch {
            role,
            got: endpoint.kind(),
        }),
    }
}

/// IPC transport: either an inherited descriptor or stdin/stdout fallback.
enum IpcTransport {
    Fd(RawFd),
    Stdio,
}

fn detect_transport() -> Result<IpcTransport, WorkerError> {
    match std::env::var(IPC_FD_ENV) {
        Ok(val) => match val.trim().parse::<RawFd>() {
            Ok(fd) if fd >= 0 => Ok(IpcTransport::Fd(fd)),
            _ => Err(WorkerError::Transport(format!(
                "invalid {}={:?} (expected a descriptor number)",
                IPC_FD_ENV, val
            ))),
        },
        Err(_) => Ok(IpcTransport::Stdio),
    }
}

fn ensure_open(fd: RawFd) -> Result<(), WorkerError> {
    let flags = unsafe { libc::fcntl(fd, libc::F_GETFD) };
    if flags == -1 {
        return Err(WorkerError::Transport(format!(
            "descriptor {} is not open: {}",
            fd,
            io::Error::last_os_error()
        )));
    }
    Ok(())
}

/// Worker process main
pub struct WorkerMain {
    role: Role,
    start: Unit,
    pair_label: u32,
}

impl WorkerMain {
    /// Create a worker for `role`. `start` is only used by producers.
    pub fn new(role: Role, start: Unit, pair_label: u32) -> Self {
        Self {
            role,
            start,
            pair_label,
        }
    }

    /// Run the role to completion over the inherited transport.
    pub fn run(&self) -> Result<RoleReport, WorkerError> {
        let pid = std::process::id();
        tracing::debug!(role = %self.role, pair = self.pair_label, pid, "worker starting");

        let report = match detect_transport()? {
            IpcTransport::Fd(fd) => {
                ensure_open(fd)?;
                // SAFETY: the descriptor was handed to this process for exclusive use
                // and was just checked to be open.
                let endpoint = match self.role {
                    Role::Producer => Endpoint::Write(unsafe { WriteEnd::from_raw_fd(fd) }),
                    Role::Consumer => Endpoint::Read(unsafe { ReadEnd::from_raw_fd(fd) }),
                };

                let stdout = io::stdout();
                let mut status = stdout.lock();
                writeln!(status, "\n{} (PID: {}) starting...", self.title(), pid)
                    .map_err(WorkerError::Output)?;
                run_role(self.role, endpoint, self.start, &mut status)?
            }
            IpcTransport::Stdio => match self.role {
                Role::Producer => {
                    let report = produce(
                        UnitWriter::new(io::stdout()),
                        self.start,
                        &mut io::stderr(),
                    )?;
                    RoleReport::Produced(report)
                }
                Role::Consumer => {
                    let report = consume(UnitReader::new(io::stdin()), &mut io::stdout())?;
                    RoleReport::Consumed(report)
                }
            },
        };

        if let RoleReport::Consumed(ref c) = report {
            tracing::debug!(pair = self.pair_label, sum = c.sum, "consumer reached end of stream");
        }
        Ok(report)
    }

    fn title(&self) -> &'static str {
        match self.role {
            Role::Producer => "Producer",
            Role::Consumer => "Consumer",
        }
    }
}
