#![warn(missing_docs)]
//! # pairpipe
//!
//! Producer/consumer pairs talking over anonymous pipes.
//!
//! Each pair gets its own pipe. The producer writes five consecutive `i32`
//! values starting at the pair's start value and closes its end; the consumer
//! sums whatever arrives until end-of-stream. The orchestrator starts every
//! worker, drops its own copies of the endpoints, then reaps them all:
//! - **Process Isolation**: by default every worker is a re-executed copy of
//!   the binary that inherits exactly one pipe descriptor
//! - **Ownership-Driven EOF**: endpoints close on drop, so end-of-stream
//!   follows from the last write end going away
//! - **Thread Mode**: the same roles on OS threads, for embedding and tests
//!
//! ## Quick Start
//!
//! ```ignore
//! use pairpipe::{Orchestrator, ProcessLauncher, WaitPolicy};
//!
//! let launcher = ProcessLauncher::current_exe()?;
//! let summary = Orchestrator::new(launcher, WaitPolicy::Report).run_multiple_pairs(3)?;
//! assert_eq!(summary.waited, 6);
//! ```

// Re-export channel types
pub use pairpipe_ipc::{
    ChannelError, Endpoint, IPC_FD_ENV, ReadEnd, Unit, UnitReader, UnitWriter, WriteEnd,
    create_channel,
};

// Re-export worker runtime
pub use pairpipe_core::{
    ConsumerReport, MAX_PAIRS, Pair, ProducerReport, Role, RoleReport, UNITS_PER_PRODUCER,
    WorkerError, consume, produce, run_role,
};

// Re-export orchestration
pub use pairpipe_cli::{
    IsolationMode, Launcher, Orchestrator, OrchestratorError, PairpipeConfig, ProcessLauncher,
    RunSummary, ThreadLauncher, WaitPolicy, Worker, WorkerExit, WorkerKind, WorkerOutcome,
};

/// Run the pairpipe command line.
///
/// Call this from a binary's `main()`; the same binary also serves as the
/// worker process:
/// ```ignore
/// fn main() {
///     pairpipe::run().unwrap();
/// }
/// ```
pub use pairpipe_cli::run;
