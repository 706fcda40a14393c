#![warn(missing_docs)]
//! pairpipe IPC
//!
//! The channel abstraction shared by the orchestrator and its workers:
//! an OS pipe split into two owned endpoints, plus the fixed-width unit
//! codec that travels over it. Unix only.

mod channel;
mod framing;

pub use channel::{Endpoint, ReadEnd, WriteEnd, create_channel};
pub use framing::{ChannelError, UnitReader, UnitWriter, read_unit, write_unit};

/// The only payload type carried over a channel.
pub type Unit = i32;

/// Size of one encoded unit in bytes.
pub const UNIT_SIZE: usize = std::mem::size_of::<Unit>();

/// Environment variable naming the inherited descriptor a worker talks over.
pub const IPC_FD_ENV: &str = "PAIRPIPE_IPC_FD";
