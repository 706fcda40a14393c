#![warn(missing_docs)]
//! pairpipe Core - Worker Runtime
//!
//! This crate provides the two worker roles and their process entry point:
//! - [`produce`] writes a pair's fixed run of units into a channel
//! - [`consume`] sums units until the channel reports end-of-stream
//! - [`WorkerMain`] runs either role inside a re-executed worker process

mod consumer;
mod producer;
mod worker;

pub use consumer::{ConsumerReport, consume};
pub use producer::{ProducerReport, produce};
pub use worker::{RoleReport, WorkerMain, run_role};

use pairpipe_ipc::{ChannelError, Unit};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Number of units every producer writes.
pub const UNITS_PER_PRODUCER: Unit = 5;

/// Largest pair count whose value ranges still fit in a [`Unit`].
pub const MAX_PAIRS: u32 = ((Unit::MAX - UNITS_PER_PRODUCER) / UNITS_PER_PRODUCER) as u32;

/// Errors a worker can hit. None of them is retried.
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("channel error: {0}")]
    Channel(#[from] ChannelError),

    #[error("status output failed: {0}")]
    Output(std::io::Error),

    #[error("{role} cannot run on the {got} end of a channel")]
    EndpointMismatch { role: Role, got: &'static str },

    #[error("no usable channel descriptor: {0}")]
    Transport(String),

    #[error("producer start {start} leaves no room for 5 values")]
    StartOutOfRange { start: Unit },
}

/// Which side of a pair a worker plays
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// Writes units into the channel
    Producer,
    /// Reads units out of the channel
    Consumer,
}

impl Role {
    /// Lowercase name, as used on the worker command line
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Producer => "producer",
            Role::Consumer => "consumer",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a role name is not recognised.
#[derive(Debug, Error)]
#[error("unknown role '{0}' (expected 'producer' or 'consumer')")]
pub struct ParseRoleError(String);

impl FromStr for Role {
    type Err = ParseRoleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "producer" => Ok(Role::Producer),
            "consumer" => Ok(Role::Consumer),
            _ => Err(ParseRoleError(s.to_string())),
        }
    }
}

/// A producer/consumer pair, identified by its 0-based ordinal.
///
/// Pair `i` produces the values `i*5+1 ..= i*5+5`, so ranges never overlap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Pair {
    index: u32,
}

impl Pair {
    /// Create a pair, or `None` if its values would not fit in a [`Unit`]
    /// (`index` must be below [`MAX_PAIRS`]).
    pub fn new(index: u32) -> Option<Self> {
        (index < MAX_PAIRS).then_some(Self { index })
    }

    /// The first `count` pairs, or `None` if `count` exceeds [`MAX_PAIRS`].
    pub fn first(count: u32) -> Option<impl Iterator<Item = Pair>> {
        (count <= MAX_PAIRS).then(|| (0..count).map(|index| Pair { index }))
    }

    /// 0-based ordinal
    pub fn index(self) -> u32 {
        self.index
    }

    /// 1-based ordinal, as shown in status lines
    pub fn label(self) -> u32 {
        self.index + 1
    }

    /// First value the producer writes
    pub fn start(self) -> Unit {
        self.index as Unit * UNITS_PER_PRODUCER + 1
    }

    /// Sum the consumer must report: `5*start + 10`
    pub fn expected_sum(self) -> i64 {
        let start = self.start() as i64;
        (0..UNITS_PER_PRODUCER as i64).map(|k| start + k).sum()
    }
}

impl fmt::Display for Pair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pair {}", self.label())
    }
}
