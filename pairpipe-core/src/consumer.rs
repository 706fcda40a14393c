//! Consumer role

use crate::WorkerError;
use pairpipe_ipc::{Unit, UnitReader};
use std::io::{Read, Write};

/// What a consumer read before the channel closed
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConsumerReport {
    /// Values in read order
    pub values: Vec<Unit>,
    /// Running sum at end-of-stream
    pub sum: i64,
}

/// Read units until the writer releases the channel, keeping a running sum.
///
/// Blocks on every read. A clean end-of-stream, including one before any
/// data, reports the sum; a read error or a truncated unit ends the run
/// without one.
pub fn consume<R: Read, O: Write>(
    mut reader: UnitReader<R>,
    status: &mut O,
) -> Result<ConsumerReport, WorkerError> {
    let mut report = ConsumerReport::default();

    while let Some(value) = reader.read()? {
        report.sum += i64::from(value);
        report.values.push(value);
        writeln!(
            status,
            "Consumer: Received {}, running sum: {}",
            value, report.sum
        )
        .map_err(WorkerError::Output)?;
    }

    writeln!(status, "Consumer: Final sum: {}", report.sum).map_err(WorkerError::Output)?;
    Ok(report)
}
