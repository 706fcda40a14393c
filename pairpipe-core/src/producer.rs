//! Producer role

use crate::{UNITS_PER_PRODUCER, WorkerError};
use pairpipe_ipc::{Unit, UnitWriter};
use std::io::Write;

/// What a producer sent before releasing its endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProducerReport {
    /// Values in write order
    pub sent: Vec<Unit>,
}

/// Write `start ..= start+4` as five separate units, then release the channel.
///
/// The writer is consumed, so the write end is closed on every return path.
/// The first failed write ends the run; nothing after it is attempted.
pub fn produce<W: Write, O: Write>(
    mut writer: UnitWriter<W>,
    start: Unit,
    status: &mut O,
) -> Result<ProducerReport, WorkerError> {
    if start.checked_add(UNITS_PER_PRODUCER - 1).is_none() {
        return Err(WorkerError::StartOutOfRange { start });
    }

    let mut sent = Vec::with_capacity(UNITS_PER_PRODUCER as usize);
    for offset in 0..UNITS_PER_PRODUCER {
        let value = start + offset;
        writer.write(value)?;
        sent.push(value);
        tracing::trace!(value, "unit written");
        writeln!(status, "Producer: Sent number {}", value).map_err(WorkerError::Output)?;
    }

    writeln!(
        status,
        "Producer: Finished sending {} numbers",
        UNITS_PER_PRODUCER
    )
    .map_err(WorkerError::Output)?;

    drop(writer);
    Ok(ProducerReport { sent })
}
