//! Fixed-Width Unit Encoding
//!
//! Every message on a channel is one [`Unit`]: four bytes, little-endian.
//! No length prefix or delimiter is needed, a unit boundary falls every
//! [`UNIT_SIZE`] bytes.

use crate::{UNIT_SIZE, Unit};
use std::io::{BufReader, BufWriter, ErrorKind, Read, Write};
use thiserror::Error;

/// Errors that can occur on a channel
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("pipe creation failed: {0}")]
    Create(std::io::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("stream ended inside a unit ({got} of 4 bytes)")]
    TruncatedUnit { got: usize },
}

/// Write one unit and flush it, so the reader can see it immediately.
///
/// Wire format:
/// ```text
/// +----------------+
/// | value (4 LE)   |
/// +----------------+
/// ```
pub fn write_unit<W: Write>(writer: &mut BufWriter<W>, value: Unit) -> Result<(), ChannelError> {
    writer.write_all(&value.to_le_bytes())?;
    writer.flush()?;
    Ok(())
}

/// Read one unit.
///
/// Returns `Ok(None)` when the stream ends cleanly on a unit boundary.
pub fn read_unit<R: Read>(reader: &mut BufReader<R>) -> Result<Option<Unit>, ChannelError> {
    let mut buf = [0u8; UNIT_SIZE];
    let mut filled = 0;

    while filled < UNIT_SIZE {
        match reader.read(&mut buf[filled..]) {
            Ok(0) if filled == 0 => return Ok(None),
            Ok(0) => return Err(ChannelError::TruncatedUnit { got: filled }),
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(ChannelError::Io(e)),
        }
    }

    Ok(Some(Unit::from_le_bytes(buf)))
}

/// Writer half of the unit codec
pub struct UnitWriter<W: Write> {
    writer: BufWriter<W>,
}

impl<W: Write> UnitWriter<W> {
    /// Create a new unit writer
    pub fn new(writer: W) -> Self {
        Self {
            writer: BufWriter::with_capacity(UNIT_SIZE, writer),
        }
    }

    /// Write a unit
    pub fn write(&mut self, value: Unit) -> Result<(), ChannelError> {
        write_unit(&mut self.writer, value)
    }
}

/// Reader half of the unit codec
pub struct UnitReader<R: Read> {
    reader: BufReader<R>,
}

impl<R: Read> UnitReader<R> {
    /// Create a new unit reader
    pub fn new(reader: R) -> Self {
        Self {
            reader: BufReader::with_capacity(64 * UNIT_SIZE, reader),
        }
    }

    /// Read the next unit, blocking until one arrives or the writer is gone
    pub fn read(&mut self) -> Result<Option<Unit>, ChannelError> {
        read_unit(&mut self.reader)
    }
}

impl<R: Read> Iterator for UnitReader<R> {
    type Item = Result<Unit, ChannelError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read().transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_units_are_little_endian() {
        let mut buffer = Vec::new();
        {
            let mut writer = UnitWriter::new(&mut buffer);
            writer.write(0x0102_0304).unwrap();
        }
        assert_eq!(buffer, vec![0x04, 0x03, 0x02, 0x01]);
    }

    #[test]
    fn test_multiple_units() {
        let mut buffer = Vec::new();
        {
            let mut writer = UnitWriter::new(&mut buffer);
            for v in 1..=5 {
                writer.write(v).unwrap();
            }
        }
        assert_eq!(buffer.len(), 5 * UNIT_SIZE);

        let reader = UnitReader::new(Cursor::new(buffer));
        let values: Vec<Unit> = reader.collect::<Result<_, _>>().unwrap();
        assert_eq!(values, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_end_of_stream() {
        let buffer: Vec<u8> = Vec::new();
        let mut reader = UnitReader::new(Cursor::new(buffer));
        assert!(matches!(reader.read(), Ok(None)));
    }

    #[test]
    fn test_truncated_unit() {
        let mut buffer = 9i32.to_le_bytes().to_vec();
        buffer.extend_from_slice(&[0xff, 0xff]);

        let mut reader = UnitReader::new(Cursor::new(buffer));
        assert_eq!(reader.read().unwrap(), Some(9));
        assert!(matches!(
            reader.read(),
            Err(ChannelError::TruncatedUnit { got: 2 })
        ));
    }

    /// Delivers one byte per read call, like a pipe drained mid-write.
    struct Trickle(Vec<u8>);

    impl Read for Trickle {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.0.is_empty() || buf.is_empty() {
                return Ok(0);
            }
            buf[0] = self.0.remove(0);
            Ok(1)
        }
    }

    #[test]
    fn test_short_reads_are_reassembled() {
        let bytes = [(-17i32).to_le_bytes(), 40i32.to_le_bytes()].concat();
        let mut reader = UnitReader {
            reader: BufReader::with_capacity(1, Trickle(bytes)),
        };
        assert_eq!(reader.read().unwrap(), Some(-17));
        assert_eq!(reader.read().unwrap(), Some(40));
        assert_eq!(reader.read().unwrap(), None);
    }
}
