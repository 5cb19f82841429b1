//! Whiteboard save/open format.
//!
//! A saved whiteboard is a sequential stream of shape records. Each record
//! is a 4-byte big-endian length followed by that many bytes of JSON. The
//! stream ends at a record boundary; anything else is a truncated file.

mod file;

pub use file::{load_from_path, save_to_path};

use crate::shapes::ShapeRecord;
use std::io::{self, Read, Write};
use thiserror::Error;

/// Upper bound on a single encoded record.
pub const MAX_RECORD_LEN: usize = 16 * 1024 * 1024;

/// Storage errors.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Stream ended inside record {index}")]
    Truncated { index: usize },
    #[error("Record {index} is {len} bytes, above the 16 MiB limit")]
    RecordTooLarge { index: usize, len: usize },
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Write records as a length-delimited stream.
pub fn write_records<W: Write>(mut writer: W, records: &[ShapeRecord]) -> StorageResult<()> {
    for (index, record) in records.iter().enumerate() {
        let bytes = serde_json::to_vec(record)?;
        if bytes.len() > MAX_RECORD_LEN {
            return Err(StorageError::RecordTooLarge {
                index,
                len: bytes.len(),
            });
        }
        writer.write_all(&(bytes.len() as u32).to_be_bytes())?;
        writer.write_all(&bytes)?;
    }
    writer.flush()?;
    Ok(())
}

/// Read records until the end of the stream.
pub fn read_records<R: Read>(mut reader: R) -> StorageResult<Vec<ShapeRecord>> {
    let mut records = Vec::new();
    loop {
        let index = records.len();
        let mut header = [0u8; 4];
        match read_full(&mut reader, &mut header)? {
            0 => break,
            4 => {}
            _ => return Err(StorageError::Truncated { index }),
        }

        let len = u32::from_be_bytes(header) as usize;
        if len > MAX_RECORD_LEN {
            return Err(StorageError::RecordTooLarge { index, len });
        }

        let mut body = vec![0u8; len];
        if read_full(&mut reader, &mut body)? != len {
            return Err(StorageError::Truncated { index });
        }
        records.push(serde_json::from_slice(&body)?);
    }
    Ok(records)
}

/// Fill `buf` as far as the reader allows, returning the bytes read.
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shapes::{Oval, Rgb, Shape, Text};
    use kurbo::Point;

    fn sample() -> Vec<ShapeRecord> {
        vec![
            ShapeRecord {
                seq: 1,
                shape: Shape::Oval(Oval::new(Point::new(1.0, 2.0), 30.0, 10.0)),
                color: Rgb::new(0, 128, 128),
            },
            ShapeRecord {
                seq: 4,
                shape: Shape::Text(Text::new("label", Point::new(5.0, 25.0))),
                color: Rgb::black(),
            },
        ]
    }

    #[test]
    fn test_stream_preserves_order() {
        let mut buf = Vec::new();
        write_records(&mut buf, &sample()).unwrap();
        let loaded = read_records(buf.as_slice()).unwrap();
        assert_eq!(loaded, sample());
    }

    #[test]
    fn test_empty_stream() {
        let loaded = read_records(&[0u8; 0][..]).unwrap();
        assert!(loaded.is_empty());
    }

    #[test]
    fn test_truncated_body() {
        let mut buf = Vec::new();
        write_records(&mut buf, &sample()).unwrap();
        buf.truncate(buf.len() - 3);

        let err = read_records(buf.as_slice()).unwrap_err();
        assert!(matches!(err, StorageError::Truncated { index: 1 }));
    }

    #[test]
    fn test_truncated_header() {
        let err = read_records(&[0u8, 0][..]).unwrap_err();
        assert!(matches!(err, StorageError::Truncated { index: 0 }));
    }

    #[test]
    fn test_oversized_length_rejected() {
        let header = u32::MAX.to_be_bytes();
        let err = read_records(&header[..]).unwrap_err();
        assert!(matches!(err, StorageError::RecordTooLarge { index: 0, .. }));
    }
}
