//! File-backed save/open.

use super::{read_records, write_records, StorageResult};
use crate::shapes::ShapeRecord;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

/// Save a drawing log to `path`, replacing any existing file.
pub fn save_to_path(path: impl AsRef<Path>, records: &[ShapeRecord]) -> StorageResult<()> {
    let path = path.as_ref();
    let file = File::create(path)?;
    write_records(BufWriter::new(file), records)?;
    log::info!("Saved {} shapes to {}", records.len(), path.display());
    Ok(())
}

/// Load a drawing log previously written by [`save_to_path`].
pub fn load_from_path(path: impl AsRef<Path>) -> StorageResult<Vec<ShapeRecord>> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let records = read_records(BufReader::new(file))?;
    log::info!("Loaded {} shapes from {}", records.len(), path.display());
    Ok(records)
}
