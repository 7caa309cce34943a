use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::wal::record::WALRecord;

/// Writes WAL records to a file on disk.
///
/// Every write reaches the OS before it's acknowledged to the client; a
/// `sync` append also waits for the disk. On restart, replaying the WAL
/// reconstructs the memtable.
///
/// Two layers of buffering:
///   BufWriter.flush()  → Rust buffer → OS page cache
///   file.sync_all()    → OS page cache → physical disk
pub struct WALWriter {
    path: PathBuf,
    writer: BufWriter<File>,
    offset: u64,
}

impl WALWriter {
    /// Create a new, empty WAL at the given path.
    pub fn new(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;

        Ok(WALWriter {
            path: path.to_path_buf(),
            writer: BufWriter::new(file),
            offset: 0,
        })
    }

    /// Append one record. With `sync`, the record is on disk when this
    /// returns.
    pub fn append(&mut self, payload: &[u8], sync: bool) -> Result<()> {
        let encoded = WALRecord::encode(payload);

        self.writer.write_all(&encoded)?;
        self.writer.flush()?;
        self.offset += encoded.len() as u64;

        if sync {
            self.writer.get_ref().sync_data()?;
        }
        Ok(())
    }

    /// Force fsync to disk. Ensures all buffered writes are durable.
    pub fn sync(&mut self) -> Result<()> {
        self.writer.flush()?;
        self.writer.get_ref().sync_all()?;
        Ok(())
    }

    /// Current file offset (bytes written so far).
    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
