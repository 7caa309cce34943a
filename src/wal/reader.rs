use std::fs;
use std::path::Path;

use crate::error::{Error, Result};
use crate::wal::record::WALRecord;

/// Reads WAL records from a file for crash recovery.
///
/// Loads the entire file into memory, then iterates record by record.
/// On startup each log newer than the manifest is replayed into a fresh
/// memtable.
pub struct WALReader {
    data: Vec<u8>,
}

impl WALReader {
    /// Open a WAL file for reading.
    pub fn new(path: &Path) -> Result<Self> {
        let data = fs::read(path)?;
        Ok(WALReader { data })
    }

    /// Create an iterator over the records in the WAL.
    pub fn iter(&self) -> WALIterator<'_> {
        WALIterator {
            data: &self.data,
            offset: 0,
            failed: false,
        }
    }
}

/// Iterator over WAL records.
///
/// A damaged or torn record yields one `Err` carrying its offset, after which
/// the iterator is exhausted: WAL writes are sequential and append-only, so
/// nothing after the damage can be trusted. The caller decides whether that
/// is fatal.
pub struct WALIterator<'a> {
    data: &'a [u8],
    offset: usize,
    failed: bool,
}

impl WALIterator<'_> {
    /// Byte offset of the next record.
    pub fn offset(&self) -> usize {
        self.offset
    }
}

impl Iterator for WALIterator<'_> {
    type Item = Result<WALRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.offset >= self.data.len() {
            return None;
        }

        match WALRecord::decode(&self.data[self.offset..]) {
            Ok((record, used)) => {
                self.offset += used;
                Some(Ok(record))
            }
            Err(e) => {
                self.failed = true;
                let dropped = self.data.len() - self.offset;
                Some(Err(Error::Corruption(format!(
                    "{e} at offset {}, dropping {dropped} bytes",
                    self.offset
                ))))
            }
        }
    }
}
