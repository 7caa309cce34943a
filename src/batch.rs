//! Ordered, atomic groups of puts and deletes.
//!
//! Encoding (also the write-ahead log payload):
//! ```text
//! ┌────────────────┬─────────────┬─────────────────────────────────────────┐
//! │ sequence (8B)  │ count (4B)  │ records...                              │
//! └────────────────┴─────────────┴─────────────────────────────────────────┘
//! record := Put    [0x01][key_len(4B)][key][val_len(4B)][value]
//!         | Delete [0x02][key_len(4B)][key]
//! ```

use crate::error::{Error, Result};
use crate::memtable::MemTable;
use crate::types::{SequenceNumber, ValueType};

const HEADER_SIZE: usize = 12;

/// Receives the records of a batch in the order they were appended.
pub trait BatchHandler {
    fn put(&mut self, key: &[u8], value: &[u8]);
    fn delete(&mut self, key: &[u8]);
}

/// A single decoded record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchOp<'a> {
    Put { key: &'a [u8], value: &'a [u8] },
    Delete { key: &'a [u8] },
}

/// An ordered log of puts and deletes, applied atomically by `Db::write`.
///
/// Later records win over earlier ones for the same key, so
/// `put(a, 1); put(a, 2)` leaves `a == 2`.
#[derive(Clone, PartialEq, Eq)]
pub struct WriteBatch {
    rep: Vec<u8>,
}

impl Default for WriteBatch {
    fn default() -> Self {
        Self::new()
    }
}

impl WriteBatch {
    pub fn new() -> Self {
        WriteBatch {
            rep: vec![0u8; HEADER_SIZE],
        }
    }

    /// Append a put of `key` → `value`.
    pub fn put(&mut self, key: &[u8], value: &[u8]) {
        self.set_count(self.count() + 1);
        self.rep.push(ValueType::Put as u8);
        put_length_prefixed(&mut self.rep, key);
        put_length_prefixed(&mut self.rep, value);
    }

    /// Append a delete of `key`.
    pub fn delete(&mut self, key: &[u8]) {
        self.set_count(self.count() + 1);
        self.rep.push(ValueType::Delete as u8);
        put_length_prefixed(&mut self.rep, key);
    }

    /// Drop every record.
    pub fn clear(&mut self) {
        self.rep.clear();
        self.rep.resize(HEADER_SIZE, 0);
    }

    /// Append all records of `other` after the records of `self`.
    pub fn append(&mut self, other: &WriteBatch) {
        self.set_count(self.count() + other.count());
        self.rep.extend_from_slice(&other.rep[HEADER_SIZE..]);
    }

    /// Number of records.
    pub fn count(&self) -> u32 {
        u32::from_le_bytes(self.rep[8..12].try_into().unwrap())
    }

    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    /// Size of the encoded batch in bytes.
    pub fn approximate_size(&self) -> usize {
        self.rep.len()
    }

    /// Replay every record, in append order, into `handler`.
    pub fn iterate(&self, handler: &mut dyn BatchHandler) -> Result<()> {
        for op in self.iter() {
            match op? {
                BatchOp::Put { key, value } => handler.put(key, value),
                BatchOp::Delete { key } => handler.delete(key),
            }
        }
        Ok(())
    }

    /// Records in append order. Yields a corruption error and stops on
    /// malformed contents or a record count that disagrees with the header.
    pub fn iter(&self) -> BatchIter<'_> {
        BatchIter {
            data: &self.rep[HEADER_SIZE..],
            expected: self.count(),
            seen: 0,
            done: false,
        }
    }

    pub(crate) fn sequence(&self) -> SequenceNumber {
        u64::from_le_bytes(self.rep[0..8].try_into().unwrap())
    }

    pub(crate) fn set_sequence(&mut self, sequence: SequenceNumber) {
        self.rep[0..8].copy_from_slice(&sequence.to_le_bytes());
    }

    fn set_count(&mut self, count: u32) {
        self.rep[8..12].copy_from_slice(&count.to_le_bytes());
    }

    /// Encoded form, as written to the log.
    pub(crate) fn contents(&self) -> &[u8] {
        &self.rep
    }

    pub(crate) fn from_contents(contents: Vec<u8>) -> Result<Self> {
        if contents.len() < HEADER_SIZE {
            return Err(Error::Corruption("malformed WriteBatch (too small)".into()));
        }
        Ok(WriteBatch { rep: contents })
    }

    /// Apply to a memtable, numbering records from the batch sequence.
    pub(crate) fn insert_into(&self, mem: &mut MemTable) -> Result<()> {
        let mut sequence = self.sequence();
        for op in self.iter() {
            match op? {
                BatchOp::Put { key, value } => mem.add(sequence, ValueType::Put, key, value),
                BatchOp::Delete { key } => mem.add(sequence, ValueType::Delete, key, &[]),
            }
            sequence += 1;
        }
        Ok(())
    }
}

impl std::fmt::Debug for WriteBatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WriteBatch")
            .field("sequence", &self.sequence())
            .field("count", &self.count())
            .field("bytes", &self.rep.len())
            .finish()
    }
}

fn put_length_prefixed(buf: &mut Vec<u8>, data: &[u8]) {
    buf.extend_from_slice(&(data.len() as u32).to_le_bytes());
    buf.extend_from_slice(data);
}

fn get_length_prefixed<'a>(data: &mut &'a [u8]) -> Option<&'a [u8]> {
    if data.len() < 4 {
        return None;
    }
    let len = u32::from_le_bytes(data[0..4].try_into().unwrap()) as usize;
    if data.len() < 4 + len {
        return None;
    }
    let (field, rest) = data[4..].split_at(len);
    *data = rest;
    Some(field)
}

/// Iterator over the records of a `WriteBatch`.
pub struct BatchIter<'a> {
    data: &'a [u8],
    expected: u32,
    seen: u32,
    done: bool,
}

impl<'a> BatchIter<'a> {
    fn fail(&mut self, msg: &str) -> Option<Result<BatchOp<'a>>> {
        self.done = true;
        Some(Err(Error::Corruption(msg.to_string())))
    }
}

impl<'a> Iterator for BatchIter<'a> {
    type Item = Result<BatchOp<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let Some((&tag, rest)) = self.data.split_first() else {
            self.done = true;
            if self.seen != self.expected {
                return Some(Err(Error::Corruption("WriteBatch has wrong count".into())));
            }
            return None;
        };
        self.data = rest;

        let op = match ValueType::from_u8(tag) {
            Ok(ValueType::Put) => {
                let Some(key) = get_length_prefixed(&mut self.data) else {
                    return self.fail("bad WriteBatch Put");
                };
                let Some(value) = get_length_prefixed(&mut self.data) else {
                    return self.fail("bad WriteBatch Put");
                };
                BatchOp::Put { key, value }
            }
            Ok(ValueType::Delete) => {
                let Some(key) = get_length_prefixed(&mut self.data) else {
                    return self.fail("bad WriteBatch Delete");
                };
                BatchOp::Delete { key }
            }
            Err(_) => return self.fail("unknown WriteBatch tag"),
        };
        self.seen += 1;
        Some(Ok(op))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_tracks_count_and_sequence() {
        let mut batch = WriteBatch::new();
        assert_eq!(batch.count(), 0);
        batch.put(b"a", b"1");
        batch.delete(b"b");
        assert_eq!(batch.count(), 2);
        batch.set_sequence(100);
        assert_eq!(batch.sequence(), 100);
        batch.clear();
        assert_eq!(batch.count(), 0);
        assert_eq!(batch.approximate_size(), HEADER_SIZE);
    }

    #[test]
    fn count_mismatch_is_corruption() {
        let mut batch = WriteBatch::new();
        batch.put(b"a", b"1");
        batch.set_count(2);
        let results: Vec<_> = batch.iter().collect();
        assert_eq!(results.len(), 2);
        assert!(results[0].is_ok());
        assert!(results[1].as_ref().unwrap_err().is_corruption());
    }

    #[test]
    fn truncated_record_is_corruption() {
        let mut batch = WriteBatch::new();
        batch.put(b"key", b"value");
        let mut contents = batch.contents().to_vec();
        contents.truncate(contents.len() - 2);
        let batch = WriteBatch::from_contents(contents).unwrap();
        assert!(batch.iter().any(|r| r.is_err()));
    }

    #[test]
    fn from_contents_rejects_short_input() {
        assert!(WriteBatch::from_contents(vec![0; 5]).is_err());
    }
}
