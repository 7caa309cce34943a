pub mod skiplist;

use std::cmp::Ordering;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::Result;
use crate::iterator::StorageIterator;
use crate::types::{
    InternalKey, InternalKeyComparator, LookupResult, ParsedInternalKey, SequenceNumber, ValueType,
    encode_internal_key,
};
use skiplist::{SkipList, SkipListIter};

/// In-memory sorted buffer for writes. Wraps a SkipList keyed by internal
/// key, so every version of a key is kept until the memtable is flushed.
///
/// Every write goes here first. When size exceeds the threshold,
/// the memtable is frozen (becomes immutable) and flushed to an SSTable.
///
/// Deletes are tombstone entries: older versions of the key may exist in
/// SSTables on disk and must stay hidden.
pub struct MemTable {
    data: SkipList,
    size_limit: usize,
}

/// A memtable shared between the writer and any number of iterators.
pub type SharedMemTable = Arc<RwLock<MemTable>>;

impl MemTable {
    /// Create a new empty memtable with given size limit.
    pub fn new(cmp: InternalKeyComparator, size_limit: usize) -> Self {
        MemTable {
            data: SkipList::new(cmp),
            size_limit,
        }
    }

    pub fn shared(cmp: InternalKeyComparator, size_limit: usize) -> SharedMemTable {
        Arc::new(RwLock::new(Self::new(cmp, size_limit)))
    }

    /// Record a put or a tombstone for `key` at `sequence`.
    pub fn add(&mut self, sequence: SequenceNumber, value_type: ValueType, key: &[u8], value: &[u8]) {
        self.data
            .insert(encode_internal_key(key, sequence, value_type), value.to_vec());
    }

    /// Newest entry for `key` visible at `sequence`. `None` when the
    /// memtable knows nothing about the key.
    pub fn get(&self, key: &[u8], sequence: SequenceNumber) -> Option<LookupResult> {
        let seek = InternalKey::for_seek(key, sequence).encode();
        let node = self.data.seek(&seek)?;
        let (ikey, value) = self.data.entry(node);
        let parsed = ParsedInternalKey::parse(ikey).ok()?;
        if self.data_cmp().compare_user(parsed.user_key, key) != Ordering::Equal {
            return None;
        }
        match parsed.value_type {
            ValueType::Put => Some(LookupResult::Found(value.to_vec())),
            ValueType::Delete => Some(LookupResult::Deleted),
        }
    }

    fn data_cmp(&self) -> &InternalKeyComparator {
        self.data.comparator()
    }

    /// Sorted entries (internal key, value), tombstones included.
    pub fn iter(&self) -> SkipListIter<'_> {
        self.data.iter()
    }

    /// Bytes of entries with internal keys in `[start, limit)`.
    pub fn approximate_range_size(&self, start: &[u8], limit: &[u8]) -> u64 {
        let mut total = 0u64;
        let mut node = self.data.seek(start);
        while let Some(n) = node {
            let (k, v) = self.data.entry(n);
            if self.data_cmp().compare(k, limit) != Ordering::Less {
                break;
            }
            total += (k.len() + v.len()) as u64;
            node = self.data.next(n);
        }
        total
    }

    /// Current memory usage in bytes.
    pub fn size(&self) -> usize {
        self.data.size_bytes()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Check if memtable has reached the flush threshold.
    pub fn is_full(&self) -> bool {
        self.data.size_bytes() >= self.size_limit
    }
}

/// Cursor over a shared memtable.
///
/// Takes the read lock only for the duration of each move and copies the
/// current entry out, so writers are never blocked by an idle iterator.
/// Entries inserted after the iterator was created can appear in it; the
/// database iterator filters them out by sequence number.
pub struct MemTableIterator {
    table: SharedMemTable,
    node: Option<usize>,
    key: Vec<u8>,
    value: Vec<u8>,
}

impl MemTableIterator {
    pub fn new(table: SharedMemTable) -> Self {
        MemTableIterator {
            table,
            node: None,
            key: Vec::new(),
            value: Vec::new(),
        }
    }

    fn position(&mut self, list: &SkipList, node: Option<usize>) {
        self.node = node;
        self.key.clear();
        self.value.clear();
        if let Some(n) = node {
            let (k, v) = list.entry(n);
            self.key.extend_from_slice(k);
            self.value.extend_from_slice(v);
        }
    }

    fn step(&mut self, f: impl FnOnce(&SkipList, Option<usize>) -> Option<usize>) {
        let table = Arc::clone(&self.table);
        let guard = table.read();
        let node = f(&guard.data, self.node);
        self.position(&guard.data, node);
    }
}

impl StorageIterator for MemTableIterator {
    fn key(&self) -> &[u8] {
        &self.key
    }

    fn value(&self) -> &[u8] {
        &self.value
    }

    fn is_valid(&self) -> bool {
        self.node.is_some()
    }

    fn next(&mut self) -> Result<()> {
        self.step(|list, node| node.and_then(|n| list.next(n)));
        Ok(())
    }

    fn prev(&mut self) -> Result<()> {
        self.step(|list, node| node.and_then(|n| list.prev(n)));
        Ok(())
    }

    fn seek(&mut self, key: &[u8]) -> Result<()> {
        self.step(|list, _| list.seek(key));
        Ok(())
    }

    fn seek_to_first(&mut self) -> Result<()> {
        self.step(|list, _| list.first());
        Ok(())
    }

    fn seek_to_last(&mut self) -> Result<()> {
        self.step(|list, _| list.last());
        Ok(())
    }
}
