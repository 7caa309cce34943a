use std::cmp::Ordering;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::iterator::StorageIterator;
use crate::sstable::block::builder::ENTRY_HEADER_SIZE;
use crate::types::InternalKeyComparator;

/// A decoded block: prefix compression undone, entries in key order.
#[derive(Debug)]
pub struct Block {
    entries: Vec<(Vec<u8>, Vec<u8>)>,
    size: usize,
}

fn read_u32(data: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes(data[offset..offset + 4].try_into().unwrap())
}

impl Block {
    /// Decode the output of `BlockBuilder::build`.
    pub fn decode(data: Vec<u8>) -> Result<Self> {
        let size = data.len();
        if size < 4 {
            return Err(Error::Corruption("block too short".into()));
        }
        let num_restarts = read_u32(&data, size - 4) as usize;
        let restarts_start = (size - 4)
            .checked_sub(num_restarts * 4)
            .ok_or_else(|| Error::Corruption("block restart array truncated".into()))?;

        let mut restarts = (0..num_restarts)
            .map(|i| read_u32(&data, restarts_start + i * 4) as usize)
            .peekable();

        let mut entries: Vec<(Vec<u8>, Vec<u8>)> = Vec::new();
        let mut offset = 0usize;
        while offset < restarts_start {
            if offset + ENTRY_HEADER_SIZE > restarts_start {
                return Err(Error::Corruption("block entry header truncated".into()));
            }
            let shared = read_u32(&data, offset) as usize;
            let unshared = read_u32(&data, offset + 4) as usize;
            let value_len = read_u32(&data, offset + 8) as usize;

            let at_restart = restarts.peek() == Some(&offset);
            if at_restart {
                restarts.next();
            }
            let prev_key = entries.last().map(|(k, _)| k.as_slice()).unwrap_or(&[]);
            if shared > prev_key.len() || (at_restart && shared != 0) {
                return Err(Error::Corruption("bad shared key prefix in block".into()));
            }

            let key_start = offset + ENTRY_HEADER_SIZE;
            let value_start = key_start + unshared;
            let end = value_start + value_len;
            if end > restarts_start {
                return Err(Error::Corruption("block entry overruns block".into()));
            }

            let mut key = Vec::with_capacity(shared + unshared);
            key.extend_from_slice(&prev_key[..shared]);
            key.extend_from_slice(&data[key_start..value_start]);
            entries.push((key, data[value_start..end].to_vec()));
            offset = end;
        }

        Ok(Block { entries, size })
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Encoded size, used as the cache charge.
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn entry(&self, index: usize) -> (&[u8], &[u8]) {
        let (k, v) = &self.entries[index];
        (k, v)
    }

    /// Index of the first entry with key >= target.
    pub fn seek(&self, target: &[u8], cmp: &InternalKeyComparator) -> usize {
        self.entries
            .partition_point(|(k, _)| cmp.compare(k, target) == Ordering::Less)
    }

    /// Value stored under exactly `key`.
    pub fn get(&self, key: &[u8], cmp: &InternalKeyComparator) -> Option<&[u8]> {
        let idx = self.seek(key, cmp);
        match self.entries.get(idx) {
            Some((k, v)) if cmp.compare(k, key) == Ordering::Equal => Some(v),
            _ => None,
        }
    }

    pub fn iter(self: &Arc<Self>, cmp: InternalKeyComparator) -> BlockIterator {
        BlockIterator {
            block: Arc::clone(self),
            cmp,
            pos: None,
        }
    }
}

/// Cursor over one block.
pub struct BlockIterator {
    block: Arc<Block>,
    cmp: InternalKeyComparator,
    pos: Option<usize>,
}

impl BlockIterator {
    fn set(&mut self, idx: usize) {
        self.pos = (idx < self.block.len()).then_some(idx);
    }
}

impl StorageIterator for BlockIterator {
    fn key(&self) -> &[u8] {
        self.pos.map(|i| self.block.entry(i).0).unwrap_or(&[])
    }

    fn value(&self) -> &[u8] {
        self.pos.map(|i| self.block.entry(i).1).unwrap_or(&[])
    }

    fn is_valid(&self) -> bool {
        self.pos.is_some()
    }

    fn next(&mut self) -> Result<()> {
        if let Some(i) = self.pos {
            self.set(i + 1);
        }
        Ok(())
    }

    fn prev(&mut self) -> Result<()> {
        self.pos = self.pos.and_then(|i| i.checked_sub(1));
        Ok(())
    }

    fn seek(&mut self, key: &[u8]) -> Result<()> {
        let idx = self.block.seek(key, &self.cmp);
        self.set(idx);
        Ok(())
    }

    fn seek_to_first(&mut self) -> Result<()> {
        self.set(0);
        Ok(())
    }

    fn seek_to_last(&mut self) -> Result<()> {
        self.pos = self.block.len().checked_sub(1);
        Ok(())
    }
}
