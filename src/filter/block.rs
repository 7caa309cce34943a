use std::sync::Arc;

use crate::error::{Error, Result};
use crate::filter::FilterPolicy;

/// Builds the filter block of a table: one filter per data block.
///
/// Usage during table build:
/// 1. `add_key()` for every user key written to the current data block
/// 2. `finish_block()` when the data block is flushed
/// 3. `finish()` once, after the last data block
///
/// Layout:
/// ```text
/// [filter 0][filter 1]...[filter N-1][offset 0 (4B)]...[offset N-1 (4B)][N (4B)]
/// ```
pub struct FilterBlockBuilder {
    policy: Arc<dyn FilterPolicy>,
    keys: Vec<Vec<u8>>,
    data: Vec<u8>,
    offsets: Vec<u32>,
}

impl FilterBlockBuilder {
    pub fn new(policy: Arc<dyn FilterPolicy>) -> Self {
        FilterBlockBuilder {
            policy,
            keys: Vec::new(),
            data: Vec::new(),
            offsets: Vec::new(),
        }
    }

    /// Add a user key of the data block being built. Consecutive duplicates
    /// (several versions of one key) are folded.
    pub fn add_key(&mut self, key: &[u8]) {
        if self.keys.last().map(Vec::as_slice) != Some(key) {
            self.keys.push(key.to_vec());
        }
    }

    /// Seal the filter for the data block that was just flushed.
    pub fn finish_block(&mut self) {
        let keys: Vec<&[u8]> = self.keys.iter().map(Vec::as_slice).collect();
        let filter = self.policy.create_filter(&keys);
        self.offsets.push(self.data.len() as u32);
        self.data.extend_from_slice(&filter);
        self.keys.clear();
    }

    pub fn finish(mut self) -> Vec<u8> {
        if !self.keys.is_empty() {
            self.finish_block();
        }
        let mut block = self.data;
        for offset in &self.offsets {
            block.extend_from_slice(&offset.to_le_bytes());
        }
        block.extend_from_slice(&(self.offsets.len() as u32).to_le_bytes());
        block
    }
}

/// Read side of a filter block.
pub struct FilterBlockReader {
    policy: Arc<dyn FilterPolicy>,
    data: Vec<u8>,
    offsets: Vec<u32>,
}

impl FilterBlockReader {
    pub fn new(policy: Arc<dyn FilterPolicy>, mut contents: Vec<u8>) -> Result<Self> {
        if contents.len() < 4 {
            return Err(Error::Corruption("filter block too short".into()));
        }
        let n = contents.len();
        let count = u32::from_le_bytes(contents[n - 4..].try_into().unwrap()) as usize;
        let offsets_start = (n - 4)
            .checked_sub(count * 4)
            .ok_or_else(|| Error::Corruption("filter block offsets truncated".into()))?;

        let offsets: Vec<u32> = contents[offsets_start..n - 4]
            .chunks_exact(4)
            .map(|c| u32::from_le_bytes(c.try_into().unwrap()))
            .collect();
        if offsets.windows(2).any(|w| w[0] > w[1])
            || offsets.last().is_some_and(|&last| last as usize > offsets_start)
        {
            return Err(Error::Corruption("filter block offsets out of order".into()));
        }

        contents.truncate(offsets_start);
        Ok(FilterBlockReader {
            policy,
            data: contents,
            offsets,
        })
    }

    /// Whether `key` may be in data block `block_index`. Unknown blocks
    /// always match.
    pub fn key_may_match(&self, block_index: usize, key: &[u8]) -> bool {
        let Some(&start) = self.offsets.get(block_index) else {
            return true;
        };
        let end = self
            .offsets
            .get(block_index + 1)
            .copied()
            .unwrap_or(self.data.len() as u32);
        let filter = &self.data[start as usize..end as usize];
        self.policy.key_may_match(key, filter)
    }

    pub fn num_filters(&self) -> usize {
        self.offsets.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::BloomFilterPolicy;

    fn policy() -> Arc<dyn FilterPolicy> {
        Arc::new(BloomFilterPolicy::new(10))
    }

    #[test]
    fn one_filter_per_block() {
        let mut builder = FilterBlockBuilder::new(policy());
        builder.add_key(b"apple");
        builder.add_key(b"banana");
        builder.finish_block();
        builder.add_key(b"cherry");
        builder.finish_block();

        let reader = FilterBlockReader::new(policy(), builder.finish()).unwrap();
        assert_eq!(reader.num_filters(), 2);
        assert!(reader.key_may_match(0, b"apple"));
        assert!(reader.key_may_match(0, b"banana"));
        assert!(!reader.key_may_match(0, b"cherry"));
        assert!(reader.key_may_match(1, b"cherry"));
        assert!(reader.key_may_match(7, b"anything"));
    }

    #[test]
    fn truncated_block_is_corruption() {
        assert!(FilterBlockReader::new(policy(), vec![1, 2]).is_err());
        assert!(FilterBlockReader::new(policy(), vec![0, 0, 0, 0, 9, 0, 0, 0]).is_err());
    }
}
