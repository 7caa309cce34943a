use std::sync::Arc;

use crate::error::Result;
use crate::iterator::StorageIterator;
use crate::sstable::block::reader::BlockIterator;
use crate::sstable::reader::{BlockReadOptions, SSTable};

/// Two-level iterator over an SSTable: walks the index, loading one data
/// block at a time.
pub struct SSTableIterator {
    table: Arc<SSTable>,
    opts: BlockReadOptions,
    block_idx: usize,
    block_iter: Option<BlockIterator>,
}

impl SSTableIterator {
    pub(crate) fn new(table: Arc<SSTable>, opts: BlockReadOptions) -> Self {
        SSTableIterator {
            table,
            opts,
            block_idx: 0,
            block_iter: None,
        }
    }

    fn load_block(&mut self, block_idx: usize) -> Result<()> {
        self.block_iter = None;
        if block_idx >= self.table.num_blocks() {
            return Ok(());
        }
        let block = self.table.read_block(block_idx, self.opts)?;
        self.block_iter = Some(block.iter(self.table.comparator().clone()));
        self.block_idx = block_idx;
        Ok(())
    }

    fn skip_exhausted_forward(&mut self) -> Result<()> {
        while self.block_iter.as_ref().is_some_and(|it| !it.is_valid()) {
            self.load_block(self.block_idx + 1)?;
            if let Some(it) = self.block_iter.as_mut() {
                it.seek_to_first()?;
            }
        }
        Ok(())
    }

    fn skip_exhausted_backward(&mut self) -> Result<()> {
        while self.block_iter.as_ref().is_some_and(|it| !it.is_valid()) {
            if self.block_idx == 0 {
                self.block_iter = None;
                break;
            }
            self.load_block(self.block_idx - 1)?;
            if let Some(it) = self.block_iter.as_mut() {
                it.seek_to_last()?;
            }
        }
        Ok(())
    }
}

impl StorageIterator for SSTableIterator {
    fn key(&self) -> &[u8] {
        self.block_iter.as_ref().map(|it| it.key()).unwrap_or(&[])
    }

    fn value(&self) -> &[u8] {
        self.block_iter.as_ref().map(|it| it.value()).unwrap_or(&[])
    }

    fn is_valid(&self) -> bool {
        self.block_iter.as_ref().is_some_and(|it| it.is_valid())
    }

    fn next(&mut self) -> Result<()> {
        if let Some(it) = self.block_iter.as_mut() {
            it.next()?;
        }
        self.skip_exhausted_forward()
    }

    fn prev(&mut self) -> Result<()> {
        if let Some(it) = self.block_iter.as_mut() {
            it.prev()?;
        }
        self.skip_exhausted_backward()
    }

    fn seek(&mut self, key: &[u8]) -> Result<()> {
        let block_idx = self.table.find_block(key);
        self.load_block(block_idx)?;
        if let Some(it) = self.block_iter.as_mut() {
            it.seek(key)?;
        }
        self.skip_exhausted_forward()
    }

    fn seek_to_first(&mut self) -> Result<()> {
        self.load_block(0)?;
        if let Some(it) = self.block_iter.as_mut() {
            it.seek_to_first()?;
        }
        self.skip_exhausted_forward()
    }

    fn seek_to_last(&mut self) -> Result<()> {
        let Some(last) = self.table.num_blocks().checked_sub(1) else {
            self.block_iter = None;
            return Ok(());
        };
        self.load_block(last)?;
        if let Some(it) = self.block_iter.as_mut() {
            it.seek_to_last()?;
        }
        self.skip_exhausted_backward()
    }
}
