use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::error::Result;
use crate::filter::block::FilterBlockBuilder;
use crate::options::{CompressionType, Options};
use crate::sstable::block::builder::BlockBuilder;
use crate::sstable::footer::{BlockHandle, Footer, SSTableMeta};
use crate::sstable::{compress_block, encode_trailer};
use crate::types::extract_user_key;

/// Builds an SSTable file from a sorted stream of internal keys and values.
///
/// Used during:
/// - Memtable flush (sorted memtable → SSTable)
/// - Compaction (merged iterators → new SSTables)
/// - Repair (replayed logs → SSTables)
///
/// Build process:
/// 1. Add entries one by one (must be in internal key order)
/// 2. Entries fill up blocks; when a block is full it's written to disk
/// 3. finish() flushes the last block, writes filter, index, footer, fsync
pub struct SSTableBuilder {
    /// Current block being filled with entries.
    block_builder: BlockBuilder,
    /// Index block: last key of each data block → its handle.
    index_builder: BlockBuilder,
    /// Per-block filters, when a filter policy is configured.
    filter_builder: Option<FilterBlockBuilder>,
    filter_name: String,
    /// Tracks current write position in the file.
    data_offset: u64,
    /// Buffered file writer.
    writer: BufWriter<File>,
    /// Unique SSTable identifier.
    sst_id: u64,
    block_size: usize,
    restart_interval: usize,
    compression: CompressionType,
    /// Smallest key added (first key, since entries are sorted).
    smallest: Option<Vec<u8>>,
    /// Largest key added (updated on every add).
    largest: Option<Vec<u8>>,
    /// Total entries added.
    entry_count: u64,
}

impl SSTableBuilder {
    /// Create a new SSTable builder that writes to the given path.
    pub fn new(path: &Path, sst_id: u64, options: &Options) -> Result<Self> {
        let file = File::create(path)?;
        let filter_name = options
            .filter_policy
            .as_ref()
            .map(|p| p.name().to_string())
            .unwrap_or_default();
        Ok(SSTableBuilder {
            block_builder: BlockBuilder::new(options.block_size, options.block_restart_interval),
            index_builder: BlockBuilder::new(usize::MAX, 1),
            filter_builder: options
                .filter_policy
                .clone()
                .map(FilterBlockBuilder::new),
            filter_name,
            data_offset: 0,
            writer: BufWriter::new(file),
            sst_id,
            block_size: options.block_size,
            restart_interval: options.block_restart_interval,
            compression: options.compression,
            smallest: None,
            largest: None,
            entry_count: 0,
        })
    }

    /// Add an entry. MUST be called in internal key order.
    pub fn add(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        if self.smallest.is_none() {
            self.smallest = Some(key.to_vec());
        }
        self.largest = Some(key.to_vec());
        self.entry_count += 1;

        if !self.block_builder.add(key, value) {
            // Block is full: flush it, then add to a fresh block
            self.flush_block()?;
            assert!(self.block_builder.add(key, value));
        }
        if let Some(filter) = self.filter_builder.as_mut() {
            filter.add_key(extract_user_key(key));
        }
        Ok(())
    }

    /// Bytes written so far plus the pending block.
    pub fn file_size(&self) -> u64 {
        self.data_offset + self.block_builder.estimated_size() as u64
    }

    pub fn entry_count(&self) -> u64 {
        self.entry_count
    }

    /// Flush the current block to disk and record an index entry.
    fn flush_block(&mut self) -> Result<()> {
        if self.block_builder.is_empty() {
            return Ok(());
        }

        let old_builder = std::mem::replace(
            &mut self.block_builder,
            BlockBuilder::new(self.block_size, self.restart_interval),
        );
        let last_key = old_builder.last_key().to_vec();
        let handle = self.write_block(&old_builder.build(), self.compression)?;

        self.index_builder.add(&last_key, &handle.encode());
        if let Some(filter) = self.filter_builder.as_mut() {
            filter.finish_block();
        }
        Ok(())
    }

    fn write_block(&mut self, contents: &[u8], compression: CompressionType) -> Result<BlockHandle> {
        let (stored, kind) = compress_block(contents, compression)?;
        let handle = BlockHandle::new(self.data_offset, stored.len() as u64);
        self.writer.write_all(&stored)?;
        self.writer.write_all(&encode_trailer(&stored, kind))?;
        self.data_offset += (stored.len() + crate::sstable::footer::BLOCK_TRAILER_SIZE) as u64;
        Ok(handle)
    }

    /// Finalize the SSTable: flush last block, write filter block, index
    /// block, footer, fsync.
    pub fn finish(mut self) -> Result<SSTableMeta> {
        self.flush_block()?;

        let filter_handle = match self.filter_builder.take() {
            Some(filter) => {
                // The policy name travels with the filter so a reader can tell
                // whether it understands it.
                let mut contents = Vec::new();
                contents.extend_from_slice(&(self.filter_name.len() as u32).to_le_bytes());
                contents.extend_from_slice(self.filter_name.as_bytes());
                contents.extend_from_slice(&filter.finish());
                self.write_block(&contents, CompressionType::None)?
            }
            None => BlockHandle::default(),
        };

        let index_builder = std::mem::replace(&mut self.index_builder, BlockBuilder::new(0, 1));
        let index_handle = self.write_block(&index_builder.build(), CompressionType::None)?;

        self.writer
            .write_all(&Footer::new(index_handle, filter_handle).encode())?;
        self.data_offset += Footer::SIZE as u64;

        // Flush buffer + fsync to guarantee durability
        self.writer.flush()?;
        self.writer.get_ref().sync_all()?;

        Ok(SSTableMeta {
            id: self.sst_id,
            level: 0,
            smallest: self.smallest.unwrap_or_default(),
            largest: self.largest.unwrap_or_default(),
            file_size: self.data_offset,
            entry_count: self.entry_count,
        })
    }
}
