use std::cmp::Ordering;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::cache::Cache;
use crate::error::{Error, Result};
use crate::filter::block::FilterBlockReader;
use crate::options::Options;
use crate::sstable::block::reader::Block;
use crate::sstable::decode_block_contents;
use crate::sstable::footer::{BLOCK_TRAILER_SIZE, BlockHandle, Footer};
use crate::sstable::iterator::SSTableIterator;
use crate::types::{InternalKeyComparator, extract_user_key};

/// How data blocks are fetched for one read.
#[derive(Debug, Clone, Copy)]
pub struct BlockReadOptions {
    pub verify_checksums: bool,
    pub fill_cache: bool,
}

impl Default for BlockReadOptions {
    fn default() -> Self {
        BlockReadOptions {
            verify_checksums: false,
            fill_cache: true,
        }
    }
}

/// An entry in the SSTable's index block.
/// Maps a block's last key to its location in the file.
#[derive(Debug, Clone)]
pub struct IndexEntry {
    /// Last (largest) internal key in the block.
    pub last_key: Vec<u8>,
    pub handle: BlockHandle,
}

/// An opened SSTable file. Supports point lookups and range scans.
///
/// On open:
/// 1. Read footer (last N bytes) → find index and filter block positions
/// 2. Read and parse index block → Vec<IndexEntry>
/// 3. Read the filter block if it was built by the configured policy
/// 4. Ready for queries (data blocks read on demand, through the block cache)
pub struct SSTable {
    /// Path to the SSTable file (for debugging/error messages).
    path: PathBuf,
    id: u64,
    file: Mutex<File>,
    file_size: u64,
    index: Vec<IndexEntry>,
    filter: Option<FilterBlockReader>,
    footer: Footer,
    icmp: InternalKeyComparator,
    cache: Option<Cache>,
    cache_id: u64,
    paranoid_checks: bool,
}

impl std::fmt::Debug for SSTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SSTable")
            .field("path", &self.path)
            .field("id", &self.id)
            .field("file_size", &self.file_size)
            .finish_non_exhaustive()
    }
}

impl SSTable {
    /// Open an SSTable file.
    pub fn open(
        path: &Path,
        id: u64,
        options: &Options,
        icmp: InternalKeyComparator,
        cache: Option<Cache>,
    ) -> Result<Self> {
        let mut file = File::open(path)?;

        let file_size = file.metadata()?.len();
        if file_size < Footer::SIZE as u64 {
            return Err(Error::Corruption(format!(
                "{}: file too short to contain footer",
                path.display()
            )));
        }

        let footer_offset = file_size - Footer::SIZE as u64;
        file.seek(SeekFrom::Start(footer_offset))?;
        let mut footer_buf = vec![0u8; Footer::SIZE];
        file.read_exact(&mut footer_buf)?;
        let footer = Footer::decode(&footer_buf)?;

        let index_contents = read_contents(&mut file, footer.index_handle, true)?;
        let index = Block::decode(index_contents)?;
        let mut entries = Vec::with_capacity(index.len());
        for i in 0..index.len() {
            let (last_key, handle) = index.entry(i);
            entries.push(IndexEntry {
                last_key: last_key.to_vec(),
                handle: BlockHandle::decode(handle)?,
            });
        }

        let filter = match &options.filter_policy {
            Some(policy) if !footer.filter_handle.is_empty() => {
                let contents = read_contents(&mut file, footer.filter_handle, true)?;
                let (name, filter) = split_filter_name(&contents)?;
                if name == policy.name().as_bytes() {
                    Some(FilterBlockReader::new(Arc::clone(policy), filter.to_vec())?)
                } else {
                    None
                }
            }
            _ => None,
        };

        let cache_id = cache.as_ref().map(Cache::new_id).unwrap_or_default();
        Ok(SSTable {
            path: path.to_path_buf(),
            id,
            file: Mutex::new(file),
            file_size,
            index: entries,
            filter,
            footer,
            icmp,
            cache,
            cache_id,
            paranoid_checks: options.paranoid_checks,
        })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    pub fn num_blocks(&self) -> usize {
        self.index.len()
    }

    pub fn has_filter(&self) -> bool {
        self.filter.is_some()
    }

    pub(crate) fn comparator(&self) -> &InternalKeyComparator {
        &self.icmp
    }

    /// Index of the first data block whose last key is >= target.
    pub(crate) fn find_block(&self, target: &[u8]) -> usize {
        self.index
            .partition_point(|e| self.icmp.compare(&e.last_key, target) == Ordering::Less)
    }

    /// Fetch a data block, from the block cache when possible.
    pub(crate) fn read_block(&self, block_idx: usize, opts: BlockReadOptions) -> Result<Arc<Block>> {
        let handle = self.index[block_idx].handle;
        if let Some(cache) = &self.cache {
            if let Some(block) = cache.lookup(self.cache_id, handle.offset) {
                return Ok(block);
            }
        }

        let contents = {
            let mut file = self.file.lock();
            read_contents(&mut file, handle, opts.verify_checksums || self.paranoid_checks)
        }
        .map_err(|e| match e {
            Error::Corruption(msg) => {
                Error::Corruption(format!("{}: {msg}", self.path.display()))
            }
            other => other,
        })?;
        let block = Arc::new(Block::decode(contents)?);

        if opts.fill_cache {
            if let Some(cache) = &self.cache {
                cache.insert(self.cache_id, handle.offset, Arc::clone(&block));
            }
        }
        Ok(block)
    }

    /// Point lookup: the first entry at or after `seek_key` (an internal
    /// key), if it lives in the block that could hold `seek_key`.
    ///
    /// Algorithm:
    /// 1. Binary search index → find the right data block
    /// 2. Ask the block's filter about the user key; a "no" ends the lookup
    /// 3. Read that block (cache or disk)
    /// 4. Binary search within the block
    pub fn get(&self, seek_key: &[u8], opts: BlockReadOptions) -> Result<Option<(Vec<u8>, Vec<u8>)>> {
        let block_idx = self.find_block(seek_key);
        if block_idx >= self.index.len() {
            return Ok(None);
        }

        if let Some(filter) = &self.filter {
            if !filter.key_may_match(block_idx, extract_user_key(seek_key)) {
                return Ok(None);
            }
        }

        let block = self.read_block(block_idx, opts)?;
        let pos = block.seek(seek_key, &self.icmp);
        if pos >= block.len() {
            return Ok(None);
        }
        let (k, v) = block.entry(pos);
        Ok(Some((k.to_vec(), v.to_vec())))
    }

    /// Create an iterator over all entries in the SSTable.
    pub fn iter(self: &Arc<Self>, opts: BlockReadOptions) -> SSTableIterator {
        SSTableIterator::new(Arc::clone(self), opts)
    }

    /// Approximate file offset where data for `key` begins. Keys past the
    /// last block map to the end of the data section.
    pub fn approximate_offset_of(&self, key: &[u8]) -> u64 {
        let block_idx = self.find_block(key);
        match self.index.get(block_idx) {
            Some(entry) => entry.handle.offset,
            None if !self.footer.filter_handle.is_empty() => self.footer.filter_handle.offset,
            None => self.footer.index_handle.offset,
        }
    }
}

/// Read a block with its trailer and return its decoded contents.
fn read_contents(file: &mut File, handle: BlockHandle, verify: bool) -> Result<Vec<u8>> {
    file.seek(SeekFrom::Start(handle.offset))?;
    let mut raw = vec![0u8; handle.size as usize + BLOCK_TRAILER_SIZE];
    file.read_exact(&mut raw)?;
    decode_block_contents(raw, verify)
}

fn split_filter_name(contents: &[u8]) -> Result<(&[u8], &[u8])> {
    if contents.len() < 4 {
        return Err(Error::Corruption("filter block too short".into()));
    }
    let name_len = u32::from_le_bytes(contents[0..4].try_into().unwrap()) as usize;
    if contents.len() < 4 + name_len {
        return Err(Error::Corruption("filter name truncated".into()));
    }
    Ok((&contents[4..4 + name_len], &contents[4 + name_len..]))
}
