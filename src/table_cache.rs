use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::cache::{Cache, ChargedLru};
use crate::db::filename::table_file_name;
use crate::error::Result;
use crate::options::Options;
use crate::sstable::{BlockReadOptions, SSTable, SSTableIterator};
use crate::types::InternalKeyComparator;

/// File handles kept back from `max_open_files` for logs, the manifest and
/// the lock.
const RESERVED_FILES: usize = 10;

/// Bounded set of open table files, keyed by file number.
///
/// Evicted tables stay usable by anyone still holding the `Arc`; the file is
/// closed when the last holder lets go.
pub struct TableCache {
    dir: PathBuf,
    options: Options,
    icmp: InternalKeyComparator,
    block_cache: Cache,
    tables: Mutex<ChargedLru<u64, Arc<SSTable>>>,
}

impl TableCache {
    pub fn new(dir: &Path, options: &Options, icmp: InternalKeyComparator, block_cache: Cache) -> Self {
        let capacity = options.max_open_files.saturating_sub(RESERVED_FILES).max(1);
        TableCache {
            dir: dir.to_path_buf(),
            options: options.clone(),
            icmp,
            block_cache,
            tables: Mutex::new(ChargedLru::new(capacity)),
        }
    }

    /// The open table for file `id`, opening it if needed.
    pub fn find_table(&self, id: u64) -> Result<Arc<SSTable>> {
        if let Some(table) = self.tables.lock().get(&id) {
            return Ok(table);
        }

        // Opened outside the lock; two racing opens of the same file are
        // harmless, the second insert replaces the first.
        let path = table_file_name(&self.dir, id);
        let table = Arc::new(SSTable::open(
            &path,
            id,
            &self.options,
            self.icmp.clone(),
            Some(self.block_cache.clone()),
        )?);
        debug!(id, path = %path.display(), "table opened");
        self.tables.lock().insert(id, Arc::clone(&table), 1);
        Ok(table)
    }

    /// Point lookup in table `id`. See [`SSTable::get`].
    pub fn get(
        &self,
        id: u64,
        seek_key: &[u8],
        opts: BlockReadOptions,
    ) -> Result<Option<(Vec<u8>, Vec<u8>)>> {
        self.find_table(id)?.get(seek_key, opts)
    }

    pub fn iter(&self, id: u64, opts: BlockReadOptions) -> Result<SSTableIterator> {
        Ok(self.find_table(id)?.iter(opts))
    }

    /// Forget table `id`, typically because its file is about to be deleted.
    pub fn evict(&self, id: u64) {
        self.tables.lock().remove(&id);
    }

    pub fn block_cache(&self) -> &Cache {
        &self.block_cache
    }

    pub fn open_tables(&self) -> usize {
        self.tables.lock().len()
    }
}
