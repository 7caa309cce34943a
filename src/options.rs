use std::fmt;
use std::sync::Arc;

use crate::cache::Cache;
use crate::comparator::{Comparator, bytewise};
use crate::db::Snapshot;
use crate::env::{Env, default_env};
use crate::filter::FilterPolicy;

/// Block compression applied to table data blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompressionType {
    /// Blocks are stored as-is.
    None = 0,
    /// zstd at its fastest level.
    #[default]
    Zstd = 1,
}

impl CompressionType {
    pub fn from_u8(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(CompressionType::None),
            1 => Some(CompressionType::Zstd),
            _ => None,
        }
    }
}

/// Open-time options. Cloned into the database at open; changing a value
/// afterwards affects only later opens.
#[derive(Clone)]
pub struct Options {
    /// Ordering of user keys. Its name is persisted and checked on reopen.
    pub comparator: Arc<dyn Comparator>,
    /// Per-block filter used to skip table reads on point lookups.
    pub filter_policy: Option<Arc<dyn FilterPolicy>>,
    /// Shared block cache. `None` gives each database a private 8 MiB cache.
    pub block_cache: Option<Cache>,
    /// Filesystem abstraction for directory-level operations.
    pub env: Arc<dyn Env>,
    /// Create the database if it is missing.
    pub create_if_missing: bool,
    /// Fail to open if the database already exists.
    pub error_if_exists: bool,
    /// Verify every checksum and fail on any sign of corruption, including
    /// a torn tail in the write-ahead log.
    pub paranoid_checks: bool,
    /// Memtable size that triggers a flush to a level-0 table.
    pub write_buffer_size: usize,
    /// Upper bound on table files kept open by the table cache.
    pub max_open_files: usize,
    /// Target uncompressed size of a data block.
    pub block_size: usize,
    /// Number of keys between restart points for key prefix compression.
    pub block_restart_interval: usize,
    pub compression: CompressionType,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            comparator: bytewise(),
            filter_policy: None,
            block_cache: None,
            env: default_env(),
            create_if_missing: false,
            error_if_exists: false,
            paranoid_checks: false,
            write_buffer_size: 4 << 20,
            max_open_files: 1000,
            block_size: 4 << 10,
            block_restart_interval: 16,
            compression: CompressionType::Zstd,
        }
    }
}

impl Options {
    /// Copy with sizes clipped into the ranges the engine supports.
    pub(crate) fn sanitize(&self) -> Options {
        let mut opts = self.clone();
        opts.max_open_files = opts.max_open_files.clamp(64 + 10, 50_000);
        opts.write_buffer_size = opts.write_buffer_size.clamp(64 << 10, 1 << 30);
        opts.block_size = opts.block_size.clamp(1 << 10, 4 << 20);
        opts.block_restart_interval = opts.block_restart_interval.max(1);
        opts
    }
}

impl fmt::Debug for Options {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Options")
            .field("comparator", &self.comparator.name())
            .field(
                "filter_policy",
                &self.filter_policy.as_ref().map(|p| p.name().to_string()),
            )
            .field("block_cache", &self.block_cache)
            .field("create_if_missing", &self.create_if_missing)
            .field("error_if_exists", &self.error_if_exists)
            .field("paranoid_checks", &self.paranoid_checks)
            .field("write_buffer_size", &self.write_buffer_size)
            .field("max_open_files", &self.max_open_files)
            .field("block_size", &self.block_size)
            .field("block_restart_interval", &self.block_restart_interval)
            .field("compression", &self.compression)
            .finish_non_exhaustive()
    }
}

/// Per-read options.
#[derive(Debug, Clone)]
pub struct ReadOptions {
    /// Verify block checksums on every table read.
    pub verify_checksums: bool,
    /// Insert blocks read for this operation into the block cache. Turn off
    /// for bulk scans.
    pub fill_cache: bool,
    /// Read as of this snapshot instead of the latest committed state.
    pub snapshot: Option<Snapshot>,
}

impl Default for ReadOptions {
    fn default() -> Self {
        ReadOptions {
            verify_checksums: false,
            fill_cache: true,
            snapshot: None,
        }
    }
}

/// Per-write options.
#[derive(Debug, Clone, Copy, Default)]
pub struct WriteOptions {
    /// fsync the write-ahead log before the write returns.
    pub sync: bool,
}
