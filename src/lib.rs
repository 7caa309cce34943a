//! # novelsm
//!
//! An embedded, ordered key-value store built on a log-structured merge tree,
//! with a typed Rust API and a stable C ABI over the same engine.
//!
//! ## Core idea
//! Instead of updating data in place, buffer writes in memory (after logging
//! them), flush them as sorted table files, and merge those files later.
//! Every write is tagged with a sequence number, which is what makes
//! snapshots and atomic batches cheap.
//!
//! ```no_run
//! use novelsm::{Db, Options, ReadOptions, WriteOptions};
//!
//! let options = Options { create_if_missing: true, ..Options::default() };
//! let db = Db::open(&options, "/tmp/novelsm-demo")?;
//! db.put(&WriteOptions::default(), b"hello", b"world")?;
//! assert_eq!(db.get(&ReadOptions::default(), b"hello")?, Some(b"world".to_vec()));
//! # Ok::<(), novelsm::Error>(())
//! ```

pub mod batch;
pub mod cache;
pub mod capi;
pub mod comparator;
pub mod compaction;
pub mod db;
pub mod env;
pub mod error;
pub mod filter;
pub mod iterator;
pub mod manifest;
pub mod memtable;
pub mod options;
pub mod sstable;
pub mod table_cache;
pub mod types;
pub mod version;
pub mod wal;

// Public re-exports for the top-level API
pub use batch::{BatchHandler, BatchOp, WriteBatch};
pub use cache::Cache;
pub use comparator::{BytewiseComparator, Comparator};
pub use db::{Db, Range, Snapshot, destroy_db, major_version, minor_version, repair_db};
pub use env::{DefaultEnv, Env, default_env};
pub use error::{Error, Result};
pub use filter::{BloomFilterPolicy, FilterPolicy};
pub use iterator::DbIterator;
pub use options::{CompressionType, Options, ReadOptions, WriteOptions};
