pub mod db_iter;
pub mod merge;

pub use db_iter::DbIterator;
pub use merge::MergeIterator;

use crate::error::Result;

/// The central iteration abstraction for the storage engine.
///
/// Every sorted data source (skip list, block, SSTable, merged view)
/// implements this trait. This enables composability: MergeIterator
/// takes Vec<Box<dyn StorageIterator>> and merges them.
///
/// Positioning methods leave the iterator invalid when no entry qualifies.
/// `next`/`prev` require a valid iterator.
pub trait StorageIterator: Send {
    /// Returns the current key. Only valid when is_valid() is true.
    fn key(&self) -> &[u8];

    /// Returns the current value. Only valid when is_valid() is true.
    fn value(&self) -> &[u8];

    /// Returns true if the iterator is positioned at a valid entry.
    fn is_valid(&self) -> bool;

    /// Advances to the next entry. Returns error on IO failure.
    fn next(&mut self) -> Result<()>;

    /// Moves to the previous entry.
    fn prev(&mut self) -> Result<()>;

    /// Positions the iterator at the first entry with key >= target.
    fn seek(&mut self, key: &[u8]) -> Result<()>;

    fn seek_to_first(&mut self) -> Result<()>;

    fn seek_to_last(&mut self) -> Result<()>;
}
