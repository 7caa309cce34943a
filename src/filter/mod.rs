//! Per-block filters that let point lookups skip table blocks.

pub mod block;
pub mod bloom;

pub use bloom::{BloomFilter, BloomFilterPolicy};

/// Builds a compact summary of a set of keys and answers "might this key be
/// in the set?" against it.
///
/// `key_may_match` returning `false` is a promise: the engine skips the block
/// and reports the key as absent without reading it. A policy that ever
/// answers `false` for a key that was passed to `create_filter` makes reads
/// silently miss data. Answering `true` for absent keys is always allowed and
/// only costs an extra block read.
///
/// The name is stored in every table. Tables whose filter was built by a
/// policy of a different name are read without their filter.
pub trait FilterPolicy: Send + Sync {
    fn name(&self) -> &str;

    /// Encode a filter for `keys`. Keys may repeat.
    fn create_filter(&self, keys: &[&[u8]]) -> Vec<u8>;

    /// Membership test against a filter produced by `create_filter`.
    fn key_may_match(&self, key: &[u8], filter: &[u8]) -> bool;
}
