//! Block cache.
//!
//! `Cache` is a cheap-to-clone handle: several databases may share one and it
//! stays usable after any of them closes.

use std::fmt;
use std::hash::Hash;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use lru::LruCache;
use parking_lot::Mutex;

use crate::sstable::block::Block;

/// LRU map bounded by the total charge of its entries rather than by count.
pub(crate) struct ChargedLru<K: Hash + Eq, V> {
    map: LruCache<K, (V, usize)>,
    capacity: usize,
    usage: usize,
}

impl<K: Hash + Eq, V: Clone> ChargedLru<K, V> {
    pub fn new(capacity: usize) -> Self {
        ChargedLru {
            map: LruCache::unbounded(),
            capacity,
            usage: 0,
        }
    }

    pub fn get(&mut self, key: &K) -> Option<V> {
        self.map.get(key).map(|(v, _)| v.clone())
    }

    /// Insert, then evict least recently used entries until the charge fits.
    /// An entry larger than the whole capacity is not kept.
    pub fn insert(&mut self, key: K, value: V, charge: usize) {
        if let Some((_, old)) = self.map.put(key, (value, charge)) {
            self.usage -= old;
        }
        self.usage += charge;
        while self.usage > self.capacity {
            match self.map.pop_lru() {
                Some((_, (_, c))) => self.usage -= c,
                None => break,
            }
        }
    }

    pub fn remove(&mut self, key: &K) -> Option<V> {
        self.map.pop(key).map(|(v, c)| {
            self.usage -= c;
            v
        })
    }

    pub fn usage(&self) -> usize {
        self.usage
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }
}

type BlockKey = (u64, u64);

/// Shared LRU cache of decoded data blocks, charged by block size.
#[derive(Clone)]
pub struct Cache {
    inner: Arc<CacheInner>,
}

struct CacheInner {
    blocks: Mutex<ChargedLru<BlockKey, Arc<Block>>>,
    capacity: usize,
    next_id: AtomicU64,
}

impl Cache {
    /// LRU cache holding up to `capacity` bytes of decoded blocks.
    pub fn new_lru(capacity: usize) -> Self {
        Cache {
            inner: Arc::new(CacheInner {
                blocks: Mutex::new(ChargedLru::new(capacity)),
                capacity,
                next_id: AtomicU64::new(1),
            }),
        }
    }

    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    /// Bytes currently charged to the cache.
    pub fn total_charge(&self) -> usize {
        self.inner.blocks.lock().usage()
    }

    /// Distinct key space for one table file, so that tables of different
    /// databases sharing the cache never collide.
    pub(crate) fn new_id(&self) -> u64 {
        self.inner.next_id.fetch_add(1, Ordering::Relaxed)
    }

    pub(crate) fn lookup(&self, cache_id: u64, offset: u64) -> Option<Arc<Block>> {
        self.inner.blocks.lock().get(&(cache_id, offset))
    }

    pub(crate) fn insert(&self, cache_id: u64, offset: u64, block: Arc<Block>) {
        let charge = block.size();
        self.inner
            .blocks
            .lock()
            .insert((cache_id, offset), block, charge);
    }
}

impl fmt::Debug for Cache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cache")
            .field("capacity", &self.inner.capacity)
            .field("usage", &self.total_charge())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evicts_least_recently_used_by_charge() {
        let mut lru: ChargedLru<u32, &str> = ChargedLru::new(10);
        lru.insert(1, "a", 4);
        lru.insert(2, "b", 4);
        assert_eq!(lru.get(&1), Some("a"));
        lru.insert(3, "c", 4);

        // 2 was the least recently used once 1 was touched.
        assert_eq!(lru.get(&2), None);
        assert_eq!(lru.get(&1), Some("a"));
        assert_eq!(lru.get(&3), Some("c"));
        assert_eq!(lru.usage(), 8);
    }

    #[test]
    fn replacing_a_key_recharges() {
        let mut lru: ChargedLru<u32, u32> = ChargedLru::new(100);
        lru.insert(1, 1, 30);
        lru.insert(1, 2, 10);
        assert_eq!(lru.usage(), 10);
        assert_eq!(lru.len(), 1);
        assert_eq!(lru.remove(&1), Some(2));
        assert_eq!(lru.usage(), 0);
    }

    #[test]
    fn oversized_entry_is_dropped() {
        let mut lru: ChargedLru<u32, u32> = ChargedLru::new(5);
        lru.insert(1, 1, 6);
        assert_eq!(lru.get(&1), None);
        assert_eq!(lru.usage(), 0);
    }

    #[test]
    fn ids_are_distinct() {
        let cache = Cache::new_lru(1024);
        assert_ne!(cache.new_id(), cache.new_id());
    }
}
