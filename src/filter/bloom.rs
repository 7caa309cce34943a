use xxhash_rust::xxh3::xxh3_128;

use crate::error::{Error, Result};
use crate::filter::FilterPolicy;

/// Probabilistic data structure: "is this key in the set?"
///
/// - If any bit is 0 → key is DEFINITELY NOT in the set
/// - If all bits are 1 → key is PROBABLY in the set (false positive possible)
///
/// Sizing:
///   bits_per_key = -1.44 * log2(false_positive_rate)
///   num_hashes = bits_per_key * ln(2)
///
///   1% FPR  → ~10 bits/key, 7 hashes
///   0.1% FPR → ~14 bits/key, 10 hashes
///
/// Hash trick: don't need k independent hash functions.
/// Use double hashing: h_i(key) = h1(key) + i * h2(key) (mod m)
/// where h1, h2 come from splitting a 128-bit hash into two 64-bit halves.
pub struct BloomFilter {
    bits: Vec<u64>,
    num_hashes: u32,
    num_bits: u32,
}

const HEADER_SIZE: usize = 8;
const MAX_HASHES: u32 = 30;

impl BloomFilter {
    /// Create a new bloom filter sized for expected_items at the given FPR.
    ///
    /// # Panics
    /// Panics if expected_items is 0 or FPR is not in (0, 1).
    pub fn new(expected_items: usize, false_positive_rate: f64) -> Self {
        assert!(expected_items > 0, "expected_items must be > 0");
        assert!(
            false_positive_rate > 0.0 && false_positive_rate < 1.0,
            "FPR must be in (0, 1)"
        );
        let bits_per_key = -1.44 * false_positive_rate.log2();
        Self::with_bits(expected_items, bits_per_key)
    }

    /// Create a filter spending `bits_per_key` bits on each expected item.
    pub fn with_bits_per_key(expected_items: usize, bits_per_key: usize) -> Self {
        Self::with_bits(expected_items.max(1), bits_per_key.max(1) as f64)
    }

    fn with_bits(expected_items: usize, bits_per_key: f64) -> Self {
        let num_bits = ((expected_items as f64) * bits_per_key).ceil() as u32;
        let num_bits = num_bits.max(64);

        let num_hashes = (bits_per_key * 2.0f64.ln()).ceil() as u32;
        let num_hashes = num_hashes.clamp(1, MAX_HASHES);

        let num_u64s = (num_bits as usize).div_ceil(64);
        BloomFilter {
            bits: vec![0u64; num_u64s],
            num_hashes,
            num_bits,
        }
    }

    /// Add a key to the bloom filter.
    pub fn insert(&mut self, key: &[u8]) {
        let (h1, h2) = hash_key(key);
        for i in 0..self.num_hashes {
            let pos = get_position(h1, h2, i, self.num_bits);
            let word_index = (pos / 64) as usize;
            self.bits[word_index] |= 1 << (pos % 64);
        }
    }

    /// Check if a key MIGHT be in the set.
    /// false → definitely not here. true → probably here.
    pub fn may_contain(&self, key: &[u8]) -> bool {
        let (h1, h2) = hash_key(key);
        (0..self.num_hashes).all(|i| {
            let pos = get_position(h1, h2, i, self.num_bits);
            (self.bits[(pos / 64) as usize] >> (pos % 64)) & 1 == 1
        })
    }

    /// Serialize: `[num_hashes u32][num_bits u32][bit words u64...]`, little endian.
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(HEADER_SIZE + self.bits.len() * 8);
        buf.extend_from_slice(&self.num_hashes.to_le_bytes());
        buf.extend_from_slice(&self.num_bits.to_le_bytes());
        for word in &self.bits {
            buf.extend_from_slice(&word.to_le_bytes());
        }
        buf
    }

    pub fn deserialize(data: &[u8]) -> Result<Self> {
        let view = EncodedBloom::parse(data)
            .ok_or_else(|| Error::Corruption("malformed bloom filter".into()))?;
        let bits = view
            .words
            .chunks_exact(8)
            .map(|w| u64::from_le_bytes(w.try_into().unwrap()))
            .collect();
        Ok(BloomFilter {
            bits,
            num_hashes: view.num_hashes,
            num_bits: view.num_bits,
        })
    }

    /// Get the number of hash functions used.
    pub fn num_hashes(&self) -> u32 {
        self.num_hashes
    }

    /// Get the total number of bits in the filter.
    pub fn num_bits(&self) -> u32 {
        self.num_bits
    }
}

/// Borrowed view over a serialized filter, probed without copying the bits.
struct EncodedBloom<'a> {
    num_hashes: u32,
    num_bits: u32,
    words: &'a [u8],
}

impl<'a> EncodedBloom<'a> {
    fn parse(data: &'a [u8]) -> Option<Self> {
        if data.len() < HEADER_SIZE {
            return None;
        }
        let num_hashes = u32::from_le_bytes(data[0..4].try_into().unwrap());
        let num_bits = u32::from_le_bytes(data[4..8].try_into().unwrap());
        let words = &data[HEADER_SIZE..];
        if num_bits == 0 || words.len() % 8 != 0 || (words.len() * 8) < num_bits as usize {
            return None;
        }
        Some(EncodedBloom {
            num_hashes,
            num_bits,
            words,
        })
    }

    fn may_contain(&self, key: &[u8]) -> bool {
        let (h1, h2) = hash_key(key);
        (0..self.num_hashes).all(|i| {
            let pos = get_position(h1, h2, i, self.num_bits) as usize;
            (self.words[pos / 8] >> (pos % 8)) & 1 == 1
        })
    }
}

/// Hash a key and return two 64-bit hashes (h1, h2) for double hashing.
fn hash_key(key: &[u8]) -> (u64, u64) {
    let hash128 = xxh3_128(key);
    (hash128 as u64, (hash128 >> 64) as u64)
}

/// h_i = (h1 + i * h2) mod num_bits
fn get_position(h1: u64, h2: u64, i: u32, num_bits: u32) -> u32 {
    let i = i as u64;
    (h1.wrapping_add(i.wrapping_mul(h2)) % (num_bits as u64)) as u32
}

/// The built-in filter policy: one bloom filter per data block.
#[derive(Debug, Clone)]
pub struct BloomFilterPolicy {
    bits_per_key: usize,
}

impl BloomFilterPolicy {
    /// 10 bits per key gives roughly a 1% false positive rate.
    pub fn new(bits_per_key: usize) -> Self {
        BloomFilterPolicy {
            bits_per_key: bits_per_key.max(1),
        }
    }

    pub fn bits_per_key(&self) -> usize {
        self.bits_per_key
    }
}

impl FilterPolicy for BloomFilterPolicy {
    fn name(&self) -> &str {
        "novelsm.BuiltinBloomFilter"
    }

    fn create_filter(&self, keys: &[&[u8]]) -> Vec<u8> {
        let mut filter = BloomFilter::with_bits_per_key(keys.len(), self.bits_per_key);
        for key in keys {
            filter.insert(key);
        }
        filter.serialize()
    }

    fn key_may_match(&self, key: &[u8], filter: &[u8]) -> bool {
        // An unreadable filter must not hide keys.
        match EncodedBloom::parse(filter) {
            Some(view) => view.may_contain(key),
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basics() {
        let mut bf = BloomFilter::new(100, 0.01);
        bf.insert(b"hello");
        assert!(bf.may_contain(b"hello"));
        assert!(!bf.may_contain(b"world"));
    }

    #[test]
    fn encoded_view_agrees_with_filter() {
        let mut bf = BloomFilter::with_bits_per_key(50, 10);
        for i in 0..50u32 {
            bf.insert(format!("key{i}").as_bytes());
        }
        let encoded = bf.serialize();
        let view = EncodedBloom::parse(&encoded).unwrap();
        for i in 0..200u32 {
            let key = format!("key{i}");
            assert_eq!(view.may_contain(key.as_bytes()), bf.may_contain(key.as_bytes()));
        }
    }

    #[test]
    fn garbage_filter_matches_everything() {
        let policy = BloomFilterPolicy::new(10);
        assert!(policy.key_may_match(b"k", b"xyz"));
    }
}
