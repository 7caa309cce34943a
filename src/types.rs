use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use crate::comparator::Comparator;
use crate::error::{Error, Result};

/// Raw key bytes.
pub type Key = Vec<u8>;

/// Raw value bytes.
pub type Value = Vec<u8>;

/// Monotonically increasing write counter. Only the low 56 bits are usable;
/// the tag packs the value type into the low byte.
pub type SequenceNumber = u64;

pub const MAX_SEQUENCE_NUMBER: SequenceNumber = (1 << 56) - 1;

/// Distinguishes puts from deletes in the storage engine.
/// A Delete writes a tombstone: the key isn't removed, it's marked as deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    /// A normal put operation.
    Put = 0x01,
    /// A delete (tombstone marker).
    Delete = 0x02,
}

/// Seeking to `(user_key, seq, VALUE_TYPE_FOR_SEEK)` lands on the newest
/// entry for `user_key` whose sequence is <= `seq`: tags sort descending and
/// this is the largest type.
pub const VALUE_TYPE_FOR_SEEK: ValueType = ValueType::Delete;

impl ValueType {
    pub fn from_u8(byte: u8) -> Result<Self> {
        match byte {
            0x01 => Ok(ValueType::Put),
            0x02 => Ok(ValueType::Delete),
            _ => Err(Error::Corruption(format!("invalid value type: {byte}"))),
        }
    }
}

/// Internal key format: user key + sequence number + value type.
///
/// Encoded as `user_key ‖ u64_le(sequence << 8 | value_type)`.
///
/// Ordering: (user_key ASC, sequence DESC).
/// This ensures the newest version of a key always comes first during merging.
#[derive(Clone, PartialEq, Eq)]
pub struct InternalKey {
    pub user_key: Key,
    pub sequence: SequenceNumber,
    pub value_type: ValueType,
}

impl InternalKey {
    pub fn new(user_key: &[u8], sequence: SequenceNumber, value_type: ValueType) -> Self {
        InternalKey {
            user_key: user_key.to_vec(),
            sequence,
            value_type,
        }
    }

    /// Key that sorts before every entry of `user_key` visible at `sequence`.
    pub fn for_seek(user_key: &[u8], sequence: SequenceNumber) -> Self {
        Self::new(user_key, sequence, VALUE_TYPE_FOR_SEEK)
    }

    pub fn encode(&self) -> Vec<u8> {
        encode_internal_key(&self.user_key, self.sequence, self.value_type)
    }

    pub fn decode(data: &[u8]) -> Result<Self> {
        let parsed = ParsedInternalKey::parse(data)?;
        Ok(InternalKey::new(parsed.user_key, parsed.sequence, parsed.value_type))
    }
}

impl fmt::Debug for InternalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "'{}' @ {} : {:?}",
            String::from_utf8_lossy(&self.user_key),
            self.sequence,
            self.value_type
        )
    }
}

/// Borrowed view of an encoded internal key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedInternalKey<'a> {
    pub user_key: &'a [u8],
    pub sequence: SequenceNumber,
    pub value_type: ValueType,
}

impl<'a> ParsedInternalKey<'a> {
    pub fn parse(data: &'a [u8]) -> Result<Self> {
        if data.len() < 8 {
            return Err(Error::Corruption("internal key too short".into()));
        }
        let split = data.len() - 8;
        let tag = u64::from_le_bytes(data[split..].try_into().unwrap());
        Ok(ParsedInternalKey {
            user_key: &data[..split],
            sequence: tag >> 8,
            value_type: ValueType::from_u8((tag & 0xff) as u8)?,
        })
    }
}

pub fn encode_internal_key(user_key: &[u8], sequence: SequenceNumber, value_type: ValueType) -> Vec<u8> {
    debug_assert!(sequence <= MAX_SEQUENCE_NUMBER);
    let mut buf = Vec::with_capacity(user_key.len() + 8);
    buf.extend_from_slice(user_key);
    buf.extend_from_slice(&((sequence << 8) | value_type as u64).to_le_bytes());
    buf
}

/// User-key part of an encoded internal key.
pub fn extract_user_key(internal_key: &[u8]) -> &[u8] {
    debug_assert!(internal_key.len() >= 8);
    &internal_key[..internal_key.len().saturating_sub(8)]
}

fn extract_tag(internal_key: &[u8]) -> u64 {
    if internal_key.len() < 8 {
        return 0;
    }
    let split = internal_key.len() - 8;
    u64::from_le_bytes(internal_key[split..].try_into().unwrap())
}

/// Orders encoded internal keys: user key by the user comparator, then the
/// tag descending.
#[derive(Clone)]
pub struct InternalKeyComparator {
    user: Arc<dyn Comparator>,
}

impl InternalKeyComparator {
    pub fn new(user: Arc<dyn Comparator>) -> Self {
        InternalKeyComparator { user }
    }

    pub fn user_comparator(&self) -> &Arc<dyn Comparator> {
        &self.user
    }

    pub fn compare(&self, a: &[u8], b: &[u8]) -> Ordering {
        match self.user.compare(extract_user_key(a), extract_user_key(b)) {
            Ordering::Equal => extract_tag(b).cmp(&extract_tag(a)),
            ord => ord,
        }
    }

    pub fn compare_user(&self, a: &[u8], b: &[u8]) -> Ordering {
        self.user.compare(a, b)
    }
}

/// Outcome of a point lookup in one layer of the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupResult {
    /// Newest visible entry is a Put.
    Found(Value),
    /// Newest visible entry is a tombstone; older layers must not be consulted.
    Deleted,
}
