use crate::error::{Error, Result};

/// Magic number to identify SSTable files.
pub const SSTABLE_MAGIC: u64 = 0x4E4F_564C_534D_5354; // "NOVLSMST"

/// Every block on disk is followed by a trailer:
/// `[compression type (1B)][crc32 of contents + type (4B)]`.
pub const BLOCK_TRAILER_SIZE: usize = 5;

/// Metadata about an SSTable file, stored in the manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SSTableMeta {
    /// File number; the file is `<id>.sst`.
    pub id: u64,
    /// Level this SSTable belongs to (0 = freshly flushed).
    pub level: u32,
    /// Smallest internal key in the SSTable.
    pub smallest: Vec<u8>,
    /// Largest internal key in the SSTable.
    pub largest: Vec<u8>,
    /// File size in bytes.
    pub file_size: u64,
    /// Number of entries (including tombstones).
    pub entry_count: u64,
}

/// Location of a block in the file, trailer excluded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BlockHandle {
    pub offset: u64,
    pub size: u64,
}

impl BlockHandle {
    pub const SIZE: usize = 16;

    pub fn new(offset: u64, size: u64) -> Self {
        BlockHandle { offset, size }
    }

    /// Format: [offset(8B)][size(8B)]
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(Self::SIZE);
        buf.extend_from_slice(&self.offset.to_le_bytes());
        buf.extend_from_slice(&self.size.to_le_bytes());
        buf
    }

    pub fn decode(data: &[u8]) -> Result<Self> {
        if data.len() < Self::SIZE {
            return Err(Error::Corruption("block handle too short".into()));
        }
        Ok(BlockHandle {
            offset: u64::from_le_bytes(data[0..8].try_into().unwrap()),
            size: u64::from_le_bytes(data[8..16].try_into().unwrap()),
        })
    }

    /// Whether this handle points at no block (used for a missing filter).
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }
}

/// The footer sits at the end of the SSTable file.
/// It tells the reader where to find the index block and the filter block.
///
/// ```text
/// ┌──────────────────────────────────────┐
/// │ Index block offset (8B)              │
/// │ Index block size (8B)                │
/// │ Filter block offset (8B)             │
/// │ Filter block size (8B)               │
/// │ Magic number (8B)                    │
/// └──────────────────────────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Footer {
    pub index_handle: BlockHandle,
    pub filter_handle: BlockHandle,
    pub magic: u64,
}

impl Footer {
    /// Size of the footer in bytes (fixed).
    pub const SIZE: usize = 8 * 5; // 40 bytes

    pub fn new(index_handle: BlockHandle, filter_handle: BlockHandle) -> Self {
        Footer {
            index_handle,
            filter_handle,
            magic: SSTABLE_MAGIC,
        }
    }

    /// Encode footer to bytes.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(Self::SIZE);
        buf.extend_from_slice(&self.index_handle.encode());
        buf.extend_from_slice(&self.filter_handle.encode());
        buf.extend_from_slice(&self.magic.to_le_bytes());
        buf
    }

    /// Decode footer from bytes.
    pub fn decode(data: &[u8]) -> Result<Self> {
        if data.len() < Self::SIZE {
            return Err(Error::Corruption("footer too short".into()));
        }
        let magic = u64::from_le_bytes(data[32..40].try_into().unwrap());
        if magic != SSTABLE_MAGIC {
            return Err(Error::Corruption(format!(
                "bad magic: expected {:#x}, got {:#x}",
                SSTABLE_MAGIC, magic
            )));
        }

        Ok(Footer {
            index_handle: BlockHandle::decode(&data[0..16])?,
            filter_handle: BlockHandle::decode(&data[16..32])?,
            magic,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn footer_roundtrip() {
        let footer = Footer::new(BlockHandle::new(4096, 512), BlockHandle::new(3000, 96));
        let encoded = footer.encode();
        assert_eq!(encoded.len(), Footer::SIZE);
        let decoded = Footer::decode(&encoded).unwrap();
        assert_eq!(decoded, footer);
    }

    #[test]
    fn footer_bad_magic() {
        let mut encoded = Footer::new(BlockHandle::default(), BlockHandle::default()).encode();
        // Corrupt the magic
        encoded[32] = 0xFF;
        assert!(Footer::decode(&encoded).unwrap_err().is_corruption());
    }

    #[test]
    fn footer_too_short() {
        assert!(Footer::decode(&[0u8; 10]).is_err());
    }

    #[test]
    fn block_handle_roundtrip() {
        let handle = BlockHandle::new(17, 4096);
        assert_eq!(BlockHandle::decode(&handle.encode()).unwrap(), handle);
        assert!(BlockHandle::decode(&[1, 2, 3]).is_err());
    }
}
