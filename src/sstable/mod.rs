//! Immutable sorted table files.
//!
//! ```text
//! [data block 0][trailer]...[data block N][trailer]
//! [filter block][trailer]      (only with a filter policy)
//! [index block][trailer]
//! [footer (40B)]
//! ```

pub mod block;
pub mod builder;
pub mod footer;
pub mod iterator;
pub mod reader;

pub use builder::SSTableBuilder;
pub use footer::SSTableMeta;
pub use iterator::SSTableIterator;
pub use reader::{BlockReadOptions, SSTable};

use crate::error::{Error, Result};
use crate::options::CompressionType;
use crate::sstable::footer::BLOCK_TRAILER_SIZE;

/// Compress `contents` if that saves at least 1/8 of its size; otherwise
/// store it raw. Returns the bytes to store and how they were stored.
pub(crate) fn compress_block(
    contents: &[u8],
    compression: CompressionType,
) -> Result<(Vec<u8>, CompressionType)> {
    match compression {
        CompressionType::None => Ok((contents.to_vec(), CompressionType::None)),
        CompressionType::Zstd => {
            let compressed = zstd::bulk::compress(contents, 1)?;
            if compressed.len() < contents.len() - contents.len() / 8 {
                Ok((compressed, CompressionType::Zstd))
            } else {
                Ok((contents.to_vec(), CompressionType::None))
            }
        }
    }
}

fn block_crc(stored: &[u8], kind: u8) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(stored);
    hasher.update(&[kind]);
    hasher.finalize()
}

pub(crate) fn encode_trailer(stored: &[u8], kind: CompressionType) -> [u8; BLOCK_TRAILER_SIZE] {
    let mut trailer = [0u8; BLOCK_TRAILER_SIZE];
    trailer[0] = kind as u8;
    trailer[1..].copy_from_slice(&block_crc(stored, kind as u8).to_le_bytes());
    trailer
}

/// Turn stored bytes plus trailer back into block contents.
pub(crate) fn decode_block_contents(mut raw: Vec<u8>, verify_checksum: bool) -> Result<Vec<u8>> {
    if raw.len() < BLOCK_TRAILER_SIZE {
        return Err(Error::Corruption("block trailer truncated".into()));
    }
    let split = raw.len() - BLOCK_TRAILER_SIZE;
    let kind = raw[split];
    if verify_checksum {
        let stored_crc = u32::from_le_bytes(raw[split + 1..].try_into().unwrap());
        if stored_crc != block_crc(&raw[..split], kind) {
            return Err(Error::Corruption("block checksum mismatch".into()));
        }
    }
    raw.truncate(split);
    match CompressionType::from_u8(kind) {
        Some(CompressionType::None) => Ok(raw),
        Some(CompressionType::Zstd) => zstd::stream::decode_all(raw.as_slice())
            .map_err(|e| Error::Corruption(format!("corrupted compressed block: {e}"))),
        None => Err(Error::Corruption(format!("unknown block compression type {kind}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailer_roundtrip_uncompressed() {
        let contents = b"plain block".to_vec();
        let (stored, kind) = compress_block(&contents, CompressionType::None).unwrap();
        let mut raw = stored.clone();
        raw.extend_from_slice(&encode_trailer(&stored, kind));
        assert_eq!(decode_block_contents(raw, true).unwrap(), contents);
    }

    #[test]
    fn compressible_block_is_compressed() {
        let contents = vec![b'a'; 4096];
        let (stored, kind) = compress_block(&contents, CompressionType::Zstd).unwrap();
        assert_eq!(kind, CompressionType::Zstd);
        assert!(stored.len() < contents.len());
        let mut raw = stored.clone();
        raw.extend_from_slice(&encode_trailer(&stored, kind));
        assert_eq!(decode_block_contents(raw, true).unwrap(), contents);
    }

    #[test]
    fn flipped_bit_fails_checksum() {
        let stored = b"some block bytes".to_vec();
        let mut raw = stored.clone();
        raw.extend_from_slice(&encode_trailer(&stored, CompressionType::None));
        raw[3] ^= 0x01;
        assert!(decode_block_contents(raw.clone(), true).unwrap_err().is_corruption());
        // Without verification the damage goes unnoticed.
        assert!(decode_block_contents(raw, false).is_ok());
    }
}
