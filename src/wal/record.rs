use crate::error::{Error, Result};

/// A single record in the WAL.
///
/// On-disk format:
/// ```text
/// ┌──────────┬──────────┬──────────────────────────────┐
/// │ CRC (4B) │ Len (4B) │ Payload (encoded WriteBatch) │
/// └──────────┴──────────┴──────────────────────────────┘
/// ```
///
/// CRC covers the length field and the payload.
/// If CRC doesn't match on read, the record was a partial write (crash mid-write)
/// or the file was damaged, and replay stops there.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WALRecord {
    pub payload: Vec<u8>,
}

const CRC_SIZE: usize = 4;
const LEN_SIZE: usize = 4;
pub const HEADER_SIZE: usize = CRC_SIZE + LEN_SIZE;

impl WALRecord {
    pub fn new(payload: Vec<u8>) -> Self {
        WALRecord { payload }
    }

    /// Serialize a payload with its header.
    pub fn encode(payload: &[u8]) -> Vec<u8> {
        let mut buf = Vec::with_capacity(HEADER_SIZE + payload.len());
        buf.extend_from_slice(&[0u8; CRC_SIZE]);
        buf.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        buf.extend_from_slice(payload);

        let crc = crc32fast::hash(&buf[CRC_SIZE..]);
        buf[0..CRC_SIZE].copy_from_slice(&crc.to_le_bytes());
        buf
    }

    /// Deserialize the record at the start of `data`. Returns the record and
    /// the number of bytes it occupied.
    pub fn decode(data: &[u8]) -> Result<(Self, usize)> {
        if data.len() < HEADER_SIZE {
            return Err(Error::Corruption("truncated record header".into()));
        }

        let stored_crc = u32::from_le_bytes(data[0..4].try_into().unwrap());
        let payload_len = u32::from_le_bytes(data[4..8].try_into().unwrap()) as usize;

        let total_len = HEADER_SIZE + payload_len;
        if data.len() < total_len {
            return Err(Error::Corruption("truncated record payload".into()));
        }

        let computed_crc = crc32fast::hash(&data[CRC_SIZE..total_len]);
        if stored_crc != computed_crc {
            return Err(Error::Corruption("checksum mismatch".into()));
        }

        Ok((WALRecord::new(data[HEADER_SIZE..total_len].to_vec()), total_len))
    }

    /// Size of this record when serialized on disk.
    pub fn encoded_size(&self) -> usize {
        HEADER_SIZE + self.payload.len()
    }
}
