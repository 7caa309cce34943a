//! Persistent description of the database: which table files make up each
//! level, plus the counters needed to resume writing.
//!
//! The whole state is rewritten on every change. It goes to `MANIFEST.tmp`,
//! is fsync'd, and is renamed over `MANIFEST`, so a crash leaves either the
//! old or the new state.
//!
//! ```text
//! ┌──────────┬──────────┬─────────────────────────────────────────────────┐
//! │ CRC (4B) │ Len (4B) │ payload                                         │
//! └──────────┴──────────┴─────────────────────────────────────────────────┘
//! payload := [name_len(4B)][comparator name]
//!            [log_number(8B)][next_file_number(8B)][last_sequence(8B)]
//!            per level: [count(4B)] count × file
//! file    := [id(8B)][file_size(8B)][entry_count(8B)]
//!            [len(4B)][smallest][len(4B)][largest]
//! ```

use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use tracing::debug;

use crate::db::filename::{manifest_file_name, manifest_temp_file_name};
use crate::env::Env;
use crate::error::{Error, Result};
use crate::sstable::SSTableMeta;
use crate::types::SequenceNumber;

pub const NUM_LEVELS: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestState {
    pub comparator: String,
    /// Logs numbered below this are already reflected in table files.
    pub log_number: u64,
    pub next_file_number: u64,
    pub last_sequence: SequenceNumber,
    pub levels: [Vec<SSTableMeta>; NUM_LEVELS],
}

impl ManifestState {
    pub fn new(comparator: &str) -> Self {
        ManifestState {
            comparator: comparator.to_string(),
            log_number: 0,
            next_file_number: 1,
            last_sequence: 0,
            levels: Default::default(),
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut payload = Vec::new();
        put_bytes(&mut payload, self.comparator.as_bytes());
        payload.extend_from_slice(&self.log_number.to_le_bytes());
        payload.extend_from_slice(&self.next_file_number.to_le_bytes());
        payload.extend_from_slice(&self.last_sequence.to_le_bytes());
        for files in &self.levels {
            payload.extend_from_slice(&(files.len() as u32).to_le_bytes());
            for f in files {
                payload.extend_from_slice(&f.id.to_le_bytes());
                payload.extend_from_slice(&f.file_size.to_le_bytes());
                payload.extend_from_slice(&f.entry_count.to_le_bytes());
                put_bytes(&mut payload, &f.smallest);
                put_bytes(&mut payload, &f.largest);
            }
        }

        let mut buf = Vec::with_capacity(8 + payload.len());
        buf.extend_from_slice(&[0u8; 4]);
        buf.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        buf.extend_from_slice(&payload);
        let crc = crc32fast::hash(&buf[4..]);
        buf[0..4].copy_from_slice(&crc.to_le_bytes());
        buf
    }

    pub fn decode(data: &[u8]) -> Result<Self> {
        if data.len() < 8 {
            return Err(Error::Corruption("manifest too short".into()));
        }
        let stored_crc = u32::from_le_bytes(data[0..4].try_into().unwrap());
        let len = u32::from_le_bytes(data[4..8].try_into().unwrap()) as usize;
        if data.len() != 8 + len {
            return Err(Error::Corruption("manifest length mismatch".into()));
        }
        if crc32fast::hash(&data[4..]) != stored_crc {
            return Err(Error::Corruption("manifest checksum mismatch".into()));
        }

        let mut input = &data[8..];
        let comparator = String::from_utf8(get_bytes(&mut input)?.to_vec())
            .map_err(|_| Error::Corruption("manifest comparator name is not UTF-8".into()))?;
        let log_number = get_u64(&mut input)?;
        let next_file_number = get_u64(&mut input)?;
        let last_sequence = get_u64(&mut input)?;

        let mut levels: [Vec<SSTableMeta>; NUM_LEVELS] = Default::default();
        for (level, files) in levels.iter_mut().enumerate() {
            let count = get_u32(&mut input)?;
            for _ in 0..count {
                let id = get_u64(&mut input)?;
                let file_size = get_u64(&mut input)?;
                let entry_count = get_u64(&mut input)?;
                let smallest = get_bytes(&mut input)?.to_vec();
                let largest = get_bytes(&mut input)?.to_vec();
                files.push(SSTableMeta {
                    id,
                    level: level as u32,
                    smallest,
                    largest,
                    file_size,
                    entry_count,
                });
            }
        }
        if !input.is_empty() {
            return Err(Error::Corruption("trailing bytes in manifest".into()));
        }

        Ok(ManifestState {
            comparator,
            log_number,
            next_file_number,
            last_sequence,
            levels,
        })
    }
}

/// Atomically replace the manifest in `dir` with `state`.
pub fn write_manifest(env: &dyn Env, dir: &Path, state: &ManifestState) -> Result<()> {
    let tmp = manifest_temp_file_name(dir);
    {
        let mut file = File::create(&tmp)?;
        file.write_all(&state.encode())?;
        file.sync_all()?;
    }
    env.rename(&tmp, &manifest_file_name(dir))?;
    debug!(
        log_number = state.log_number,
        next_file_number = state.next_file_number,
        last_sequence = state.last_sequence,
        l0 = state.levels[0].len(),
        l1 = state.levels[1].len(),
        "manifest written"
    );
    Ok(())
}

/// Load the manifest in `dir`.
pub fn read_manifest(dir: &Path) -> Result<ManifestState> {
    let data = fs::read(manifest_file_name(dir))?;
    ManifestState::decode(&data)
        .map_err(|e| Error::Corruption(format!("{}: {e}", dir.display())))
}

fn put_bytes(buf: &mut Vec<u8>, data: &[u8]) {
    buf.extend_from_slice(&(data.len() as u32).to_le_bytes());
    buf.extend_from_slice(data);
}

fn take<'a>(input: &mut &'a [u8], n: usize) -> Result<&'a [u8]> {
    if input.len() < n {
        return Err(Error::Corruption("manifest truncated".into()));
    }
    let (head, rest) = input.split_at(n);
    *input = rest;
    Ok(head)
}

fn get_u32(input: &mut &[u8]) -> Result<u32> {
    Ok(u32::from_le_bytes(take(input, 4)?.try_into().unwrap()))
}

fn get_u64(input: &mut &[u8]) -> Result<u64> {
    Ok(u64::from_le_bytes(take(input, 8)?.try_into().unwrap()))
}

fn get_bytes<'a>(input: &mut &'a [u8]) -> Result<&'a [u8]> {
    let len = get_u32(input)? as usize;
    take(input, len)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::default_env;
    use crate::types::{ValueType, encode_internal_key};

    fn sample() -> ManifestState {
        let mut state = ManifestState::new("novelsm.BytewiseComparator");
        state.log_number = 9;
        state.next_file_number = 12;
        state.last_sequence = 4000;
        state.levels[1].push(SSTableMeta {
            id: 10,
            level: 1,
            smallest: encode_internal_key(b"a", 3, ValueType::Put),
            largest: encode_internal_key(b"m", 70, ValueType::Delete),
            file_size: 8192,
            entry_count: 120,
        });
        state
    }

    #[test]
    fn write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let state = sample();
        write_manifest(default_env().as_ref(), dir.path(), &state).unwrap();
        assert_eq!(read_manifest(dir.path()).unwrap(), state);
        assert!(!manifest_temp_file_name(dir.path()).exists());
    }

    #[test]
    fn damaged_manifest_is_corruption() {
        let mut data = sample().encode();
        let n = data.len();
        data[n - 3] ^= 0xff;
        assert!(ManifestState::decode(&data).unwrap_err().is_corruption());
        assert!(ManifestState::decode(&data[..n - 1]).is_err());
    }
}
