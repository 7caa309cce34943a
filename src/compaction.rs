//! Turning sorted entries into table files: memtable flushes and the
//! level-0 → level-1 merge.

use std::cmp::Ordering;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, warn};

use crate::db::filename::table_file_name;
use crate::error::Result;
use crate::iterator::{MergeIterator, StorageIterator};
use crate::options::Options;
use crate::sstable::{BlockReadOptions, SSTableBuilder, SSTableMeta};
use crate::table_cache::TableCache;
use crate::types::{InternalKeyComparator, MAX_SEQUENCE_NUMBER, ParsedInternalKey, SequenceNumber, ValueType};

/// Compaction output is cut into files of about this size, always between
/// two different user keys.
pub const MAX_OUTPUT_FILE_SIZE: u64 = 2 * 1024 * 1024;

/// Level-0 file count that triggers an automatic compaction.
pub const L0_COMPACTION_TRIGGER: usize = 4;

/// Work done producing files for one level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompactionStats {
    pub micros: u64,
    pub bytes_read: u64,
    pub bytes_written: u64,
}

impl CompactionStats {
    pub fn add(&mut self, other: &CompactionStats) {
        self.micros += other.micros;
        self.bytes_read += other.bytes_read;
        self.bytes_written += other.bytes_written;
    }
}

/// Write sorted `(internal key, value)` entries into table `id` on level 0.
/// Returns `None`, leaving no file behind, when there are no entries.
pub fn build_table<'a>(
    dir: &Path,
    options: &Options,
    id: u64,
    entries: impl Iterator<Item = (&'a [u8], &'a [u8])>,
) -> Result<Option<SSTableMeta>> {
    let path = table_file_name(dir, id);
    let result = (|| -> Result<Option<SSTableMeta>> {
        let mut builder = SSTableBuilder::new(&path, id, options)?;
        for (key, value) in entries {
            builder.add(key, value)?;
        }
        if builder.entry_count() == 0 {
            return Ok(None);
        }
        builder.finish().map(Some)
    })();

    match result {
        Ok(Some(meta)) => {
            debug!(id, bytes = meta.file_size, entries = meta.entry_count, "table built");
            Ok(Some(meta))
        }
        other => {
            // Empty or failed: the partial file is garbage.
            let _ = std::fs::remove_file(&path);
            other
        }
    }
}

/// Merge `inputs` into new level-1 files.
///
/// An entry is dropped when a newer entry for the same user key is already
/// visible to the oldest live snapshot, or when it is a tombstone that the
/// oldest snapshot can see (level 1 is the bottom, nothing older remains for
/// it to hide).
pub fn compact_files(
    dir: &Path,
    options: &Options,
    tables: &Arc<TableCache>,
    icmp: &InternalKeyComparator,
    inputs: &[SSTableMeta],
    smallest_snapshot: SequenceNumber,
    mut new_file_number: impl FnMut() -> u64,
) -> Result<(Vec<SSTableMeta>, CompactionStats)> {
    let start = Instant::now();
    let read_opts = BlockReadOptions {
        verify_checksums: options.paranoid_checks,
        fill_cache: false,
    };
    let mut children: Vec<Box<dyn StorageIterator>> = Vec::with_capacity(inputs.len());
    for file in inputs {
        children.push(Box::new(tables.iter(file.id, read_opts)?));
    }
    let mut iter = MergeIterator::new(children, icmp.clone());

    let mut outputs: Vec<SSTableMeta> = Vec::new();
    let result = merge_into(
        dir,
        options,
        icmp,
        &mut iter,
        smallest_snapshot,
        &mut new_file_number,
        &mut outputs,
    );
    if let Err(e) = result {
        warn!(error = %e, "compaction failed, removing partial output");
        for file in &outputs {
            let _ = std::fs::remove_file(table_file_name(dir, file.id));
        }
        return Err(e);
    }

    let stats = CompactionStats {
        micros: start.elapsed().as_micros() as u64,
        bytes_read: inputs.iter().map(|f| f.file_size).sum(),
        bytes_written: outputs.iter().map(|f| f.file_size).sum(),
    };
    Ok((outputs, stats))
}

fn merge_into(
    dir: &Path,
    options: &Options,
    icmp: &InternalKeyComparator,
    iter: &mut MergeIterator,
    smallest_snapshot: SequenceNumber,
    new_file_number: &mut impl FnMut() -> u64,
    outputs: &mut Vec<SSTableMeta>,
) -> Result<()> {
    let mut builder: Option<SSTableBuilder> = None;
    let mut current_user_key: Option<Vec<u8>> = None;
    let mut last_sequence_for_key = MAX_SEQUENCE_NUMBER;

    iter.seek_to_first()?;
    while iter.is_valid() {
        let parsed = ParsedInternalKey::parse(iter.key())?;

        let first_of_key = current_user_key
            .as_deref()
            .is_none_or(|k| icmp.compare_user(parsed.user_key, k) != Ordering::Equal);
        if first_of_key {
            current_user_key = Some(parsed.user_key.to_vec());
            last_sequence_for_key = MAX_SEQUENCE_NUMBER;
        }

        let drop = if last_sequence_for_key <= smallest_snapshot {
            true
        } else {
            parsed.value_type == ValueType::Delete && parsed.sequence <= smallest_snapshot
        };
        last_sequence_for_key = parsed.sequence;

        if !drop {
            if first_of_key && builder.as_ref().is_some_and(|b| b.file_size() >= MAX_OUTPUT_FILE_SIZE) {
                if let Some(done) = builder.take() {
                    outputs.push(finish_output(done)?);
                }
            }
            if builder.is_none() {
                let id = new_file_number();
                builder = Some(SSTableBuilder::new(&table_file_name(dir, id), id, options)?);
            }
            if let Some(b) = builder.as_mut() {
                b.add(iter.key(), iter.value())?;
            }
        }
        iter.next()?;
    }

    if let Some(done) = builder.take() {
        if done.entry_count() > 0 {
            outputs.push(finish_output(done)?);
        }
    }
    Ok(())
}

fn finish_output(builder: SSTableBuilder) -> Result<SSTableMeta> {
    let mut meta = builder.finish()?;
    meta.level = 1;
    Ok(meta)
}
