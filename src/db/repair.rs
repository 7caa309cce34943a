use std::path::Path;
use std::sync::Arc;

use tracing::{info, warn};

use crate::compaction::build_table;
use crate::db::filename::{
    FileType, LOST_DIR, lock_file_name, log_file_name, manifest_temp_file_name, parse_file_name,
    table_file_name,
};
use crate::db::replay_log;
use crate::error::{Error, Result};
use crate::iterator::StorageIterator;
use crate::manifest::{ManifestState, write_manifest};
use crate::memtable::MemTable;
use crate::options::Options;
use crate::sstable::{BlockReadOptions, SSTable, SSTableMeta};
use crate::types::{InternalKeyComparator, ParsedInternalKey, SequenceNumber};

/// Rebuild the manifest of a damaged database from whatever files survive.
///
/// Every log is converted into a table, then every table is scanned to
/// recover its key range and highest sequence number. Tables that cannot be
/// read, and logs once converted, are moved to the `lost/` subdirectory. The
/// new manifest puts every table on level 0.
///
/// Data in damaged files may be lost; the database is left openable.
pub fn repair_db(options: &Options, name: impl AsRef<Path>) -> Result<()> {
    let name = name.as_ref();
    let options = options.sanitize();
    let env = Arc::clone(&options.env);
    env.create_dir_all(name)?;
    let _lock = env.lock_file(&lock_file_name(name))?;

    let icmp = InternalKeyComparator::new(Arc::clone(&options.comparator));
    let mut logs = Vec::new();
    let mut tables = Vec::new();
    let mut next_file_number = 1;
    for child in env.children(name)? {
        match parse_file_name(&child) {
            Some(FileType::Log(n)) => {
                logs.push(n);
                next_file_number = next_file_number.max(n + 1);
            }
            Some(FileType::Table(n)) => {
                tables.push(n);
                next_file_number = next_file_number.max(n + 1);
            }
            Some(FileType::ManifestTemp) => {
                let _ = env.remove_file(&manifest_temp_file_name(name));
            }
            _ => {}
        }
    }
    logs.sort_unstable();
    info!(db = %name.display(), logs = logs.len(), tables = tables.len(), "repair started");

    let mut max_sequence: SequenceNumber = 0;
    for log in logs {
        let path = log_file_name(name, log);
        match convert_log(name, &options, &icmp, &path, &mut next_file_number, &mut max_sequence) {
            Ok(ids) => tables.extend(ids),
            Err(e) => warn!(log = %path.display(), error = %e, "log conversion failed"),
        }
        archive(&options, name, &path);
    }

    tables.sort_unstable();
    let mut recovered = Vec::new();
    for id in tables {
        let path = table_file_name(name, id);
        match scan_table(&path, id, &options, &icmp) {
            Ok((meta, seq)) => {
                max_sequence = max_sequence.max(seq);
                recovered.push(meta);
            }
            Err(e) => {
                warn!(table = %path.display(), error = %e, "table unreadable");
                archive(&options, name, &path);
            }
        }
    }

    let mut state = ManifestState::new(options.comparator.name());
    state.log_number = 0;
    state.next_file_number = next_file_number;
    state.last_sequence = max_sequence;
    state.levels[0] = recovered;
    write_manifest(env.as_ref(), name, &state)?;
    info!(
        db = %name.display(),
        tables = state.levels[0].len(),
        last_sequence = max_sequence,
        "repair finished"
    );
    Ok(())
}

/// Replay a log into fresh level-0 tables. A damaged tail is skipped.
fn convert_log(
    dir: &Path,
    options: &Options,
    icmp: &InternalKeyComparator,
    path: &Path,
    next_file_number: &mut u64,
    max_sequence: &mut SequenceNumber,
) -> Result<Vec<u64>> {
    let lenient = Options {
        paranoid_checks: false,
        ..options.clone()
    };
    let mut built = Vec::new();
    let mut flush = |mem: &mut MemTable| -> Result<()> {
        let id = *next_file_number;
        *next_file_number += 1;
        if build_table(dir, options, id, mem.iter())?.is_some() {
            built.push(id);
        }
        *mem = MemTable::new(icmp.clone(), options.write_buffer_size);
        Ok(())
    };
    let mut mem = MemTable::new(icmp.clone(), options.write_buffer_size);
    replay_log(path, &lenient, &mut mem, max_sequence, &mut flush)?;
    if !mem.is_empty() {
        flush(&mut mem)?;
    }
    Ok(built)
}

/// Read a whole table, returning its metadata and highest sequence number.
fn scan_table(
    path: &Path,
    id: u64,
    options: &Options,
    icmp: &InternalKeyComparator,
) -> Result<(SSTableMeta, SequenceNumber)> {
    let table = Arc::new(SSTable::open(path, id, options, icmp.clone(), None)?);
    let mut iter = table.iter(BlockReadOptions {
        verify_checksums: true,
        fill_cache: false,
    });

    let mut smallest = None;
    let mut largest = Vec::new();
    let mut entry_count = 0;
    let mut max_sequence = 0;
    iter.seek_to_first()?;
    while iter.is_valid() {
        let key = iter.key();
        max_sequence = max_sequence.max(ParsedInternalKey::parse(key)?.sequence);
        if smallest.is_none() {
            smallest = Some(key.to_vec());
        }
        largest.clear();
        largest.extend_from_slice(key);
        entry_count += 1;
        iter.next()?;
    }
    let Some(smallest) = smallest else {
        return Err(Error::Corruption("table has no entries".into()));
    };

    Ok((
        SSTableMeta {
            id,
            level: 0,
            smallest,
            largest,
            file_size: table.file_size(),
            entry_count,
        },
        max_sequence,
    ))
}

/// Move a file into `lost/` so a later repair does not trip over it again.
fn archive(options: &Options, dir: &Path, path: &Path) {
    let lost = dir.join(LOST_DIR);
    let Some(file_name) = path.file_name() else {
        return;
    };
    let result = options
        .env
        .create_dir_all(&lost)
        .and_then(|()| options.env.rename(path, &lost.join(file_name)));
    match result {
        Ok(()) => info!(file = %path.display(), "moved to lost/"),
        Err(e) => warn!(file = %path.display(), error = %e, "could not archive file"),
    }
}
