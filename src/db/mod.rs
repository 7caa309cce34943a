//! The database handle.
//!
//! Write path: a batch takes the writer lock, gets consecutive sequence
//! numbers, is appended to the write-ahead log as one record, is inserted
//! into the memtable, and only then becomes visible by advancing
//! `last_sequence`. A full memtable is written out as a level-0 table
//! before the next write; four level-0 tables trigger a merge into level 1.
//!
//! Read path: a read picks its sequence number first, then grabs the current
//! memtable and version. Anything at or below that sequence is reachable
//! through those two, whatever flushes or compactions happen meanwhile.

pub(crate) mod filename;
mod repair;
mod snapshot;

use std::collections::HashSet;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Instant;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::batch::WriteBatch;
use crate::cache::Cache;
use crate::compaction::{CompactionStats, L0_COMPACTION_TRIGGER, build_table, compact_files};
use crate::env::FileLock;
use crate::error::{Error, Result};
use crate::iterator::db_iter::IterPins;
use crate::iterator::{DbIterator, MergeIterator, StorageIterator};
use crate::manifest::{ManifestState, NUM_LEVELS, read_manifest, write_manifest};
use crate::memtable::{MemTable, MemTableIterator, SharedMemTable};
use crate::options::{Options, ReadOptions, WriteOptions};
use crate::sstable::BlockReadOptions;
use crate::table_cache::TableCache;
use crate::types::{
    InternalKey, InternalKeyComparator, LookupResult, MAX_SEQUENCE_NUMBER, SequenceNumber,
    extract_user_key,
};
use crate::version::Version;
use crate::wal::{WALReader, WALWriter};
use filename::{FileType, lock_file_name, log_file_name, manifest_file_name, parse_file_name};

pub use repair::repair_db;
pub use snapshot::Snapshot;
pub(crate) use snapshot::SnapshotList;

pub const MAJOR_VERSION: i32 = 1;
pub const MINOR_VERSION: i32 = 20;

/// Block cache size for databases opened without a shared cache.
const DEFAULT_BLOCK_CACHE_SIZE: usize = 8 << 20;

/// Prefix shared by every recognized property name.
const PROPERTY_PREFIX: &str = "novelsm.";

pub fn major_version() -> i32 {
    MAJOR_VERSION
}

pub fn minor_version() -> i32 {
    MINOR_VERSION
}

/// Half-open user-key range `[start, limit)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Range<'a> {
    pub start: &'a [u8],
    pub limit: &'a [u8],
}

impl<'a> Range<'a> {
    pub fn new(start: &'a [u8], limit: &'a [u8]) -> Self {
        Range { start, limit }
    }
}

/// What a reader needs to see the committed state.
#[derive(Clone)]
struct ReadView {
    mem: SharedMemTable,
    version: Arc<Version>,
}

struct WriterState {
    log: WALWriter,
    log_number: u64,
    next_file_number: u64,
    /// First failed log write. The log may hold a torn record after it, so
    /// every later write is refused.
    failed: Option<Error>,
    /// Versions that were current once. While a reader still holds one, its
    /// files must stay on disk.
    old_versions: Vec<Weak<Version>>,
}

impl WriterState {
    fn new_file_number(&mut self) -> u64 {
        let n = self.next_file_number;
        self.next_file_number += 1;
        n
    }

    fn check_healthy(&self) -> Result<()> {
        match &self.failed {
            Some(e) => Err(e.clone()),
            None => Ok(()),
        }
    }
}

/// An open database.
///
/// Reads (`get`, iterators, snapshots, properties, size estimates) may run
/// from any number of threads at once. Writes are serialized internally and
/// applied in one total order.
///
/// Dropping the handle closes the database. Iterators and snapshots that
/// outlive it stay memory-safe but report `InvalidArgument("database is
/// closed")` from then on.
pub struct Db {
    name: PathBuf,
    options: Options,
    icmp: InternalKeyComparator,
    tables: Arc<TableCache>,
    writer: Mutex<WriterState>,
    view: RwLock<ReadView>,
    last_sequence: AtomicU64,
    snapshots: Arc<SnapshotList>,
    stats: Mutex<[CompactionStats; NUM_LEVELS]>,
    closed: Arc<AtomicBool>,
    lock: Mutex<Option<FileLock>>,
}

impl Db {
    /// Open the database at `name`.
    ///
    /// Fails with `InvalidArgument` if it is missing and
    /// `create_if_missing` is unset, if it exists and `error_if_exists` is
    /// set, or if it was created with a comparator of a different name.
    /// Fails with an I/O error if another handle in this process has it open.
    pub fn open(options: &Options, name: impl AsRef<Path>) -> Result<Db> {
        let name = name.as_ref().to_path_buf();
        let options = options.sanitize();
        let env = Arc::clone(&options.env);

        if !env.file_exists(&name) && !options.create_if_missing {
            return Err(Error::InvalidArgument(format!(
                "{}: does not exist (create_if_missing is false)",
                name.display()
            )));
        }
        env.create_dir_all(&name)?;
        let lock = env.lock_file(&lock_file_name(&name))?;

        let icmp = InternalKeyComparator::new(Arc::clone(&options.comparator));
        let mut state = if env.file_exists(&manifest_file_name(&name)) {
            if options.error_if_exists {
                return Err(Error::InvalidArgument(format!(
                    "{}: exists (error_if_exists is true)",
                    name.display()
                )));
            }
            let state = read_manifest(&name)?;
            if state.comparator != options.comparator.name() {
                return Err(Error::InvalidArgument(format!(
                    "{} does not match existing comparator {}",
                    options.comparator.name(),
                    state.comparator
                )));
            }
            state
        } else {
            if !options.create_if_missing {
                return Err(Error::InvalidArgument(format!(
                    "{}: does not exist (create_if_missing is false)",
                    name.display()
                )));
            }
            info!(db = %name.display(), "creating database");
            ManifestState::new(options.comparator.name())
        };

        let block_cache = options
            .block_cache
            .clone()
            .unwrap_or_else(|| Cache::new_lru(DEFAULT_BLOCK_CACHE_SIZE));
        let tables = Arc::new(TableCache::new(&name, &options, icmp.clone(), block_cache));

        // Which logs still need replaying, and are all tables present?
        let mut logs = Vec::new();
        let mut present = HashSet::new();
        let mut max_number = 0;
        for child in env.children(&name)? {
            match parse_file_name(&child) {
                Some(FileType::Log(n)) => {
                    max_number = max_number.max(n);
                    if n >= state.log_number {
                        logs.push(n);
                    }
                }
                Some(FileType::Table(n)) => {
                    max_number = max_number.max(n);
                    present.insert(n);
                }
                _ => {}
            }
        }
        let missing: Vec<u64> = state
            .levels
            .iter()
            .flatten()
            .map(|f| f.id)
            .filter(|id| !present.contains(id))
            .collect();
        if let Some(first) = missing.first() {
            return Err(Error::Corruption(format!(
                "{} missing files; e.g.: {}",
                missing.len(),
                filename::table_file_name(&name, *first).display()
            )));
        }
        logs.sort_unstable();
        state.next_file_number = state.next_file_number.max(max_number + 1);

        let mut version = Version::new(state.levels.clone());
        let mut stats: [CompactionStats; NUM_LEVELS] = Default::default();
        let mut mem = MemTable::new(icmp.clone(), options.write_buffer_size);
        for &log in &logs {
            let path = log_file_name(&name, log);
            info!(log = %path.display(), "recovering log");
            let mut flush = |mem: &mut MemTable| -> Result<()> {
                let id = state.next_file_number;
                state.next_file_number += 1;
                let start = Instant::now();
                if let Some(meta) = build_table(&name, &options, id, mem.iter())? {
                    stats[0].add(&CompactionStats {
                        micros: start.elapsed().as_micros() as u64,
                        bytes_read: 0,
                        bytes_written: meta.file_size,
                    });
                    version = version.apply(&icmp, &[], vec![meta]);
                }
                *mem = MemTable::new(icmp.clone(), options.write_buffer_size);
                Ok(())
            };
            replay_log(&path, &options, &mut mem, &mut state.last_sequence, &mut flush)?;
            if !mem.is_empty() {
                flush(&mut mem)?;
            }
        }

        let log_number = state.next_file_number;
        state.next_file_number += 1;
        let log = WALWriter::new(&log_file_name(&name, log_number))?;
        state.log_number = log_number;
        state.levels = version.levels().clone();
        write_manifest(env.as_ref(), &name, &state)?;

        let db = Db {
            name,
            icmp: icmp.clone(),
            tables,
            writer: Mutex::new(WriterState {
                log,
                log_number,
                next_file_number: state.next_file_number,
                failed: None,
                old_versions: Vec::new(),
            }),
            view: RwLock::new(ReadView {
                mem: MemTable::shared(icmp, options.write_buffer_size),
                version: Arc::new(version),
            }),
            last_sequence: AtomicU64::new(state.last_sequence),
            snapshots: SnapshotList::new(),
            stats: Mutex::new(stats),
            closed: Arc::new(AtomicBool::new(false)),
            lock: Mutex::new(Some(lock)),
            options,
        };
        {
            let mut w = db.writer.lock();
            db.delete_obsolete_files(&mut w);
        }
        info!(
            db = %db.name.display(),
            last_sequence = state.last_sequence,
            l0 = state.levels[0].len(),
            l1 = state.levels[1].len(),
            "database opened"
        );
        Ok(db)
    }

    /// Directory of this database.
    pub fn name(&self) -> &Path {
        &self.name
    }

    /// Set `key` to `value`.
    pub fn put(&self, opts: &WriteOptions, key: &[u8], value: &[u8]) -> Result<()> {
        let mut batch = WriteBatch::new();
        batch.put(key, value);
        self.write(opts, &batch)
    }

    /// Remove `key`. Removing an absent key is not an error.
    pub fn delete(&self, opts: &WriteOptions, key: &[u8]) -> Result<()> {
        let mut batch = WriteBatch::new();
        batch.delete(key);
        self.write(opts, &batch)
    }

    /// Apply every record of `batch` atomically. With `opts.sync` the batch
    /// is on disk when this returns.
    pub fn write(&self, opts: &WriteOptions, batch: &WriteBatch) -> Result<()> {
        let mut w = self.writer.lock();
        w.check_healthy()?;
        self.make_room_for_write(&mut w)?;

        let first = self.last_sequence.load(Ordering::Acquire) + 1;
        let count = u64::from(batch.count());
        if first + count > MAX_SEQUENCE_NUMBER {
            return Err(Error::InvalidArgument("sequence numbers exhausted".into()));
        }
        let mut batch = batch.clone();
        batch.set_sequence(first);

        if let Err(e) = w.log.append(batch.contents(), opts.sync) {
            warn!(error = %e, "log write failed, refusing further writes");
            w.failed = Some(e.clone());
            return Err(e);
        }

        let mem = Arc::clone(&self.view.read().mem);
        batch.insert_into(&mut mem.write())?;
        self.last_sequence.store(first + count - 1, Ordering::Release);
        Ok(())
    }

    /// Value of `key`, or `None` if it is absent or deleted.
    pub fn get(&self, opts: &ReadOptions, key: &[u8]) -> Result<Option<Vec<u8>>> {
        // View before sequence: every entry visible at the sequence is then
        // reachable through the view.
        let view = self.view.read().clone();
        let sequence = self.read_sequence(opts)?;

        let in_mem = view.mem.read().get(key, sequence);
        let found = match in_mem {
            Some(found) => Some(found),
            None => view
                .version
                .get(&self.tables, &self.icmp, key, sequence, block_read_options(opts))?,
        };
        Ok(match found {
            Some(LookupResult::Found(value)) => Some(value),
            Some(LookupResult::Deleted) | None => None,
        })
    }

    /// A new iterator over the database as of `opts.snapshot` (or now).
    /// It starts Invalid; table errors met while building it show up in its
    /// `status`.
    pub fn new_iterator(&self, opts: &ReadOptions) -> DbIterator {
        let ucmp = Arc::clone(self.icmp.user_comparator());
        let view = self.view.read().clone();
        let pins = IterPins {
            closed: Arc::clone(&self.closed),
            snapshot: opts.snapshot.clone(),
            version: Arc::clone(&view.version),
        };
        let sequence = match self.read_sequence(opts) {
            Ok(s) => s,
            Err(e) => return DbIterator::failed(e, ucmp, pins),
        };

        let mut children: Vec<Box<dyn StorageIterator>> =
            vec![Box::new(MemTableIterator::new(Arc::clone(&view.mem)))];
        if let Err(e) =
            view.version
                .add_iterators(&self.tables, &self.icmp, block_read_options(opts), &mut children)
        {
            return DbIterator::failed(e, ucmp, pins);
        }
        DbIterator::new(MergeIterator::new(children, self.icmp.clone()), ucmp, sequence, pins)
    }

    /// Pin the current state for later reads.
    pub fn snapshot(&self) -> Snapshot {
        self.snapshots.acquire_current(&self.last_sequence)
    }

    /// Release a snapshot. Other clones of it stay valid.
    pub fn release_snapshot(&self, snapshot: Snapshot) {
        drop(snapshot);
    }

    /// Diagnostic text for `property`, or `None` if the name is not
    /// recognized. The format of the text is not stable.
    pub fn get_property(&self, property: &str) -> Option<String> {
        let name = property.strip_prefix(PROPERTY_PREFIX)?;
        let view = self.view.read().clone();

        if let Some(level) = name.strip_prefix("num-files-at-level") {
            let level: usize = level.parse().ok()?;
            return (level < NUM_LEVELS).then(|| view.version.num_files(level).to_string());
        }

        match name {
            "stats" => {
                let stats = *self.stats.lock();
                let mut out = String::new();
                let _ = writeln!(out, "                               Compactions");
                let _ = writeln!(out, "Level  Files Size(MB) Time(sec) Read(MB) Write(MB)");
                let _ = writeln!(out, "--------------------------------------------------");
                for (level, s) in stats.iter().enumerate() {
                    let files = view.version.num_files(level);
                    if files == 0 && s.micros == 0 {
                        continue;
                    }
                    let _ = writeln!(
                        out,
                        "{:>3} {:>8} {:>8.0} {:>9.0} {:>8.0} {:>9.0}",
                        level,
                        files,
                        view.version.level_bytes(level) as f64 / 1048576.0,
                        s.micros as f64 / 1e6,
                        s.bytes_read as f64 / 1048576.0,
                        s.bytes_written as f64 / 1048576.0,
                    );
                }
                let cache = self.tables.block_cache();
                let _ = writeln!(
                    out,
                    "Block cache: {} of {} bytes",
                    cache.total_charge(),
                    cache.capacity()
                );
                Some(out)
            }
            "sstables" => {
                let mut out = String::new();
                for (level, files) in view.version.levels().iter().enumerate() {
                    let _ = writeln!(out, "--- level {level} ---");
                    for f in files {
                        let _ = writeln!(
                            out,
                            " {}:{}[{} .. {}]",
                            f.id,
                            f.file_size,
                            describe_key(&f.smallest),
                            describe_key(&f.largest)
                        );
                    }
                }
                Some(out)
            }
            "approximate-memory-usage" => {
                let usage = view.mem.read().size() + self.tables.block_cache().total_charge();
                Some(usage.to_string())
            }
            _ => None,
        }
    }

    /// Approximate bytes used by each key range, on disk and in the
    /// memtable.
    pub fn approximate_sizes(&self, ranges: &[Range<'_>]) -> Result<Vec<u64>> {
        let view = self.view.read().clone();
        let bounds: Vec<(Vec<u8>, Vec<u8>)> = ranges
            .iter()
            .map(|r| {
                (
                    InternalKey::for_seek(r.start, MAX_SEQUENCE_NUMBER).encode(),
                    InternalKey::for_seek(r.limit, MAX_SEQUENCE_NUMBER).encode(),
                )
            })
            .collect();

        // Table offsets may open files; keep the memtable unlocked meanwhile.
        let mut sizes = Vec::with_capacity(bounds.len());
        for (start, limit) in &bounds {
            let a = view.version.approximate_offset_of(&self.tables, &self.icmp, start)?;
            let b = view.version.approximate_offset_of(&self.tables, &self.icmp, limit)?;
            sizes.push(b.saturating_sub(a));
        }

        let mem = view.mem.read();
        for (size, (start, limit)) in sizes.iter_mut().zip(&bounds) {
            *size += mem.approximate_range_size(start, limit);
        }
        Ok(sizes)
    }

    /// Flush the memtable and merge every table overlapping `[begin, end]`
    /// into level 1, discarding overwritten and deleted data no snapshot can
    /// see. `None` bounds are open.
    pub fn compact_range(&self, begin: Option<&[u8]>, end: Option<&[u8]>) -> Result<()> {
        let mut w = self.writer.lock();
        w.check_healthy()?;
        self.flush_memtable(&mut w)?;
        self.compact(&mut w, Some((begin, end)))
    }

    /// Sync the log and close the database. Dropping the handle does the
    /// same but cannot report a failed sync.
    pub fn close(self) -> Result<()> {
        let result = self.writer.lock().log.sync();
        drop(self);
        result
    }

    fn read_sequence(&self, opts: &ReadOptions) -> Result<SequenceNumber> {
        match &opts.snapshot {
            Some(snapshot) if !snapshot.belongs_to(&self.snapshots) => Err(Error::InvalidArgument(
                "snapshot belongs to a different database".into(),
            )),
            Some(snapshot) => Ok(snapshot.sequence()),
            None => Ok(self.last_sequence.load(Ordering::Acquire)),
        }
    }

    fn make_room_for_write(&self, w: &mut WriterState) -> Result<()> {
        if self.view.read().mem.read().is_full() {
            self.flush_memtable(w)?;
        }
        if self.view.read().version.num_files(0) >= L0_COMPACTION_TRIGGER {
            self.compact(w, None)?;
        }
        Ok(())
    }

    /// Write the memtable out as a level-0 table and switch to a fresh log.
    /// Runs under the writer lock, so the memtable cannot change meanwhile.
    fn flush_memtable(&self, w: &mut WriterState) -> Result<()> {
        let view = self.view.read().clone();
        if view.mem.read().is_empty() {
            return Ok(());
        }

        let start = Instant::now();
        let table_id = w.new_file_number();
        let meta = {
            let mem = view.mem.read();
            build_table(&self.name, &self.options, table_id, mem.iter())?
        };
        let log_number = w.new_file_number();
        let log = WALWriter::new(&log_file_name(&self.name, log_number))?;

        let added: Vec<_> = meta.iter().cloned().collect();
        let bytes_written = meta.as_ref().map_or(0, |m| m.file_size);
        let version = view.version.apply(&self.icmp, &[], added);
        if let Err(e) = self.persist(w, log_number, &version) {
            let _ = self.options.env.remove_file(&filename::table_file_name(&self.name, table_id));
            let _ = self.options.env.remove_file(log.path());
            return Err(e);
        }

        let fresh = MemTable::shared(self.icmp.clone(), self.options.write_buffer_size);
        self.install(w, Some(fresh), version);
        w.log = log;
        w.log_number = log_number;
        self.stats.lock()[0].add(&CompactionStats {
            micros: start.elapsed().as_micros() as u64,
            bytes_read: 0,
            bytes_written,
        });
        info!(table = table_id, bytes = bytes_written, log = log_number, "memtable flushed");
        self.delete_obsolete_files(w);
        Ok(())
    }

    /// Merge all level-0 files, plus the level-1 files they (and the manual
    /// range, if any) overlap, into new level-1 files.
    fn compact(&self, w: &mut WriterState, manual: Option<(Option<&[u8]>, Option<&[u8]>)>) -> Result<()> {
        let version = Arc::clone(&self.view.read().version);
        let ucmp = self.icmp.user_comparator();

        let l0_range = version.files(0).iter().fold(None::<(&[u8], &[u8])>, |acc, f| {
            let lo = extract_user_key(&f.smallest);
            let hi = extract_user_key(&f.largest);
            Some(match acc {
                None => (lo, hi),
                Some((a, b)) => (
                    if ucmp.compare(lo, a).is_lt() { lo } else { a },
                    if ucmp.compare(hi, b).is_gt() { hi } else { b },
                ),
            })
        });
        let (begin, end) = match (manual, l0_range) {
            (None, None) => return Ok(()),
            (None, Some((lo, hi))) => (Some(lo), Some(hi)),
            (Some(bounds), None) => bounds,
            (Some((b, e)), Some((lo, hi))) => (
                b.map(|b| if ucmp.compare(lo, b).is_lt() { lo } else { b }),
                e.map(|e| if ucmp.compare(hi, e).is_gt() { hi } else { e }),
            ),
        };
        let mut inputs = version.files(0).to_vec();
        inputs.extend(version.overlapping_files(1, &self.icmp, begin, end));
        if inputs.is_empty() {
            return Ok(());
        }

        let smallest_snapshot = self.snapshots.oldest_or_current(&self.last_sequence);
        info!(
            l0 = version.num_files(0),
            inputs = inputs.len(),
            smallest_snapshot,
            "compaction started"
        );
        let (outputs, stats) = compact_files(
            &self.name,
            &self.options,
            &self.tables,
            &self.icmp,
            &inputs,
            smallest_snapshot,
            || w.new_file_number(),
        )?;

        let removed: Vec<u64> = inputs.iter().map(|f| f.id).collect();
        let output_ids: Vec<u64> = outputs.iter().map(|f| f.id).collect();
        let new_version = version.apply(&self.icmp, &removed, outputs);
        if let Err(e) = self.persist(w, w.log_number, &new_version) {
            for id in output_ids {
                let _ = self.options.env.remove_file(&filename::table_file_name(&self.name, id));
            }
            return Err(e);
        }
        self.install(w, None, new_version);
        self.stats.lock()[1].add(&stats);
        info!(
            inputs = removed.len(),
            outputs = output_ids.len(),
            bytes_read = stats.bytes_read,
            bytes_written = stats.bytes_written,
            "compaction finished"
        );
        self.delete_obsolete_files(w);
        Ok(())
    }

    /// Rewrite the manifest to describe `version` with `log_number` as the
    /// oldest log still needed.
    fn persist(&self, w: &WriterState, log_number: u64, version: &Version) -> Result<()> {
        let state = ManifestState {
            comparator: self.options.comparator.name().to_string(),
            log_number,
            next_file_number: w.next_file_number,
            last_sequence: self.last_sequence.load(Ordering::Acquire),
            levels: version.levels().clone(),
        };
        write_manifest(self.options.env.as_ref(), &self.name, &state)
    }

    fn install(&self, w: &mut WriterState, mem: Option<SharedMemTable>, version: Version) {
        let old = {
            let mut view = self.view.write();
            if let Some(mem) = mem {
                view.mem = mem;
            }
            std::mem::replace(&mut view.version, Arc::new(version))
        };
        w.old_versions.push(Arc::downgrade(&old));
    }

    /// Remove logs older than the current one and tables no live version
    /// references. Failures are logged and retried on the next call.
    fn delete_obsolete_files(&self, w: &mut WriterState) {
        w.old_versions.retain(|v| v.strong_count() > 0);
        let mut live: HashSet<u64> = self.view.read().version.live_files().collect();
        for old in w.old_versions.iter().filter_map(Weak::upgrade) {
            live.extend(old.live_files());
        }

        let env = &self.options.env;
        let children = match env.children(&self.name) {
            Ok(children) => children,
            Err(e) => {
                warn!(error = %e, "listing database directory failed");
                return;
            }
        };
        for child in children {
            let keep = match parse_file_name(&child) {
                Some(FileType::Log(n)) => n >= w.log_number,
                Some(FileType::Table(n)) => live.contains(&n) || n >= w.next_file_number,
                Some(FileType::ManifestTemp) => false,
                _ => true,
            };
            if keep {
                continue;
            }
            if let Some(FileType::Table(n)) = parse_file_name(&child) {
                self.tables.evict(n);
            }
            match env.remove_file(&self.name.join(&child)) {
                Ok(()) => debug!(file = %child, "deleted obsolete file"),
                Err(e) => warn!(file = %child, error = %e, "deleting obsolete file failed"),
            }
        }
    }

    fn shutdown(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Err(e) = self.writer.lock().log.sync() {
            warn!(error = %e, "log sync on close failed");
        }
        self.lock.lock().take();
        info!(db = %self.name.display(), "database closed");
    }
}

impl Drop for Db {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for Db {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Db")
            .field("name", &self.name)
            .field("last_sequence", &self.last_sequence.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

/// Delete every file of the database at `name`, then the directory itself.
///
/// A missing database is not an error. Fails if the database is open.
pub fn destroy_db(options: &Options, name: impl AsRef<Path>) -> Result<()> {
    let name = name.as_ref();
    let env = &options.env;
    if !env.file_exists(name) {
        return Ok(());
    }

    let lock_path = lock_file_name(name);
    let lock = env.lock_file(&lock_path)?;
    let mut result = Ok(());
    for child in env.children(name)? {
        match parse_file_name(&child) {
            Some(FileType::Lock) | None => {}
            Some(_) => {
                if let Err(e) = env.remove_file(&name.join(&child)) {
                    warn!(file = %child, error = %e, "destroy could not delete file");
                    result = Err(e);
                }
            }
        }
    }
    drop(lock);
    let _ = env.remove_file(&lock_path);
    // Fails if foreign files (or repair's lost/ directory) remain; that is
    // fine, they are not ours to delete.
    let _ = env.remove_dir(name);
    info!(db = %name.display(), "database destroyed");
    result
}

fn block_read_options(opts: &ReadOptions) -> BlockReadOptions {
    BlockReadOptions {
        verify_checksums: opts.verify_checksums,
        fill_cache: opts.fill_cache,
    }
}

fn describe_key(ikey: &[u8]) -> String {
    match InternalKey::decode(ikey) {
        Ok(k) => format!("{k:?}"),
        Err(_) => format!("(bad key: {} bytes)", ikey.len()),
    }
}

/// Apply the batches of one log to `mem`, calling `flush` whenever it fills.
/// A damaged record ends the log: with `paranoid_checks` that fails the
/// open, otherwise the rest of the log is dropped with a warning.
pub(crate) fn replay_log(
    path: &Path,
    options: &Options,
    mem: &mut MemTable,
    last_sequence: &mut SequenceNumber,
    flush: &mut dyn FnMut(&mut MemTable) -> Result<()>,
) -> Result<()> {
    let reader = WALReader::new(path)?;
    let mut applied = 0usize;
    for record in reader.iter() {
        let batch = record.and_then(|r| {
            let batch = WriteBatch::from_contents(r.payload)?;
            batch.insert_into(mem)?;
            Ok(batch)
        });
        let batch = match batch {
            Ok(batch) => batch,
            Err(e) if options.paranoid_checks => {
                return Err(Error::Corruption(format!("{}: {e}", path.display())));
            }
            Err(e) => {
                warn!(log = %path.display(), error = %e, "ignoring damaged log tail");
                break;
            }
        };
        applied += 1;
        if batch.count() > 0 {
            let last = batch.sequence() + u64::from(batch.count()) - 1;
            *last_sequence = (*last_sequence).max(last);
        }
        if mem.is_full() {
            flush(mem)?;
        }
    }
    debug!(log = %path.display(), batches = applied, "log replayed");
    Ok(())
}
