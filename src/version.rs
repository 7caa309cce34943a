//! The set of table files that make up the database at one point in time.
//!
//! Level 0 holds memtable flushes; their key ranges may overlap, so every
//! candidate file is consulted and the newest entry wins. Level 1 holds
//! compaction output: files are sorted and key-disjoint, so at most one file
//! can contain a given key.

use std::cmp::Ordering;
use std::sync::Arc;

use crate::error::Result;
use crate::iterator::StorageIterator;
use crate::manifest::NUM_LEVELS;
use crate::sstable::{BlockReadOptions, SSTableIterator, SSTableMeta};
use crate::table_cache::TableCache;
use crate::types::{
    InternalKey, InternalKeyComparator, LookupResult, ParsedInternalKey, SequenceNumber, ValueType,
    extract_user_key,
};

/// Immutable snapshot of the file layout. Readers hold an `Arc<Version>`
/// for the duration of a lookup or scan; files it lists are not deleted
/// while it is alive.
#[derive(Debug, Clone, Default)]
pub struct Version {
    levels: [Vec<SSTableMeta>; NUM_LEVELS],
}

impl Version {
    pub fn new(levels: [Vec<SSTableMeta>; NUM_LEVELS]) -> Self {
        Version { levels }
    }

    pub fn files(&self, level: usize) -> &[SSTableMeta] {
        &self.levels[level]
    }

    pub fn levels(&self) -> &[Vec<SSTableMeta>; NUM_LEVELS] {
        &self.levels
    }

    pub fn num_files(&self, level: usize) -> usize {
        self.levels[level].len()
    }

    pub fn level_bytes(&self, level: usize) -> u64 {
        self.levels[level].iter().map(|f| f.file_size).sum()
    }

    /// Every file number referenced by this version.
    pub fn live_files(&self) -> impl Iterator<Item = u64> + '_ {
        self.levels.iter().flatten().map(|f| f.id)
    }

    /// A new version with `removed` dropped and `added` placed on their
    /// levels. Level 1 is kept sorted by smallest key.
    pub fn apply(&self, icmp: &InternalKeyComparator, removed: &[u64], added: Vec<SSTableMeta>) -> Version {
        let mut levels = self.levels.clone();
        for files in &mut levels {
            files.retain(|f| !removed.contains(&f.id));
        }
        for file in added {
            levels[file.level as usize].push(file);
        }
        levels[1].sort_by(|a, b| icmp.compare(&a.smallest, &b.smallest));
        Version { levels }
    }

    /// Newest entry for `key` visible at `sequence`, searching level 0
    /// then level 1.
    pub fn get(
        &self,
        tables: &TableCache,
        icmp: &InternalKeyComparator,
        key: &[u8],
        sequence: SequenceNumber,
        opts: BlockReadOptions,
    ) -> Result<Option<LookupResult>> {
        let seek = InternalKey::for_seek(key, sequence).encode();

        // Level 0: files overlap, so take the highest sequence among all of
        // them.
        let mut best: Option<(SequenceNumber, LookupResult)> = None;
        for file in &self.levels[0] {
            if !covers_user_key(icmp, file, key) {
                continue;
            }
            if let Some((seq, found)) = lookup_in(tables, icmp, file.id, &seek, key, opts)? {
                if best.as_ref().is_none_or(|(b, _)| seq > *b) {
                    best = Some((seq, found));
                }
            }
        }
        if let Some((_, found)) = best {
            return Ok(Some(found));
        }

        let files = &self.levels[1];
        let idx = files.partition_point(|f| icmp.compare(&f.largest, &seek) == Ordering::Less);
        if let Some(file) = files.get(idx) {
            if covers_user_key(icmp, file, key) {
                return Ok(lookup_in(tables, icmp, file.id, &seek, key, opts)?.map(|(_, r)| r));
            }
        }
        Ok(None)
    }

    /// Append one iterator per level-0 file and one concatenating iterator
    /// for level 1.
    pub fn add_iterators(
        &self,
        tables: &Arc<TableCache>,
        icmp: &InternalKeyComparator,
        opts: BlockReadOptions,
        out: &mut Vec<Box<dyn StorageIterator>>,
    ) -> Result<()> {
        for file in &self.levels[0] {
            out.push(Box::new(tables.iter(file.id, opts)?));
        }
        if !self.levels[1].is_empty() {
            out.push(Box::new(LevelIterator::new(
                Arc::clone(tables),
                icmp.clone(),
                self.levels[1].clone(),
                opts,
            )));
        }
        Ok(())
    }

    /// Files on `level` whose user-key range intersects `[begin, end]`.
    /// `None` bounds are open.
    pub fn overlapping_files(
        &self,
        level: usize,
        icmp: &InternalKeyComparator,
        begin: Option<&[u8]>,
        end: Option<&[u8]>,
    ) -> Vec<SSTableMeta> {
        self.levels[level]
            .iter()
            .filter(|f| {
                let before = end.is_some_and(|e| {
                    icmp.compare_user(extract_user_key(&f.smallest), e) == Ordering::Greater
                });
                let after = begin.is_some_and(|b| {
                    icmp.compare_user(extract_user_key(&f.largest), b) == Ordering::Less
                });
                !before && !after
            })
            .cloned()
            .collect()
    }

    /// Approximate byte offset of internal key `ikey` within the whole
    /// database, summed across files.
    pub fn approximate_offset_of(
        &self,
        tables: &TableCache,
        icmp: &InternalKeyComparator,
        ikey: &[u8],
    ) -> Result<u64> {
        let mut offset = 0;
        for (level, files) in self.levels.iter().enumerate() {
            for file in files {
                if icmp.compare(&file.largest, ikey) != Ordering::Greater {
                    offset += file.file_size;
                } else if icmp.compare(&file.smallest, ikey) == Ordering::Greater {
                    // Level 1 is sorted: nothing further can come before ikey.
                    if level > 0 {
                        break;
                    }
                } else {
                    offset += tables.find_table(file.id)?.approximate_offset_of(ikey);
                }
            }
        }
        Ok(offset)
    }
}

fn covers_user_key(icmp: &InternalKeyComparator, file: &SSTableMeta, key: &[u8]) -> bool {
    icmp.compare_user(key, extract_user_key(&file.smallest)) != Ordering::Less
        && icmp.compare_user(key, extract_user_key(&file.largest)) != Ordering::Greater
}

fn lookup_in(
    tables: &TableCache,
    icmp: &InternalKeyComparator,
    id: u64,
    seek: &[u8],
    key: &[u8],
    opts: BlockReadOptions,
) -> Result<Option<(SequenceNumber, LookupResult)>> {
    let Some((found_key, value)) = tables.get(id, seek, opts)? else {
        return Ok(None);
    };
    let parsed = ParsedInternalKey::parse(&found_key)?;
    if icmp.compare_user(parsed.user_key, key) != Ordering::Equal {
        return Ok(None);
    }
    let result = match parsed.value_type {
        ValueType::Put => LookupResult::Found(value),
        ValueType::Delete => LookupResult::Deleted,
    };
    Ok(Some((parsed.sequence, result)))
}

/// Walks the sorted, disjoint files of one level as a single sequence,
/// opening each table only when the scan reaches it.
pub struct LevelIterator {
    tables: Arc<TableCache>,
    icmp: InternalKeyComparator,
    files: Vec<SSTableMeta>,
    opts: BlockReadOptions,
    file_idx: usize,
    current: Option<SSTableIterator>,
}

impl LevelIterator {
    pub fn new(
        tables: Arc<TableCache>,
        icmp: InternalKeyComparator,
        files: Vec<SSTableMeta>,
        opts: BlockReadOptions,
    ) -> Self {
        LevelIterator {
            tables,
            icmp,
            files,
            opts,
            file_idx: 0,
            current: None,
        }
    }

    fn load_file(&mut self, file_idx: usize) -> Result<()> {
        self.current = None;
        let Some(file) = self.files.get(file_idx) else {
            return Ok(());
        };
        self.current = Some(self.tables.iter(file.id, self.opts)?);
        self.file_idx = file_idx;
        Ok(())
    }

    fn skip_exhausted_forward(&mut self) -> Result<()> {
        while self.current.as_ref().is_some_and(|it| !it.is_valid()) {
            self.load_file(self.file_idx + 1)?;
            if let Some(it) = self.current.as_mut() {
                it.seek_to_first()?;
            }
        }
        Ok(())
    }

    fn skip_exhausted_backward(&mut self) -> Result<()> {
        while self.current.as_ref().is_some_and(|it| !it.is_valid()) {
            if self.file_idx == 0 {
                self.current = None;
                break;
            }
            self.load_file(self.file_idx - 1)?;
            if let Some(it) = self.current.as_mut() {
                it.seek_to_last()?;
            }
        }
        Ok(())
    }
}

impl StorageIterator for LevelIterator {
    fn key(&self) -> &[u8] {
        self.current.as_ref().map(|it| it.key()).unwrap_or(&[])
    }

    fn value(&self) -> &[u8] {
        self.current.as_ref().map(|it| it.value()).unwrap_or(&[])
    }

    fn is_valid(&self) -> bool {
        self.current.as_ref().is_some_and(|it| it.is_valid())
    }

    fn next(&mut self) -> Result<()> {
        if let Some(it) = self.current.as_mut() {
            it.next()?;
        }
        self.skip_exhausted_forward()
    }

    fn prev(&mut self) -> Result<()> {
        if let Some(it) = self.current.as_mut() {
            it.prev()?;
        }
        self.skip_exhausted_backward()
    }

    fn seek(&mut self, key: &[u8]) -> Result<()> {
        let idx = self
            .files
            .partition_point(|f| self.icmp.compare(&f.largest, key) == Ordering::Less);
        self.load_file(idx)?;
        if let Some(it) = self.current.as_mut() {
            it.seek(key)?;
        }
        self.skip_exhausted_forward()
    }

    fn seek_to_first(&mut self) -> Result<()> {
        self.load_file(0)?;
        if let Some(it) = self.current.as_mut() {
            it.seek_to_first()?;
        }
        self.skip_exhausted_forward()
    }

    fn seek_to_last(&mut self) -> Result<()> {
        let Some(last) = self.files.len().checked_sub(1) else {
            self.current = None;
            return Ok(());
        };
        self.load_file(last)?;
        if let Some(it) = self.current.as_mut() {
            it.seek_to_last()?;
        }
        self.skip_exhausted_backward()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comparator::bytewise;
    use crate::types::encode_internal_key;

    fn meta(id: u64, level: u32, lo: &[u8], hi: &[u8]) -> SSTableMeta {
        SSTableMeta {
            id,
            level,
            smallest: encode_internal_key(lo, 1, ValueType::Put),
            largest: encode_internal_key(hi, 1, ValueType::Put),
            file_size: 100,
            entry_count: 2,
        }
    }

    #[test]
    fn apply_keeps_level1_sorted() {
        let icmp = InternalKeyComparator::new(bytewise());
        let v = Version::default().apply(
            &icmp,
            &[],
            vec![meta(3, 1, b"m", b"p"), meta(4, 1, b"a", b"c"), meta(5, 0, b"b", b"z")],
        );
        let ids: Vec<u64> = v.files(1).iter().map(|f| f.id).collect();
        assert_eq!(ids, vec![4, 3]);
        assert_eq!(v.num_files(0), 1);
        assert_eq!(v.level_bytes(1), 200);

        let v = v.apply(&icmp, &[4, 5], vec![]);
        assert_eq!(v.live_files().collect::<Vec<_>>(), vec![3]);
    }

    #[test]
    fn overlapping_files_respects_open_bounds() {
        let icmp = InternalKeyComparator::new(bytewise());
        let v = Version::default().apply(
            &icmp,
            &[],
            vec![meta(1, 1, b"a", b"c"), meta(2, 1, b"e", b"g"), meta(3, 1, b"x", b"z")],
        );
        let ids = |files: Vec<SSTableMeta>| files.iter().map(|f| f.id).collect::<Vec<_>>();
        assert_eq!(ids(v.overlapping_files(1, &icmp, None, None)), vec![1, 2, 3]);
        assert_eq!(ids(v.overlapping_files(1, &icmp, Some(b"c"), Some(b"e"))), vec![1, 2]);
        assert_eq!(ids(v.overlapping_files(1, &icmp, Some(b"h"), Some(b"w"))), Vec::<u64>::new());
        assert_eq!(ids(v.overlapping_files(1, &icmp, Some(b"f"), None)), vec![2, 3]);
        assert_eq!(ids(v.overlapping_files(1, &icmp, None, Some(b"b"))), vec![1]);
    }
}
