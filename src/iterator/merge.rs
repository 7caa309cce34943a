use std::cmp::Ordering;

use crate::error::Result;
use crate::iterator::StorageIterator;
use crate::types::InternalKeyComparator;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Forward,
    Reverse,
}

/// Merges multiple sorted iterators into a single sorted stream.
///
/// Used for:
/// - Range scans across memtable + all SSTable levels
/// - Compaction (merging SSTables)
///
/// Every version of every key is yielded, in internal key order
/// (user key ASC, sequence DESC). Hiding old versions and tombstones is the
/// job of the layer above.
///
/// Children are few (memtables, L0 tables, L1 tables), so the smallest or
/// largest child is found with a linear scan instead of a heap; that also
/// makes switching direction cheap to reason about.
pub struct MergeIterator {
    children: Vec<Box<dyn StorageIterator>>,
    cmp: InternalKeyComparator,
    current: Option<usize>,
    direction: Direction,
}

impl MergeIterator {
    /// Create a new MergeIterator from multiple sorted sources. The result
    /// is unpositioned until one of the seek methods is called.
    pub fn new(children: Vec<Box<dyn StorageIterator>>, cmp: InternalKeyComparator) -> Self {
        MergeIterator {
            children,
            cmp,
            current: None,
            direction: Direction::Forward,
        }
    }

    fn find_smallest(&mut self) {
        let mut smallest: Option<usize> = None;
        for (i, child) in self.children.iter().enumerate() {
            if !child.is_valid() {
                continue;
            }
            smallest = match smallest {
                Some(s) if self.cmp.compare(child.key(), self.children[s].key()) != Ordering::Less => {
                    Some(s)
                }
                _ => Some(i),
            };
        }
        self.current = smallest;
    }

    fn find_largest(&mut self) {
        let mut largest: Option<usize> = None;
        for (i, child) in self.children.iter().enumerate().rev() {
            if !child.is_valid() {
                continue;
            }
            largest = match largest {
                Some(l) if self.cmp.compare(child.key(), self.children[l].key()) != Ordering::Greater => {
                    Some(l)
                }
                _ => Some(i),
            };
        }
        self.current = largest;
    }
}

impl StorageIterator for MergeIterator {
    fn key(&self) -> &[u8] {
        let current = self.current.expect("merge iterator is not positioned");
        self.children[current].key()
    }

    fn value(&self) -> &[u8] {
        let current = self.current.expect("merge iterator is not positioned");
        self.children[current].value()
    }

    fn is_valid(&self) -> bool {
        self.current.is_some()
    }

    fn next(&mut self) -> Result<()> {
        let Some(current) = self.current else {
            return Ok(());
        };

        // After moving backwards the other children sit before the current
        // key. Bring each of them to the first entry after it.
        if self.direction != Direction::Forward {
            let key = self.children[current].key().to_vec();
            for i in 0..self.children.len() {
                if i == current {
                    continue;
                }
                let child = &mut self.children[i];
                child.seek(&key)?;
                if child.is_valid() && self.cmp.compare(&key, child.key()) == Ordering::Equal {
                    child.next()?;
                }
            }
            self.direction = Direction::Forward;
        }

        self.children[current].next()?;
        self.find_smallest();
        Ok(())
    }

    fn prev(&mut self) -> Result<()> {
        let Some(current) = self.current else {
            return Ok(());
        };

        // After moving forwards the other children sit after the current key.
        // Bring each of them to the last entry before it.
        if self.direction != Direction::Reverse {
            let key = self.children[current].key().to_vec();
            for i in 0..self.children.len() {
                if i == current {
                    continue;
                }
                let child = &mut self.children[i];
                child.seek(&key)?;
                if child.is_valid() {
                    child.prev()?;
                } else {
                    child.seek_to_last()?;
                }
            }
            self.direction = Direction::Reverse;
        }

        self.children[current].prev()?;
        self.find_largest();
        Ok(())
    }

    fn seek(&mut self, key: &[u8]) -> Result<()> {
        for child in &mut self.children {
            child.seek(key)?;
        }
        self.direction = Direction::Forward;
        self.find_smallest();
        Ok(())
    }

    fn seek_to_first(&mut self) -> Result<()> {
        for child in &mut self.children {
            child.seek_to_first()?;
        }
        self.direction = Direction::Forward;
        self.find_smallest();
        Ok(())
    }

    fn seek_to_last(&mut self) -> Result<()> {
        for child in &mut self.children {
            child.seek_to_last()?;
        }
        self.direction = Direction::Reverse;
        self.find_largest();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comparator::bytewise;
    use crate::types::{ValueType, encode_internal_key};

    /// In-memory sorted source for exercising the merge.
    struct VecIter {
        entries: Vec<(Vec<u8>, Vec<u8>)>,
        pos: Option<usize>,
        cmp: InternalKeyComparator,
    }

    impl VecIter {
        fn boxed(cmp: &InternalKeyComparator, items: &[(&str, u64)]) -> Box<dyn StorageIterator> {
            let mut entries: Vec<_> = items
                .iter()
                .map(|(k, seq)| {
                    (
                        encode_internal_key(k.as_bytes(), *seq, ValueType::Put),
                        format!("{k}{seq}").into_bytes(),
                    )
                })
                .collect();
            entries.sort_by(|a, b| cmp.compare(&a.0, &b.0));
            Box::new(VecIter {
                entries,
                pos: None,
                cmp: cmp.clone(),
            })
        }
    }

    impl StorageIterator for VecIter {
        fn key(&self) -> &[u8] {
            &self.entries[self.pos.unwrap()].0
        }
        fn value(&self) -> &[u8] {
            &self.entries[self.pos.unwrap()].1
        }
        fn is_valid(&self) -> bool {
            self.pos.is_some()
        }
        fn next(&mut self) -> Result<()> {
            self.pos = self.pos.map(|p| p + 1).filter(|&p| p < self.entries.len());
            Ok(())
        }
        fn prev(&mut self) -> Result<()> {
            self.pos = self.pos.and_then(|p| p.checked_sub(1));
            Ok(())
        }
        fn seek(&mut self, key: &[u8]) -> Result<()> {
            let p = self
                .entries
                .partition_point(|(k, _)| self.cmp.compare(k, key) == Ordering::Less);
            self.pos = (p < self.entries.len()).then_some(p);
            Ok(())
        }
        fn seek_to_first(&mut self) -> Result<()> {
            self.pos = (!self.entries.is_empty()).then_some(0);
            Ok(())
        }
        fn seek_to_last(&mut self) -> Result<()> {
            self.pos = self.entries.len().checked_sub(1);
            Ok(())
        }
    }

    fn values(it: &MergeIterator) -> String {
        String::from_utf8(it.value().to_vec()).unwrap()
    }

    fn merged(cmp: &InternalKeyComparator) -> MergeIterator {
        MergeIterator::new(
            vec![
                VecIter::boxed(cmp, &[("a", 5), ("c", 7)]),
                VecIter::boxed(cmp, &[("a", 2), ("b", 3), ("d", 1)]),
                VecIter::boxed(cmp, &[]),
            ],
            cmp.clone(),
        )
    }

    #[test]
    fn forward_yields_internal_key_order() {
        let cmp = InternalKeyComparator::new(bytewise());
        let mut it = merged(&cmp);
        it.seek_to_first().unwrap();
        let mut seen = Vec::new();
        while it.is_valid() {
            seen.push(values(&it));
            it.next().unwrap();
        }
        assert_eq!(seen, vec!["a5", "a2", "b3", "c7", "d1"]);
    }

    #[test]
    fn backward_yields_reverse_order() {
        let cmp = InternalKeyComparator::new(bytewise());
        let mut it = merged(&cmp);
        it.seek_to_last().unwrap();
        let mut seen = Vec::new();
        while it.is_valid() {
            seen.push(values(&it));
            it.prev().unwrap();
        }
        assert_eq!(seen, vec!["d1", "c7", "b3", "a2", "a5"]);
    }

    #[test]
    fn direction_switches_keep_position() {
        let cmp = InternalKeyComparator::new(bytewise());
        let mut it = merged(&cmp);
        it.seek(&encode_internal_key(b"b", 100, ValueType::Delete)).unwrap();
        assert_eq!(values(&it), "b3");
        it.prev().unwrap();
        assert_eq!(values(&it), "a2");
        it.next().unwrap();
        assert_eq!(values(&it), "b3");
        it.next().unwrap();
        assert_eq!(values(&it), "c7");
        it.prev().unwrap();
        assert_eq!(values(&it), "b3");
    }
}
