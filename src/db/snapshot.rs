use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::types::SequenceNumber;

/// Sequence numbers pinned by live snapshots, with a count per sequence.
#[derive(Debug, Default)]
pub(crate) struct SnapshotList {
    pinned: Mutex<BTreeMap<SequenceNumber, usize>>,
}

impl SnapshotList {
    pub fn new() -> Arc<Self> {
        Arc::new(SnapshotList::default())
    }

    /// Pin the current value of `last_sequence`. The load happens under the
    /// list's lock, so [`oldest_or_current`](Self::oldest_or_current) never
    /// misses a snapshot that is being taken.
    pub fn acquire_current(self: &Arc<Self>, last_sequence: &AtomicU64) -> Snapshot {
        let sequence = {
            let mut pinned = self.pinned.lock();
            let sequence = last_sequence.load(Ordering::Acquire);
            *pinned.entry(sequence).or_default() += 1;
            sequence
        };
        Snapshot {
            inner: Arc::new(SnapshotInner {
                sequence,
                list: Arc::clone(self),
            }),
        }
    }

    fn release(&self, sequence: SequenceNumber) {
        let mut pinned = self.pinned.lock();
        if let Some(count) = pinned.get_mut(&sequence) {
            *count -= 1;
            if *count == 0 {
                pinned.remove(&sequence);
            }
        }
    }

    /// Oldest sequence any reader may still ask for: the oldest pinned
    /// snapshot, or `last_sequence` when none is alive.
    pub fn oldest_or_current(&self, last_sequence: &AtomicU64) -> SequenceNumber {
        let pinned = self.pinned.lock();
        match pinned.keys().next() {
            Some(&oldest) => oldest,
            None => last_sequence.load(Ordering::Acquire),
        }
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.pinned.lock().values().sum()
    }
}

struct SnapshotInner {
    sequence: SequenceNumber,
    list: Arc<SnapshotList>,
}

impl Drop for SnapshotInner {
    fn drop(&mut self) {
        self.list.release(self.sequence);
    }
}

/// An immutable, point-in-time read view of a database.
///
/// Reads through a snapshot (`ReadOptions::snapshot`) see exactly the writes
/// committed before it was taken. Clones share one registration; the view
/// is released when the last clone drops or is passed to
/// [`Db::release_snapshot`](crate::Db::release_snapshot). Snapshots may be
/// sent to and shared between threads.
#[derive(Clone)]
pub struct Snapshot {
    inner: Arc<SnapshotInner>,
}

impl Snapshot {
    pub fn sequence(&self) -> SequenceNumber {
        self.inner.sequence
    }

    /// Whether this snapshot was taken from the database owning `list`.
    pub(crate) fn belongs_to(&self, list: &Arc<SnapshotList>) -> bool {
        Arc::ptr_eq(&self.inner.list, list)
    }
}

impl fmt::Debug for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Snapshot")
            .field("sequence", &self.inner.sequence)
            .finish()
    }
}
