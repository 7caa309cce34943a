use std::cmp::Ordering;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};

use crate::comparator::Comparator;
use crate::db::Snapshot;
use crate::error::{Error, Result};
use crate::iterator::{MergeIterator, StorageIterator};
use crate::types::{InternalKey, InternalKeyComparator, MAX_SEQUENCE_NUMBER, ParsedInternalKey, SequenceNumber, ValueType};
use crate::version::Version;

/// Position of a [`DbIterator`].
#[derive(Debug, Clone, PartialEq, Eq)]
enum Cursor {
    Invalid,
    Valid { key: Vec<u8>, value: Vec<u8> },
}

/// Everything an iterator keeps alive besides its merged input.
pub(crate) struct IterPins {
    pub closed: Arc<AtomicBool>,
    pub snapshot: Option<Snapshot>,
    pub version: Arc<Version>,
}

/// Cursor over the user-visible contents of a database at one sequence
/// number.
///
/// Starts Invalid: call one of the seek methods first. Each user key is
/// shown once, with its newest value at or below the read sequence; deleted
/// keys are skipped.
///
/// # Preconditions
///
/// * `next`/`prev` on an Invalid iterator do not move it; they record an
///   `InvalidArgument` error in [`status`](Self::status).
/// * `key`/`value` panic on an Invalid iterator.
/// * After the database closes, every move leaves the iterator Invalid
///   with an `InvalidArgument("database is closed")` status.
///
/// I/O and corruption errors met while moving also end up in `status`;
/// running off either end is not an error.
pub struct DbIterator {
    inner: MergeIterator,
    ucmp: Arc<dyn Comparator>,
    sequence: SequenceNumber,
    cursor: Cursor,
    status: Option<Error>,
    closed: Arc<AtomicBool>,
    _snapshot: Option<Snapshot>,
    _version: Arc<Version>,
}

impl DbIterator {
    pub(crate) fn new(
        inner: MergeIterator,
        ucmp: Arc<dyn Comparator>,
        sequence: SequenceNumber,
        pins: IterPins,
    ) -> Self {
        DbIterator {
            inner,
            ucmp,
            sequence,
            cursor: Cursor::Invalid,
            status: None,
            closed: pins.closed,
            _snapshot: pins.snapshot,
            _version: pins.version,
        }
    }

    /// An iterator that is permanently Invalid with `error` as its status.
    pub(crate) fn failed(error: Error, ucmp: Arc<dyn Comparator>, pins: IterPins) -> Self {
        let empty = MergeIterator::new(Vec::new(), InternalKeyComparator::new(Arc::clone(&ucmp)));
        let mut it = DbIterator::new(empty, ucmp, 0, pins);
        it.status = Some(error);
        it
    }

    pub fn is_valid(&self) -> bool {
        matches!(self.cursor, Cursor::Valid { .. })
    }

    /// Current key.
    ///
    /// # Panics
    ///
    /// If the iterator is Invalid.
    pub fn key(&self) -> &[u8] {
        match &self.cursor {
            Cursor::Valid { key, .. } => key,
            Cursor::Invalid => panic!("DbIterator::key called on an invalid iterator"),
        }
    }

    /// Current value.
    ///
    /// # Panics
    ///
    /// If the iterator is Invalid.
    pub fn value(&self) -> &[u8] {
        match &self.cursor {
            Cursor::Valid { value, .. } => value,
            Cursor::Invalid => panic!("DbIterator::value called on an invalid iterator"),
        }
    }

    /// The first error met by this iterator, if any.
    pub fn status(&self) -> Result<()> {
        match &self.status {
            Some(e) => Err(e.clone()),
            None => Ok(()),
        }
    }

    pub fn seek_to_first(&mut self) {
        if !self.check_open() {
            return;
        }
        let moved = self.inner.seek_to_first();
        self.settle(moved, |it| it.find_next_user_entry(None));
    }

    pub fn seek_to_last(&mut self) {
        if !self.check_open() {
            return;
        }
        let moved = self.inner.seek_to_last();
        self.settle(moved, DbIterator::find_prev_user_entry);
    }

    /// Position at the first key >= `target`.
    pub fn seek(&mut self, target: &[u8]) {
        if !self.check_open() {
            return;
        }
        let moved = self.inner.seek(&InternalKey::for_seek(target, self.sequence).encode());
        self.settle(moved, |it| it.find_next_user_entry(None));
    }

    pub fn next(&mut self) {
        let Some(current) = self.current_key() else {
            return;
        };
        // Land on the newest visible entry of the current key, then skip
        // every entry of that key.
        let moved = self
            .inner
            .seek(&InternalKey::for_seek(&current, self.sequence).encode());
        self.settle(moved, |it| it.find_next_user_entry(Some(current)));
    }

    pub fn prev(&mut self) {
        let Some(current) = self.current_key() else {
            return;
        };
        // Land just before every entry of the current key.
        let moved = self
            .inner
            .seek(&InternalKey::for_seek(&current, MAX_SEQUENCE_NUMBER).encode())
            .and_then(|()| {
                if self.inner.is_valid() {
                    self.inner.prev()
                } else {
                    self.inner.seek_to_last()
                }
            });
        self.settle(moved, DbIterator::find_prev_user_entry);
    }

    /// Key to move from, or `None` (with the status updated) when the
    /// iterator cannot move.
    fn current_key(&mut self) -> Option<Vec<u8>> {
        if !self.check_open() {
            return None;
        }
        match &self.cursor {
            Cursor::Valid { key, .. } => Some(key.clone()),
            Cursor::Invalid => {
                self.fail(Error::InvalidArgument("iterator is not positioned".into()));
                None
            }
        }
    }

    fn check_open(&mut self) -> bool {
        if self.closed.load(AtomicOrdering::Acquire) {
            self.fail(Error::InvalidArgument("database is closed".into()));
            return false;
        }
        true
    }

    fn fail(&mut self, error: Error) {
        self.cursor = Cursor::Invalid;
        if self.status.is_none() {
            self.status = Some(error);
        }
    }

    fn settle(&mut self, moved: Result<()>, find: impl FnOnce(&mut Self) -> Result<()>) {
        if let Err(e) = moved.and_then(|()| find(self)) {
            self.fail(e);
        }
    }

    /// Walk forward to the first visible, non-deleted user key, skipping
    /// every entry of `skip` and of anything deleted on the way.
    fn find_next_user_entry(&mut self, mut skip: Option<Vec<u8>>) -> Result<()> {
        while self.inner.is_valid() {
            let parsed = ParsedInternalKey::parse(self.inner.key())?;
            if parsed.sequence <= self.sequence {
                let hidden = skip
                    .as_deref()
                    .is_some_and(|s| self.ucmp.compare(parsed.user_key, s) != Ordering::Greater);
                match parsed.value_type {
                    ValueType::Delete => skip = Some(parsed.user_key.to_vec()),
                    ValueType::Put if !hidden => {
                        self.cursor = Cursor::Valid {
                            key: parsed.user_key.to_vec(),
                            value: self.inner.value().to_vec(),
                        };
                        return Ok(());
                    }
                    ValueType::Put => {}
                }
            }
            self.inner.next()?;
        }
        self.cursor = Cursor::Invalid;
        Ok(())
    }

    /// Walk backward. Entries of one user key arrive oldest first, so the
    /// last visible one seen before the user key changes is its newest.
    fn find_prev_user_entry(&mut self) -> Result<()> {
        let mut value_type = ValueType::Delete;
        let mut saved_key = Vec::new();
        let mut saved_value = Vec::new();

        while self.inner.is_valid() {
            let parsed = ParsedInternalKey::parse(self.inner.key())?;
            if parsed.sequence <= self.sequence {
                if value_type != ValueType::Delete
                    && self.ucmp.compare(parsed.user_key, &saved_key) == Ordering::Less
                {
                    break;
                }
                value_type = parsed.value_type;
                saved_key.clear();
                saved_value.clear();
                if value_type == ValueType::Put {
                    saved_key.extend_from_slice(parsed.user_key);
                    saved_value.extend_from_slice(self.inner.value());
                }
            }
            self.inner.prev()?;
        }

        self.cursor = if value_type == ValueType::Delete {
            Cursor::Invalid
        } else {
            Cursor::Valid {
                key: saved_key,
                value: saved_value,
            }
        };
        Ok(())
    }
}

impl std::fmt::Debug for DbIterator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DbIterator")
            .field("sequence", &self.sequence)
            .field("valid", &self.is_valid())
            .field("status", &self.status)
            .finish()
    }
}
