use std::cmp::Ordering;
use std::sync::Arc;

/// A total order over user keys, identified by a name.
///
/// The engine stores the comparator's name with the database and refuses to
/// open it with a comparator of a different name. The name is the only thing
/// it can check: whoever implements this trait must change the name whenever
/// the ordering changes. Reopening a database with a different ordering under
/// the same name corrupts it silently.
///
/// `compare` must be a strict total order (antisymmetric, transitive, and
/// `Equal` only for keys that are interchangeable) and a pure function of its
/// two arguments, stable across process restarts.
pub trait Comparator: Send + Sync {
    /// Name persisted with the database.
    fn name(&self) -> &str;

    /// Three-way comparison of two user keys.
    fn compare(&self, a: &[u8], b: &[u8]) -> Ordering;
}

/// Unsigned lexicographic byte order. The default comparator.
#[derive(Debug, Clone, Copy, Default)]
pub struct BytewiseComparator;

impl Comparator for BytewiseComparator {
    fn name(&self) -> &str {
        "novelsm.BytewiseComparator"
    }

    fn compare(&self, a: &[u8], b: &[u8]) -> Ordering {
        a.cmp(b)
    }
}

/// Shared handle to the default comparator.
pub fn bytewise() -> Arc<dyn Comparator> {
    Arc::new(BytewiseComparator)
}
