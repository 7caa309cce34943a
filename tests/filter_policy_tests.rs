// Filter policy tests
// Custom and built-in filter policies as seen through database reads.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use novelsm::{BloomFilterPolicy, Db, FilterPolicy, Options, ReadOptions, WriteOptions};
use tempfile::TempDir;

/// Answers every membership test with a fixed value.
struct FixedFilter {
    answer: AtomicBool,
    built: AtomicUsize,
}

impl FilterPolicy for FixedFilter {
    fn name(&self) -> &str {
        "TestFilter"
    }

    fn create_filter(&self, keys: &[&[u8]]) -> Vec<u8> {
        self.built.fetch_add(keys.len(), Ordering::Relaxed);
        b"fake".to_vec()
    }

    fn key_may_match(&self, _key: &[u8], filter: &[u8]) -> bool {
        assert_eq!(filter, b"fake");
        self.answer.load(Ordering::Relaxed)
    }
}

fn write_and_flush(path: &std::path::Path, options: &Options) {
    let db = Db::open(options, path).unwrap();
    db.put(&WriteOptions::default(), b"foo", b"foovalue").unwrap();
    db.put(&WriteOptions::default(), b"bar", b"barvalue").unwrap();
    db.compact_range(None, None).unwrap();
}

// =============================================================================
// Test 1: A filter that says "no" hides table contents from point reads
// =============================================================================
#[test]
fn negative_filter_hides_keys() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("db");
    let policy = Arc::new(FixedFilter {
        answer: AtomicBool::new(true),
        built: AtomicUsize::new(0),
    });
    let options = Options {
        create_if_missing: true,
        filter_policy: Some(policy.clone() as Arc<dyn FilterPolicy>),
        ..Options::default()
    };
    write_and_flush(&path, &options);
    assert!(policy.built.load(Ordering::Relaxed) >= 2);

    let db = Db::open(&options, &path).unwrap();
    let read = ReadOptions::default();
    assert_eq!(db.get(&read, b"foo").unwrap(), Some(b"foovalue".to_vec()));

    policy.answer.store(false, Ordering::Relaxed);
    assert_eq!(db.get(&read, b"foo").unwrap(), None);
    assert_eq!(db.get(&read, b"bar").unwrap(), None);

    // Iteration does not consult filters.
    let mut it = db.new_iterator(&read);
    it.seek_to_first();
    assert_eq!(it.key(), b"bar");
}

// =============================================================================
// Test 2: Tables written with a different policy are read without filters
// =============================================================================
#[test]
fn other_policy_filters_are_ignored() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("db");
    let bloom = Options {
        create_if_missing: true,
        filter_policy: Some(Arc::new(BloomFilterPolicy::new(10))),
        ..Options::default()
    };
    write_and_flush(&path, &bloom);

    let rejecting = Options {
        filter_policy: Some(Arc::new(FixedFilter {
            answer: AtomicBool::new(false),
            built: AtomicUsize::new(0),
        })),
        ..Options::default()
    };
    let db = Db::open(&rejecting, &path).unwrap();
    assert_eq!(
        db.get(&ReadOptions::default(), b"foo").unwrap(),
        Some(b"foovalue".to_vec())
    );
}

// =============================================================================
// Test 3: Bloom filters never lose keys across many tables
// =============================================================================
#[test]
fn bloom_filter_keeps_every_key() {
    let dir = TempDir::new().unwrap();
    let options = Options {
        create_if_missing: true,
        write_buffer_size: 100_000,
        filter_policy: Some(Arc::new(BloomFilterPolicy::new(10))),
        ..Options::default()
    };
    let db = Db::open(&options, dir.path().join("db")).unwrap();
    for i in 0..5000 {
        db.put(
            &WriteOptions::default(),
            format!("key{i:06}").as_bytes(),
            &[b'v'; 100],
        )
        .unwrap();
    }
    let read = ReadOptions::default();
    for i in 0..5000 {
        assert!(db.get(&read, format!("key{i:06}").as_bytes()).unwrap().is_some(), "key{i}");
    }
    for i in 0..500 {
        assert!(db.get(&read, format!("missing{i:06}").as_bytes()).unwrap().is_none());
    }
}
