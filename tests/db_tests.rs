// Database tests
// Opening, point operations, recovery, properties, size estimates,
// compaction and destruction through the public handle.

use std::cmp::Ordering;
use std::path::Path;
use std::sync::Arc;

use novelsm::{
    Comparator, Db, Options, Range, ReadOptions, WriteBatch, WriteOptions, destroy_db,
    major_version, minor_version,
};
use tempfile::TempDir;

fn create_options() -> Options {
    Options {
        create_if_missing: true,
        ..Options::default()
    }
}

fn small_buffer_options() -> Options {
    Options {
        write_buffer_size: 100_000,
        ..create_options()
    }
}

fn get(db: &Db, key: &[u8]) -> Option<Vec<u8>> {
    db.get(&ReadOptions::default(), key).unwrap()
}

fn put(db: &Db, key: &[u8], value: &[u8]) {
    db.put(&WriteOptions::default(), key, value).unwrap();
}

fn files_at_level(db: &Db, level: usize) -> usize {
    db.get_property(&format!("novelsm.num-files-at-level{level}"))
        .unwrap()
        .parse()
        .unwrap()
}

fn count_files(dir: &Path, extension: &str) -> usize {
    std::fs::read_dir(dir)
        .unwrap()
        .filter(|e| {
            e.as_ref()
                .unwrap()
                .path()
                .extension()
                .is_some_and(|x| x == extension)
        })
        .count()
}

struct ReverseComparator;

impl Comparator for ReverseComparator {
    fn name(&self) -> &str {
        "test.ReverseComparator"
    }

    fn compare(&self, a: &[u8], b: &[u8]) -> Ordering {
        b.cmp(a)
    }
}

// =============================================================================
// Test 1: Opening a missing database without create_if_missing fails
// =============================================================================
#[test]
fn open_missing_fails() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("db");
    let err = Db::open(&Options::default(), &path).unwrap_err();
    assert!(err.is_invalid_argument(), "{err}");
    assert!(!path.exists());
}

// =============================================================================
// Test 2: error_if_exists refuses an existing database
// =============================================================================
#[test]
fn error_if_exists() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("db");
    Db::open(&create_options(), &path).unwrap().close().unwrap();

    let options = Options {
        error_if_exists: true,
        ..create_options()
    };
    assert!(Db::open(&options, &path).unwrap_err().is_invalid_argument());
    Db::open(&create_options(), &path).unwrap();
}

// =============================================================================
// Test 3: Put, get, overwrite and delete
// =============================================================================
#[test]
fn put_get_delete() {
    let dir = TempDir::new().unwrap();
    let db = Db::open(&create_options(), dir.path().join("db")).unwrap();

    assert_eq!(get(&db, b"foo"), None);
    put(&db, b"foo", b"hello");
    assert_eq!(get(&db, b"foo"), Some(b"hello".to_vec()));
    put(&db, b"foo", b"world");
    assert_eq!(get(&db, b"foo"), Some(b"world".to_vec()));

    db.delete(&WriteOptions::default(), b"foo").unwrap();
    assert_eq!(get(&db, b"foo"), None);
    // Deleting an absent key is fine.
    db.delete(&WriteOptions::default(), b"never-written").unwrap();

    put(&db, b"", b"empty key");
    put(&db, b"empty value", b"");
    assert_eq!(get(&db, b""), Some(b"empty key".to_vec()));
    assert_eq!(get(&db, b"empty value"), Some(Vec::new()));
}

// =============================================================================
// Test 4: A batch applies all of its records, in order
// =============================================================================
#[test]
fn batch_is_applied_in_order() {
    let dir = TempDir::new().unwrap();
    let db = Db::open(&create_options(), dir.path().join("db")).unwrap();
    put(&db, b"box", b"c");

    let mut batch = WriteBatch::new();
    batch.put(b"foo", b"a");
    batch.clear();
    batch.put(b"bar", b"b");
    batch.put(b"box", b"c");
    batch.delete(b"bar");
    batch.put(b"box", b"d");
    db.write(&WriteOptions { sync: true }, &batch).unwrap();

    assert_eq!(get(&db, b"foo"), None);
    assert_eq!(get(&db, b"bar"), None);
    assert_eq!(get(&db, b"box"), Some(b"d".to_vec()));

    db.write(&WriteOptions::default(), &WriteBatch::new()).unwrap();
}

// =============================================================================
// Test 5: Writes survive a reopen through log replay
// =============================================================================
#[test]
fn reopen_replays_log() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("db");
    {
        let db = Db::open(&create_options(), &path).unwrap();
        put(&db, b"a", b"1");
        put(&db, b"b", b"2");
        db.delete(&WriteOptions::default(), b"a").unwrap();
    }

    let db = Db::open(&Options::default(), &path).unwrap();
    assert_eq!(get(&db, b"a"), None);
    assert_eq!(get(&db, b"b"), Some(b"2".to_vec()));
    put(&db, b"c", b"3");
    drop(db);

    let db = Db::open(&Options::default(), &path).unwrap();
    assert_eq!(get(&db, b"b"), Some(b"2".to_vec()));
    assert_eq!(get(&db, b"c"), Some(b"3".to_vec()));
    // Recovered logs were turned into tables and deleted.
    assert_eq!(count_files(&path, "log"), 1);
}

// =============================================================================
// Test 6: Flushed and compacted data survives a reopen
// =============================================================================
#[test]
fn reopen_after_flushes() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("db");
    let value = vec![b'v'; 1000];
    {
        let db = Db::open(&small_buffer_options(), &path).unwrap();
        for i in 0..2000 {
            put(&db, format!("key{i:06}").as_bytes(), &value);
        }
        assert!(files_at_level(&db, 0) + files_at_level(&db, 1) > 0);
    }

    let db = Db::open(&small_buffer_options(), &path).unwrap();
    for i in (0..2000).step_by(97) {
        assert_eq!(get(&db, format!("key{i:06}").as_bytes()), Some(value.clone()));
    }
    assert_eq!(get(&db, b"key999999"), None);
}

// =============================================================================
// Test 7: A database remembers its comparator
// =============================================================================
#[test]
fn comparator_mismatch_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("db");
    let reversed = Options {
        comparator: Arc::new(ReverseComparator),
        ..create_options()
    };
    Db::open(&reversed, &path).unwrap().close().unwrap();

    let err = Db::open(&Options::default(), &path).unwrap_err();
    assert!(err.is_invalid_argument());
    assert!(err.to_string().contains("test.ReverseComparator"), "{err}");

    Db::open(&reversed, &path).unwrap();
}

// =============================================================================
// Test 8: Only one handle may hold a database
// =============================================================================
#[test]
fn second_open_is_refused() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("db");
    let db = Db::open(&create_options(), &path).unwrap();
    assert!(Db::open(&create_options(), &path).unwrap_err().is_io());
    drop(db);
    Db::open(&create_options(), &path).unwrap();
}

// =============================================================================
// Test 9: destroy_db removes the database and tolerates absence
// =============================================================================
#[test]
fn destroy_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("db");
    {
        let db = Db::open(&create_options(), &path).unwrap();
        put(&db, b"k", b"v");
    }
    destroy_db(&Options::default(), &path).unwrap();
    assert!(!path.exists());
    destroy_db(&Options::default(), &path).unwrap();

    assert!(Db::open(&Options::default(), &path).unwrap_err().is_invalid_argument());
    let db = Db::open(&create_options(), &path).unwrap();
    assert_eq!(get(&db, b"k"), None);
}

// =============================================================================
// Test 10: destroy_db refuses an open database
// =============================================================================
#[test]
fn destroy_open_database_fails() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("db");
    let db = Db::open(&create_options(), &path).unwrap();
    put(&db, b"k", b"v");
    assert!(destroy_db(&Options::default(), &path).is_err());
    assert_eq!(get(&db, b"k"), Some(b"v".to_vec()));
}

// =============================================================================
// Test 11: Recognized properties return text, others return None
// =============================================================================
#[test]
fn properties() {
    let dir = TempDir::new().unwrap();
    let db = Db::open(&create_options(), dir.path().join("db")).unwrap();
    put(&db, b"k", b"v");

    assert_eq!(files_at_level(&db, 0), 0);
    assert_eq!(files_at_level(&db, 1), 0);
    assert!(db.get_property("novelsm.num-files-at-level2").is_none());
    assert!(db.get_property("novelsm.num-files-at-levelx").is_none());
    assert!(db.get_property("novelsm.nosuchprop").is_none());
    assert!(db.get_property("stats").is_none());

    let stats = db.get_property("novelsm.stats").unwrap();
    assert!(stats.contains("Compactions"));
    // Without a shared cache each database gets an 8 MiB one.
    assert!(stats.contains("of 8388608 bytes"), "{stats}");
    let usage: usize = db
        .get_property("novelsm.approximate-memory-usage")
        .unwrap()
        .parse()
        .unwrap();
    assert!(usage > 0);

    db.compact_range(None, None).unwrap();
    assert_eq!(files_at_level(&db, 1), 1);
    let sstables = db.get_property("novelsm.sstables").unwrap();
    assert!(sstables.contains("--- level 1 ---"));
    assert!(sstables.contains("'k' @ 1 : Put"), "{sstables}");
}

// =============================================================================
// Test 12: Size estimates cover data on disk
// =============================================================================
#[test]
fn approximate_sizes() {
    let dir = TempDir::new().unwrap();
    let db = Db::open(&small_buffer_options(), dir.path().join("db")).unwrap();
    for i in 0..20_000 {
        let key = format!("k{i:020}");
        let value = format!("v{i:020}");
        put(&db, key.as_bytes(), value.as_bytes());
    }
    db.compact_range(None, None).unwrap();

    let middle = format!("k{:020}", 10_000);
    let sizes = db
        .approximate_sizes(&[
            Range::new(b"a", middle.as_bytes()),
            Range::new(middle.as_bytes(), b"z"),
            Range::new(b"x", b"y"),
        ])
        .unwrap();
    assert!(sizes[0] > 0, "{sizes:?}");
    assert!(sizes[1] > 0, "{sizes:?}");
    assert_eq!(sizes[2], 0);
}

// =============================================================================
// Test 13: Manual compaction drops deleted data and merges level 0
// =============================================================================
#[test]
fn compaction_drops_deleted_data() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("db");
    let db = Db::open(&small_buffer_options(), &path).unwrap();
    let value = vec![b'x'; 500];
    for i in 0..1000 {
        put(&db, format!("key{i:04}").as_bytes(), &value);
    }
    for i in 0..1000 {
        db.delete(&WriteOptions::default(), format!("key{i:04}").as_bytes())
            .unwrap();
    }
    put(&db, b"survivor", b"yes");

    db.compact_range(None, None).unwrap();
    assert_eq!(files_at_level(&db, 0), 0);
    assert_eq!(files_at_level(&db, 1), 1);
    assert_eq!(get(&db, b"key0500"), None);
    assert_eq!(get(&db, b"survivor"), Some(b"yes".to_vec()));
    assert_eq!(count_files(&path, "sst"), 1);
}

// =============================================================================
// Test 14: Level 0 is compacted automatically as it fills up
// =============================================================================
#[test]
fn automatic_compaction_bounds_level0() {
    let dir = TempDir::new().unwrap();
    let db = Db::open(&small_buffer_options(), dir.path().join("db")).unwrap();
    let value = vec![b'y'; 1000];
    for round in 0..5 {
        for i in 0..500 {
            put(&db, format!("key{i:04}").as_bytes(), format!("{round}").as_bytes());
            put(&db, format!("pad{round}-{i:04}").as_bytes(), &value);
        }
        assert!(files_at_level(&db, 0) <= 4);
    }
    assert!(files_at_level(&db, 1) > 0);
    assert_eq!(get(&db, b"key0123"), Some(b"4".to_vec()));
}

// =============================================================================
// Test 15: Version numbers
// =============================================================================
#[test]
fn version_numbers() {
    assert_eq!(major_version(), 1);
    assert!(minor_version() >= 20);
}

// =============================================================================
// Test 16: Size estimates count unflushed data and run alongside writers
// =============================================================================
#[test]
fn approximate_sizes_alongside_writers() {
    let dir = TempDir::new().unwrap();
    let db = Db::open(&small_buffer_options(), dir.path().join("db")).unwrap();
    // Larger than a data block, so it never shares one with other keys.
    put(&db, b"m1", &[b'x'; 5000]);
    let sizes = db.approximate_sizes(&[Range::new(b"m", b"n")]).unwrap();
    assert!(sizes[0] > 0, "memtable data counts: {sizes:?}");

    std::thread::scope(|s| {
        s.spawn(|| {
            for i in 0..3000 {
                put(&db, format!("w{i:05}").as_bytes(), &[b'y'; 100]);
            }
        });
        for _ in 0..50 {
            let sizes = db
                .approximate_sizes(&[Range::new(b"a", b"n"), Range::new(b"w", b"x")])
                .unwrap();
            assert!(sizes[0] > 0, "{sizes:?}");
        }
    });
    let sizes = db.approximate_sizes(&[Range::new(b"w", b"x")]).unwrap();
    assert!(sizes[0] > 0, "{sizes:?}");
}
