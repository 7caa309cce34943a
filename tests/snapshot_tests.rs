// Snapshot tests
// Point-in-time reads, release, and snapshots surviving compaction.

use novelsm::{Db, Options, ReadOptions, WriteOptions};
use tempfile::TempDir;

fn open(dir: &TempDir) -> Db {
    let options = Options {
        create_if_missing: true,
        write_buffer_size: 100_000,
        ..Options::default()
    };
    Db::open(&options, dir.path().join("db")).unwrap()
}

fn put(db: &Db, key: &[u8], value: &[u8]) {
    db.put(&WriteOptions::default(), key, value).unwrap();
}

fn at(snapshot: &novelsm::Snapshot) -> ReadOptions {
    ReadOptions {
        snapshot: Some(snapshot.clone()),
        ..ReadOptions::default()
    }
}

// =============================================================================
// Test 1: Reads through a snapshot ignore later writes
// =============================================================================
#[test]
fn snapshot_hides_later_writes() {
    let dir = TempDir::new().unwrap();
    let db = open(&dir);
    put(&db, b"foo", b"hello");
    let snap = db.snapshot();

    put(&db, b"foo", b"world");
    db.delete(&WriteOptions::default(), b"foo").unwrap();
    put(&db, b"bar", b"new");

    assert_eq!(db.get(&at(&snap), b"foo").unwrap(), Some(b"hello".to_vec()));
    assert_eq!(db.get(&at(&snap), b"bar").unwrap(), None);
    assert_eq!(db.get(&ReadOptions::default(), b"foo").unwrap(), None);

    let mut it = db.new_iterator(&at(&snap));
    it.seek_to_first();
    assert_eq!(it.key(), b"foo");
    assert_eq!(it.value(), b"hello");
    it.next();
    assert!(!it.is_valid());

    db.release_snapshot(snap);
}

// =============================================================================
// Test 2: Snapshots keep their data through flushes and compactions
// =============================================================================
#[test]
fn snapshot_survives_compaction() {
    let dir = TempDir::new().unwrap();
    let db = open(&dir);
    for i in 0..200 {
        put(&db, format!("k{i:03}").as_bytes(), b"v1");
    }
    let snap = db.snapshot();

    let big = vec![b'x'; 1000];
    for i in 0..200 {
        put(&db, format!("k{i:03}").as_bytes(), &big);
        db.delete(&WriteOptions::default(), format!("k{i:03}").as_bytes())
            .unwrap();
    }
    db.compact_range(None, None).unwrap();

    for i in (0..200).step_by(17) {
        let key = format!("k{i:03}");
        assert_eq!(db.get(&at(&snap), key.as_bytes()).unwrap(), Some(b"v1".to_vec()));
        assert_eq!(db.get(&ReadOptions::default(), key.as_bytes()).unwrap(), None);
    }

    // Once released, compaction may discard the old versions.
    db.release_snapshot(snap);
    db.compact_range(None, None).unwrap();
    assert_eq!(
        db.get_property("novelsm.num-files-at-level1").as_deref(),
        Some("0")
    );
}

// =============================================================================
// Test 3: Snapshot sequence numbers track the write count
// =============================================================================
#[test]
fn snapshot_sequence() {
    let dir = TempDir::new().unwrap();
    let db = open(&dir);
    let s0 = db.snapshot();
    put(&db, b"a", b"1");
    put(&db, b"b", b"2");
    let s2 = db.snapshot();
    assert_eq!(s2.sequence(), s0.sequence() + 2);

    // Clones share one registration.
    let clone = s2.clone();
    drop(s2);
    assert_eq!(db.get(&at(&clone), b"b").unwrap(), Some(b"2".to_vec()));
    assert_eq!(db.get(&at(&s0), b"a").unwrap(), None);
}

// =============================================================================
// Test 4: A snapshot from another database is rejected
// =============================================================================
#[test]
fn foreign_snapshot_is_rejected() {
    let dir_a = TempDir::new().unwrap();
    let dir_b = TempDir::new().unwrap();
    let a = open(&dir_a);
    let b = open(&dir_b);
    let snap = a.snapshot();

    let err = b.get(&at(&snap), b"k").unwrap_err();
    assert!(err.is_invalid_argument());

    let mut it = b.new_iterator(&at(&snap));
    it.seek_to_first();
    assert!(!it.is_valid());
    assert!(it.status().unwrap_err().is_invalid_argument());
}

// =============================================================================
// Test 5: Snapshots can be used from other threads
// =============================================================================
#[test]
fn snapshot_is_shareable() {
    let dir = TempDir::new().unwrap();
    let db = open(&dir);
    put(&db, b"k", b"before");
    let snap = db.snapshot();
    put(&db, b"k", b"after");

    std::thread::scope(|s| {
        for _ in 0..4 {
            let db = &db;
            let snap = snap.clone();
            s.spawn(move || {
                let opts = ReadOptions {
                    snapshot: Some(snap),
                    ..ReadOptions::default()
                };
                assert_eq!(db.get(&opts, b"k").unwrap(), Some(b"before".to_vec()));
            });
        }
    });
}
