use std::collections::BTreeMap;

use proptest::prelude::*;

use novelsm::{Db, Options, ReadOptions, Snapshot, WriteBatch, WriteOptions};

#[derive(Debug, Clone)]
enum MiniOp {
    Put { key: u8, value: u8 },
    Del { key: u8 },
}

#[derive(Debug, Clone)]
enum Step {
    Batch(Vec<MiniOp>),
    Snapshot,
    Compact,
    Reopen,
}

const KEY_SPACE: u8 = 12;

type Model = BTreeMap<Vec<u8>, Vec<(u64, Option<Vec<u8>>)>>;

fn options() -> Options {
    Options {
        create_if_missing: true,
        write_buffer_size: 64 * 1024,
        ..Options::default()
    }
}

fn key_bytes(key: u8) -> Vec<u8> {
    format!("key-{:02}", key % KEY_SPACE).into_bytes()
}

fn value_bytes(value: u8) -> Vec<u8> {
    // Some large values so that flushes happen.
    let len = if value % 4 == 0 { 8000 } else { 4 };
    let mut v = vec![b'0' + (value % 10); len];
    v[0] = value;
    v
}

fn model_get(model: &Model, key: &[u8], sequence: u64) -> Option<Vec<u8>> {
    let versions = model.get(key)?;
    versions
        .iter()
        .rev()
        .find(|(seq, _)| *seq <= sequence)
        .and_then(|(_, value)| value.clone())
}

fn model_scan(model: &Model, sequence: u64) -> Vec<(Vec<u8>, Vec<u8>)> {
    model
        .keys()
        .filter_map(|k| model_get(model, k, sequence).map(|v| (k.clone(), v)))
        .collect()
}

fn db_scan(db: &Db, snapshot: Option<&Snapshot>) -> Vec<(Vec<u8>, Vec<u8>)> {
    let opts = ReadOptions {
        snapshot: snapshot.cloned(),
        ..ReadOptions::default()
    };
    let mut it = db.new_iterator(&opts);
    let mut out = Vec::new();
    it.seek_to_first();
    while it.is_valid() {
        out.push((it.key().to_vec(), it.value().to_vec()));
        it.next();
    }
    it.status().unwrap();
    out
}

fn mini_op() -> impl Strategy<Value = MiniOp> {
    prop_oneof![
        3 => (any::<u8>(), any::<u8>()).prop_map(|(key, value)| MiniOp::Put { key, value }),
        1 => any::<u8>().prop_map(|key| MiniOp::Del { key }),
    ]
}

fn step_strategy() -> impl Strategy<Value = Step> {
    prop_oneof![
        8 => prop::collection::vec(mini_op(), 1..6).prop_map(Step::Batch),
        1 => Just(Step::Snapshot),
        1 => Just(Step::Compact),
        1 => Just(Step::Reopen),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig { cases: 32, .. ProptestConfig::default() })]

    #[test]
    fn db_matches_reference_model(steps in prop::collection::vec(step_strategy(), 1..60)) {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("db");
        let mut db = Db::open(&options(), &path).unwrap();

        let mut sequence = 0u64;
        let mut model = Model::new();
        let mut snapshots: Vec<(Snapshot, u64)> = Vec::new();

        for step in &steps {
            match step {
                Step::Batch(ops) => {
                    let mut batch = WriteBatch::new();
                    for op in ops {
                        sequence += 1;
                        match op {
                            MiniOp::Put { key, value } => {
                                batch.put(&key_bytes(*key), &value_bytes(*value));
                                model.entry(key_bytes(*key)).or_default()
                                    .push((sequence, Some(value_bytes(*value))));
                            }
                            MiniOp::Del { key } => {
                                batch.delete(&key_bytes(*key));
                                model.entry(key_bytes(*key)).or_default().push((sequence, None));
                            }
                        }
                    }
                    db.write(&WriteOptions::default(), &batch).unwrap();
                }
                Step::Snapshot => {
                    let snapshot = db.snapshot();
                    prop_assert_eq!(snapshot.sequence(), sequence);
                    snapshots.push((snapshot, sequence));
                }
                Step::Compact => db.compact_range(None, None).unwrap(),
                Step::Reopen => {
                    // Snapshots do not survive a reopen.
                    snapshots.clear();
                    drop(db);
                    db = Db::open(&options(), &path).unwrap();
                }
            }

            for key in 0..KEY_SPACE {
                let k = key_bytes(key);
                let got = db.get(&ReadOptions::default(), &k).unwrap();
                prop_assert_eq!(got, model_get(&model, &k, sequence));
            }
        }

        prop_assert_eq!(db_scan(&db, None), model_scan(&model, sequence));
        for (snapshot, seq) in &snapshots {
            prop_assert_eq!(db_scan(&db, Some(snapshot)), model_scan(&model, *seq));
        }
    }
}
