// WriteBatch tests
// Building batches, replaying them through handlers, and appending.

use novelsm::{BatchHandler, BatchOp, WriteBatch};

#[derive(Default)]
struct Recorder {
    ops: Vec<String>,
}

impl BatchHandler for Recorder {
    fn put(&mut self, key: &[u8], value: &[u8]) {
        self.ops.push(format!(
            "Put({}, {})",
            String::from_utf8_lossy(key),
            String::from_utf8_lossy(value)
        ));
    }

    fn delete(&mut self, key: &[u8]) {
        self.ops.push(format!("Delete({})", String::from_utf8_lossy(key)));
    }
}

fn replay(batch: &WriteBatch) -> Vec<String> {
    let mut recorder = Recorder::default();
    batch.iterate(&mut recorder).unwrap();
    recorder.ops
}

// =============================================================================
// Test 1: Empty batch
// =============================================================================
#[test]
fn empty_batch() {
    let batch = WriteBatch::new();
    assert!(batch.is_empty());
    assert_eq!(batch.count(), 0);
    assert!(replay(&batch).is_empty());
}

// =============================================================================
// Test 2: Records replay in append order
// =============================================================================
#[test]
fn handler_sees_append_order() {
    let mut batch = WriteBatch::new();
    batch.put(b"foo", b"bar");
    batch.delete(b"box");
    batch.put(b"baz", b"boo");
    assert_eq!(batch.count(), 3);
    assert_eq!(
        replay(&batch),
        vec!["Put(foo, bar)", "Delete(box)", "Put(baz, boo)"]
    );
}

// =============================================================================
// Test 3: Typed iteration yields the same records
// =============================================================================
#[test]
fn typed_iteration() {
    let mut batch = WriteBatch::new();
    batch.put(b"k", b"");
    batch.delete(b"");
    let ops: Vec<BatchOp<'_>> = batch.iter().map(Result::unwrap).collect();
    assert_eq!(
        ops,
        vec![
            BatchOp::Put { key: b"k", value: b"" },
            BatchOp::Delete { key: b"" },
        ]
    );
}

// =============================================================================
// Test 4: clear empties the batch for reuse
// =============================================================================
#[test]
fn clear_resets() {
    let mut batch = WriteBatch::new();
    batch.put(b"a", b"1");
    let empty_size = WriteBatch::new().approximate_size();
    assert!(batch.approximate_size() > empty_size);

    batch.clear();
    assert_eq!(batch.count(), 0);
    assert_eq!(batch.approximate_size(), empty_size);
    batch.put(b"b", b"2");
    assert_eq!(replay(&batch), vec!["Put(b, 2)"]);
}

// =============================================================================
// Test 5: append concatenates records and counts
// =============================================================================
#[test]
fn append_concatenates() {
    let mut a = WriteBatch::new();
    let mut b = WriteBatch::new();
    a.append(&b);
    assert!(a.is_empty());

    b.put(b"x", b"1");
    a.append(&b);
    assert_eq!(replay(&a), vec!["Put(x, 1)"]);

    b.clear();
    b.delete(b"y");
    b.put(b"z", b"2");
    a.put(b"w", b"0");
    a.append(&b);
    assert_eq!(a.count(), 4);
    assert_eq!(
        replay(&a),
        vec!["Put(x, 1)", "Put(w, 0)", "Delete(y)", "Put(z, 2)"]
    );
}
