// Write-ahead log tests
// Record framing, appends, and replay with torn or damaged tails.

use std::fs::OpenOptions;
use std::io::Write;

use novelsm::wal::{WALReader, WALRecord, WALWriter};
use tempfile::TempDir;

// =============================================================================
// Test 1: A record decodes to its payload and reports its size
// =============================================================================
#[test]
fn record_framing() {
    let encoded = WALRecord::encode(b"payload");
    let (record, used) = WALRecord::decode(&encoded).unwrap();
    assert_eq!(record.payload, b"payload");
    assert_eq!(used, encoded.len());
    assert_eq!(record.encoded_size(), encoded.len());
}

// =============================================================================
// Test 2: Flipped payload byte fails the checksum
// =============================================================================
#[test]
fn corrupted_crc_detected() {
    let mut encoded = WALRecord::encode(b"some payload");
    encoded[10] ^= 0xff;
    assert!(WALRecord::decode(&encoded).unwrap_err().is_corruption());
}

// =============================================================================
// Test 3: Appended records replay in order
// =============================================================================
#[test]
fn writer_then_reader() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("000001.log");
    let mut writer = WALWriter::new(&path).unwrap();
    for i in 0..100u32 {
        writer.append(format!("record {i}").as_bytes(), i % 10 == 0).unwrap();
    }
    writer.sync().unwrap();
    assert_eq!(writer.offset(), std::fs::metadata(&path).unwrap().len());

    let reader = WALReader::new(&path).unwrap();
    let payloads: Vec<Vec<u8>> = reader.iter().map(|r| r.unwrap().payload).collect();
    assert_eq!(payloads.len(), 100);
    assert_eq!(payloads[42], b"record 42");
}

// =============================================================================
// Test 4: Empty log yields nothing
// =============================================================================
#[test]
fn empty_log() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("000001.log");
    WALWriter::new(&path).unwrap();
    let reader = WALReader::new(&path).unwrap();
    assert_eq!(reader.iter().count(), 0);
}

// =============================================================================
// Test 5: A torn tail yields one error after the good records, then stops
// =============================================================================
#[test]
fn torn_tail_stops_replay() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("000001.log");
    let mut writer = WALWriter::new(&path).unwrap();
    writer.append(b"first", false).unwrap();
    writer.append(b"second", true).unwrap();
    drop(writer);

    let mut file = OpenOptions::new().append(true).open(&path).unwrap();
    file.write_all(&WALRecord::encode(b"third")[..6]).unwrap();
    drop(file);

    let reader = WALReader::new(&path).unwrap();
    let results: Vec<_> = reader.iter().collect();
    assert_eq!(results.len(), 3);
    assert_eq!(results[0].as_ref().unwrap().payload, b"first");
    assert_eq!(results[1].as_ref().unwrap().payload, b"second");
    let err = results[2].as_ref().unwrap_err();
    assert!(err.is_corruption());
    assert!(err.to_string().contains("dropping 6 bytes"), "{err}");
}

// =============================================================================
// Test 6: Opening a writer truncates an existing file
// =============================================================================
#[test]
fn new_writer_truncates() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("000001.log");
    let mut writer = WALWriter::new(&path).unwrap();
    writer.append(b"stale", true).unwrap();
    drop(writer);

    let writer = WALWriter::new(&path).unwrap();
    assert_eq!(writer.offset(), 0);
    assert_eq!(writer.path(), path.as_path());
    assert_eq!(WALReader::new(&path).unwrap().iter().count(), 0);
}
