//! Tests for Index journal recovery
//!
//! These tests verify:
//! - Recovery from a clean journal
//! - Recovery from an empty or missing journal
//! - Partial writes at the tail (truncated and cut off)
//! - Corrupted records (CRC mismatch) stop replay
//! - Verify mode (stats only, file untouched)

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

use emberkv::config::SyncStrategy;
use emberkv::index::{EntryDescriptor, IndexOp, IndexRecord, IndexRecovery, IndexWriter};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_temp_journal() -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("test.idx");
    (temp_dir, path)
}

/// Write well-formed records through the writer
fn write_records(path: &PathBuf, count: u64) {
    let mut writer = IndexWriter::open(path, SyncStrategy::EveryWrite).unwrap();
    for i in 0..count {
        writer
            .append(IndexOp::Add(EntryDescriptor::scalar(
                &format!("key{}", i),
                24 + i * 16,
                8,
                0,
            )))
            .unwrap();
    }
}

fn append_raw(path: &PathBuf, bytes: &[u8]) {
    let mut file = OpenOptions::new().append(true).open(path).unwrap();
    file.write_all(bytes).unwrap();
    file.sync_all().unwrap();
}

fn file_len(path: &PathBuf) -> u64 {
    std::fs::metadata(path).unwrap().len()
}

// =============================================================================
// Clean Journal Tests
// =============================================================================

#[test]
fn test_recover_missing_file() {
    let (_temp, path) = setup_temp_journal();

    let (records, result) = IndexRecovery::recover(&path).unwrap();

    assert!(records.is_empty());
    assert_eq!(result.entries_recovered, 0);
    assert_eq!(result.last_lsn, 0);
    assert!(!result.was_truncated);
}

#[test]
fn test_recover_empty_file() {
    let (_temp, path) = setup_temp_journal();
    File::create(&path).unwrap();

    let (records, result) = IndexRecovery::recover(&path).unwrap();

    assert!(records.is_empty());
    assert_eq!(result.entries_recovered, 0);
    assert!(!result.was_truncated);
}

#[test]
fn test_recover_multiple_records() {
    let (_temp, path) = setup_temp_journal();
    write_records(&path, 10);

    let (records, result) = IndexRecovery::recover(&path).unwrap();

    assert_eq!(records.len(), 10);
    assert_eq!(result.entries_recovered, 10);
    assert_eq!(result.entries_corrupted, 0);
    assert_eq!(result.last_lsn, 10);
    assert_eq!(result.valid_len, file_len(&path));
    assert!(!result.was_truncated);
}

// =============================================================================
// Damaged Tail Tests
// =============================================================================

#[test]
fn test_recover_partial_header_at_tail() {
    let (_temp, path) = setup_temp_journal();
    write_records(&path, 3);
    let valid_len = file_len(&path);

    append_raw(&path, &[0x01, 0x02, 0x03, 0x04, 0x05]);

    let (records, result) = IndexRecovery::recover(&path).unwrap();

    assert_eq!(records.len(), 3);
    assert!(result.was_truncated);
    assert_eq!(result.valid_len, valid_len);
    // The damaged tail is cut off so new appends follow valid data
    assert_eq!(file_len(&path), valid_len);
}

#[test]
fn test_recover_partial_data_at_tail() {
    let (_temp, path) = setup_temp_journal();
    write_records(&path, 2);
    let valid_len = file_len(&path);

    let next = IndexRecord::new(3, IndexOp::Add(EntryDescriptor::scalar("late", 999, 8, 0)))
        .serialize()
        .unwrap();
    append_raw(&path, &next[..next.len() - 4]);

    let (records, result) = IndexRecovery::recover(&path).unwrap();

    assert_eq!(records.len(), 2);
    assert_eq!(result.last_lsn, 2);
    assert!(result.was_truncated);
    assert_eq!(file_len(&path), valid_len);
}

#[test]
fn test_recover_corrupted_record_stops_replay() {
    let (_temp, path) = setup_temp_journal();
    write_records(&path, 2);

    let mut bad = IndexRecord::new(3, IndexOp::Add(EntryDescriptor::scalar("bad", 1, 1, 0)))
        .serialize()
        .unwrap();
    let last = bad.len() - 1;
    bad[last] ^= 0xFF;
    append_raw(&path, &bad);

    // A valid record after the corrupt one is not replayed
    let good = IndexRecord::new(4, IndexOp::Add(EntryDescriptor::scalar("good", 2, 1, 0)))
        .serialize()
        .unwrap();
    append_raw(&path, &good);

    let (records, result) = IndexRecovery::recover(&path).unwrap();

    assert_eq!(records.len(), 2);
    assert_eq!(result.entries_corrupted, 1);
    assert_eq!(result.last_lsn, 2);
    assert!(result.was_truncated);
}

#[test]
fn test_recover_is_idempotent() {
    let (_temp, path) = setup_temp_journal();
    write_records(&path, 4);
    append_raw(&path, &[0xFF; 7]);

    let (first, _) = IndexRecovery::recover(&path).unwrap();
    let (second, result) = IndexRecovery::recover(&path).unwrap();

    assert_eq!(first, second);
    assert!(!result.was_truncated);
}

// =============================================================================
// Verify Tests
// =============================================================================

#[test]
fn test_verify_clean_journal() {
    let (_temp, path) = setup_temp_journal();
    write_records(&path, 5);

    let result = IndexRecovery::verify(&path).unwrap();

    assert_eq!(result.entries_recovered, 5);
    assert!(!result.was_truncated);
}

#[test]
fn test_verify_does_not_modify_file() {
    let (_temp, path) = setup_temp_journal();
    write_records(&path, 3);
    append_raw(&path, &[0xAA; 9]);
    let len_before = file_len(&path);

    let result = IndexRecovery::verify(&path).unwrap();

    assert!(result.was_truncated);
    assert_eq!(result.entries_recovered, 3);
    assert_eq!(file_len(&path), len_before);
}

#[test]
fn test_recover_and_verify_agree() {
    let (_temp, path) = setup_temp_journal();
    write_records(&path, 6);

    let verified = IndexRecovery::verify(&path).unwrap();
    let (_, recovered) = IndexRecovery::recover(&path).unwrap();

    assert_eq!(verified, recovered);
}
