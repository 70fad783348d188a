//! Tests for the Index journal writer and reader
//!
//! These tests verify:
//! - LSN generation and sequencing
//! - Sync strategies (EveryWrite, EveryNEntries)
//! - LSN continuation after reopen
//! - Integration with the reader

use std::path::PathBuf;

use emberkv::config::SyncStrategy;
use emberkv::index::{EntryDescriptor, IndexOp, IndexReader, IndexWriter};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_temp_journal() -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("test.idx");
    (temp_dir, path)
}

fn add(key: &str, offset: u64) -> IndexOp {
    IndexOp::Add(EntryDescriptor::scalar(key, offset, 4, 0))
}

// =============================================================================
// Basic Writing Tests
// =============================================================================

#[test]
fn test_write_single_record() {
    let (_temp, path) = setup_temp_journal();
    let mut writer = IndexWriter::open(&path, SyncStrategy::EveryWrite).unwrap();

    let lsn = writer.append(add("k", 24)).unwrap();

    assert_eq!(lsn, 1);
    assert_eq!(writer.current_lsn(), 2);
    assert!(path.exists());
}

#[test]
fn test_lsn_sequential() {
    let (_temp, path) = setup_temp_journal();
    let mut writer = IndexWriter::open(&path, SyncStrategy::EveryWrite).unwrap();

    let lsns: Vec<u64> = (0..5)
        .map(|i| writer.append(add(&format!("k{}", i), 24 + i)).unwrap())
        .collect();

    assert_eq!(lsns, vec![1, 2, 3, 4, 5]);
}

#[test]
fn test_reopen_continues_lsn() {
    let (_temp, path) = setup_temp_journal();
    {
        let mut writer = IndexWriter::open(&path, SyncStrategy::EveryWrite).unwrap();
        writer.append(add("a", 24)).unwrap();
        writer.append(add("b", 36)).unwrap();
    }

    let mut writer = IndexWriter::open(&path, SyncStrategy::EveryWrite).unwrap();
    assert_eq!(writer.current_lsn(), 3);
    assert_eq!(writer.append(add("c", 48)).unwrap(), 3);
}

// =============================================================================
// Sync Strategy Tests
// =============================================================================

#[test]
fn test_sync_every_write() {
    let (_temp, path) = setup_temp_journal();
    let mut writer = IndexWriter::open(&path, SyncStrategy::EveryWrite).unwrap();

    writer.append(add("k", 24)).unwrap();
    assert_eq!(writer.uncommitted_count(), 0);
}

#[test]
fn test_sync_every_n_entries() {
    let (_temp, path) = setup_temp_journal();
    let mut writer =
        IndexWriter::open(&path, SyncStrategy::EveryNEntries { count: 3 }).unwrap();

    writer.append(add("a", 24)).unwrap();
    writer.append(add("b", 36)).unwrap();
    assert_eq!(writer.uncommitted_count(), 2);

    writer.append(add("c", 48)).unwrap();
    assert_eq!(writer.uncommitted_count(), 0);
}

#[test]
fn test_manual_sync() {
    let (_temp, path) = setup_temp_journal();
    let mut writer =
        IndexWriter::open(&path, SyncStrategy::EveryNEntries { count: 100 }).unwrap();

    writer.append(add("a", 24)).unwrap();
    assert_eq!(writer.uncommitted_count(), 1);

    writer.sync().unwrap();
    assert_eq!(writer.uncommitted_count(), 0);
}

// =============================================================================
// Writer + Reader Integration Tests
// =============================================================================

#[test]
fn test_write_then_read() {
    let (_temp, path) = setup_temp_journal();
    let ops = vec![
        add("a", 24),
        IndexOp::Expire {
            key: "a".to_string(),
            expire_at: 99,
        },
        IndexOp::Remove(EntryDescriptor::scalar("a", 24, 4, 0)),
    ];

    {
        let mut writer =
            IndexWriter::open(&path, SyncStrategy::EveryNEntries { count: 100 }).unwrap();
        for op in &ops {
            writer.append(op.clone()).unwrap();
        }
        // Dropping the writer flushes the unsynced tail
    }

    let mut reader = IndexReader::open(&path).unwrap();
    for (i, op) in ops.iter().enumerate() {
        let record = reader.next_entry().unwrap().unwrap();
        assert_eq!(record.lsn, i as u64 + 1);
        assert_eq!(&record.op, op);
    }
    assert!(reader.next_entry().unwrap().is_none());
}

#[test]
fn test_iterator_reads_all_records() {
    let (_temp, path) = setup_temp_journal();
    {
        let mut writer = IndexWriter::open(&path, SyncStrategy::EveryWrite).unwrap();
        for i in 0..50 {
            writer.append(add(&format!("key{}", i), 24 + i * 12)).unwrap();
        }
    }

    let records: Vec<_> = IndexReader::open(&path)
        .unwrap()
        .entries()
        .collect::<Result<_, _>>()
        .unwrap();

    assert_eq!(records.len(), 50);
    assert!(records.windows(2).all(|w| w[1].lsn == w[0].lsn + 1));
}

#[test]
fn test_reader_position_tracks_valid_bytes() {
    let (_temp, path) = setup_temp_journal();
    {
        let mut writer = IndexWriter::open(&path, SyncStrategy::EveryWrite).unwrap();
        writer.append(add("a", 24)).unwrap();
        writer.append(add("b", 36)).unwrap();
    }

    let mut reader = IndexReader::open(&path).unwrap();
    while reader.next_entry().unwrap().is_some() {}

    assert_eq!(reader.position(), std::fs::metadata(&path).unwrap().len());
}
