//! Tests for the Index Log (journal + in-memory index)
//!
//! These tests verify:
//! - Mutations are visible immediately and survive replay
//! - Replay from empty state is deterministic
//! - A damaged tail yields a partial-recovery warning, not a failure
//! - Appends after a truncated tail land after the valid prefix

use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

use emberkv::config::SyncStrategy;
use emberkv::error::EmberError;
use emberkv::index::{EntryDescriptor, IndexLog, Kind, Structure};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_temp_journal() -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("list.idx");
    (temp_dir, path)
}

fn open_list_log(path: &PathBuf) -> IndexLog {
    IndexLog::open(path, Kind::List, SyncStrategy::EveryWrite, 16).unwrap()
}

fn list_offsets(log: &IndexLog, key: &str) -> Vec<u64> {
    match log.read().get(key) {
        Some(Structure::List(items)) => items.iter().map(|d| d.offset).collect(),
        Some(other) => panic!("unexpected structure: {:?}", other),
        None => Vec::new(),
    }
}

// =============================================================================
// Live Mutation Tests
// =============================================================================

#[test]
fn test_add_is_visible_immediately() {
    let (_temp, path) = setup_temp_journal();
    let log = open_list_log(&path);

    log.add(EntryDescriptor::list_element("L", 24, 2, 0)).unwrap();
    log.add(EntryDescriptor::list_element("L", 34, 2, 0)).unwrap();

    assert_eq!(list_offsets(&log, "L"), vec![24, 34]);
    assert_eq!(log.key_count(), 1);
}

#[test]
fn test_write_guard_expire() {
    let (_temp, path) = setup_temp_journal();
    let log = open_list_log(&path);

    log.add(EntryDescriptor::list_element("L", 24, 2, 0)).unwrap();
    {
        let mut index = log.write();
        index.expire("L", 12_345).unwrap();
        assert_eq!(index.expire_at("L"), Some(12_345));
    }

    assert_eq!(log.read().expire_at("L"), Some(12_345));
}

// =============================================================================
// Replay Tests
// =============================================================================

#[test]
fn test_replay_rebuilds_state() {
    let (_temp, path) = setup_temp_journal();
    {
        let log = open_list_log(&path);
        log.add(EntryDescriptor::list_element("L", 24, 2, 0)).unwrap();
        log.add(EntryDescriptor::list_element("L", 34, 2, 0)).unwrap();
        log.add(EntryDescriptor::list_element("M", 44, 2, 0)).unwrap();
        log.update(24, EntryDescriptor::list_element("L", 54, 9, 0)).unwrap();
        log.remove(EntryDescriptor::list_element("M", 44, 2, 0)).unwrap();
    }

    let log = open_list_log(&path);
    assert_eq!(log.key_count(), 0);

    let outcome = log.recover().unwrap();

    assert_eq!(outcome.kind, Kind::List);
    assert_eq!(outcome.records_replayed, 5);
    assert_eq!(outcome.keys_restored, 1);
    assert!(outcome.warning.is_none());
    assert_eq!(list_offsets(&log, "L"), vec![54, 34]);
    assert!(!log.read().contains("M"));
}

#[test]
fn test_replay_is_deterministic() {
    let (_temp, path) = setup_temp_journal();
    {
        let log = open_list_log(&path);
        for i in 0..20u64 {
            log.add(EntryDescriptor::list_element(&format!("k{}", i % 3), 24 + i * 10, 2, 0))
                .unwrap();
        }
        log.write().expire("k1", 99_999_999_999_999).unwrap();
    }

    let log = open_list_log(&path);
    log.recover().unwrap();
    let first = log.read().clone();

    log.recover().unwrap();
    let second = log.read().clone();

    assert_eq!(first, second);
    assert_eq!(first.key_count(), 3);
    assert_eq!(first.expire_at("k1"), Some(99_999_999_999_999));
}

// =============================================================================
// Partial Recovery Tests
// =============================================================================

#[test]
fn test_damaged_tail_is_partial_recovery() {
    let (_temp, path) = setup_temp_journal();
    {
        let log = open_list_log(&path);
        log.add(EntryDescriptor::list_element("L", 24, 2, 0)).unwrap();
        log.add(EntryDescriptor::list_element("L", 34, 2, 0)).unwrap();
    }
    {
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(&[0xDE, 0xAD, 0xBE, 0xEF, 0x00, 0x01]).unwrap();
    }

    let log = open_list_log(&path);
    let outcome = log.recover().unwrap();

    assert!(matches!(outcome.warning, Some(EmberError::PartialRecovery(_))));
    assert_eq!(outcome.records_replayed, 2);
    assert_eq!(list_offsets(&log, "L"), vec![24, 34]);
}

#[test]
fn test_appends_after_truncated_tail_survive() {
    let (_temp, path) = setup_temp_journal();
    {
        let log = open_list_log(&path);
        log.add(EntryDescriptor::list_element("L", 24, 2, 0)).unwrap();
    }
    {
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(&[0xFF; 11]).unwrap();
    }
    {
        let log = open_list_log(&path);
        log.recover().unwrap();
        log.add(EntryDescriptor::list_element("L", 34, 2, 0)).unwrap();
    }

    let log = open_list_log(&path);
    let outcome = log.recover().unwrap();

    assert!(outcome.warning.is_none());
    assert_eq!(outcome.records_replayed, 2);
    assert_eq!(list_offsets(&log, "L"), vec![24, 34]);
}
