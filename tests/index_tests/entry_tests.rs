//! Tests for Index journal records
//!
//! These tests verify:
//! - Serialize/deserialize of every operation
//! - CRC validation of the data section
//! - Header/length/LSN consistency checks

use emberkv::error::EmberError;
use emberkv::index::{EntryDescriptor, IndexOp, IndexRecord, HEADER_SIZE};

// =============================================================================
// Round-trip Tests
// =============================================================================

#[test]
fn test_serialize_deserialize_add() {
    let op = IndexOp::Add(EntryDescriptor::scalar("user:1", 24, 11, 0));
    let record = IndexRecord::new(1, op.clone());

    let bytes = record.serialize().unwrap();
    let decoded = IndexRecord::deserialize(&bytes).unwrap();

    assert_eq!(decoded.lsn, 1);
    assert_eq!(decoded.op, op);
    assert_eq!(decoded.timestamp, record.timestamp);
}

#[test]
fn test_serialize_deserialize_every_op() {
    let ops = vec![
        IndexOp::Add(EntryDescriptor::list_element("L", 100, 3, 0)),
        IndexOp::Update {
            previous_offset: 100,
            descriptor: EntryDescriptor::hash_field("h", "name", 400, 9, 1_700_000_000_000),
        },
        IndexOp::Remove(EntryDescriptor::scalar("k", 24, 5, 0)),
        IndexOp::Expire {
            key: "k".to_string(),
            expire_at: 42,
        },
    ];

    for (i, op) in ops.into_iter().enumerate() {
        let lsn = i as u64 + 1;
        let bytes = IndexRecord::new(lsn, op.clone()).serialize().unwrap();
        let decoded = IndexRecord::deserialize(&bytes).unwrap();
        assert_eq!(decoded.lsn, lsn);
        assert_eq!(decoded.op, op);
    }
}

#[test]
fn test_header_layout() {
    let record = IndexRecord::new(7, IndexOp::Add(EntryDescriptor::scalar("k", 24, 1, 0)));
    let bytes = record.serialize().unwrap();

    let lsn = u64::from_le_bytes(bytes[0..8].try_into().unwrap());
    let crc = u32::from_le_bytes(bytes[8..12].try_into().unwrap());
    let len = u32::from_le_bytes(bytes[12..16].try_into().unwrap());

    assert_eq!(lsn, 7);
    assert_eq!(len as usize, bytes.len() - HEADER_SIZE);
    assert_eq!(crc, crc32fast::hash(&bytes[HEADER_SIZE..]));
}

// =============================================================================
// Corruption Tests
// =============================================================================

#[test]
fn test_crc_corruption_detected() {
    let record = IndexRecord::new(1, IndexOp::Add(EntryDescriptor::scalar("key", 24, 5, 0)));
    let mut bytes = record.serialize().unwrap();

    let last = bytes.len() - 1;
    bytes[last] ^= 0xFF;

    let result = IndexRecord::deserialize(&bytes);
    assert!(matches!(result, Err(EmberError::IndexCorruption(_))));
}

#[test]
fn test_lsn_mismatch_detected() {
    let record = IndexRecord::new(5, IndexOp::Add(EntryDescriptor::scalar("key", 24, 5, 0)));
    let mut bytes = record.serialize().unwrap();

    // The CRC covers the data only, so a rewritten header LSN must still be caught
    bytes[0..8].copy_from_slice(&6u64.to_le_bytes());

    let result = IndexRecord::deserialize(&bytes);
    assert!(matches!(result, Err(EmberError::IndexCorruption(_))));
}

#[test]
fn test_truncated_record() {
    let record = IndexRecord::new(1, IndexOp::Add(EntryDescriptor::scalar("key", 24, 5, 0)));
    let bytes = record.serialize().unwrap();

    let result = IndexRecord::deserialize(&bytes[..bytes.len() - 3]);
    assert!(matches!(result, Err(EmberError::IndexCorruption(_))));
}

#[test]
fn test_header_too_small() {
    let result = IndexRecord::deserialize(&[0u8; HEADER_SIZE - 1]);
    assert!(matches!(result, Err(EmberError::IndexCorruption(_))));
}

#[test]
fn test_empty_buffer() {
    let result = IndexRecord::deserialize(&[]);
    assert!(matches!(result, Err(EmberError::IndexCorruption(_))));
}
