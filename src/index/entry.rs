//! Index journal entry definitions
//!
//! Defines entry descriptors and the records appended to the index journal.

use serde::{Deserialize, Serialize};

use crate::clock::now_millis;
use crate::error::{EmberError, Result};

/// Size of the record header: LSN (8) + CRC (4) + Len (4)
pub const HEADER_SIZE: usize = 16;

/// Structural kind of a stored key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Kind {
    Scalar,
    List,
    Hash,
}

impl Kind {
    /// All kinds, in the order the engine opens and recovers them
    pub const ALL: [Kind; 3] = [Kind::Scalar, Kind::List, Kind::Hash];

    /// Stable lowercase name, used for file names and `TYPE` replies
    pub fn name(&self) -> &'static str {
        match self {
            Kind::Scalar => "string",
            Kind::List => "list",
            Kind::Hash => "hash",
        }
    }

    /// File stem for this kind's value log and index journal
    pub fn file_stem(&self) -> &'static str {
        match self {
            Kind::Scalar => "scalar",
            Kind::List => "list",
            Kind::Hash => "hash",
        }
    }
}

/// Metadata locating one stored value in the value log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryDescriptor {
    pub key: String,
    pub kind: Kind,
    /// Hash field name; `None` for scalar values and list elements
    pub field: Option<String>,
    pub offset: u64,
    pub length: u32,
    /// Unix millis; 0 means the key never expires
    pub expire_at: u64,
}

impl EntryDescriptor {
    pub fn scalar(key: &str, offset: u64, length: u32, expire_at: u64) -> Self {
        Self {
            key: key.to_string(),
            kind: Kind::Scalar,
            field: None,
            offset,
            length,
            expire_at,
        }
    }

    pub fn list_element(key: &str, offset: u64, length: u32, expire_at: u64) -> Self {
        Self {
            key: key.to_string(),
            kind: Kind::List,
            field: None,
            offset,
            length,
            expire_at,
        }
    }

    pub fn hash_field(key: &str, field: &str, offset: u64, length: u32, expire_at: u64) -> Self {
        Self {
            key: key.to_string(),
            kind: Kind::Hash,
            field: Some(field.to_string()),
            offset,
            length,
            expire_at,
        }
    }

    /// The `(offset, length)` location of the payload
    pub fn location(&self) -> (u64, u32) {
        (self.offset, self.length)
    }
}

/// Index mutations that can be journaled
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum IndexOp {
    /// A new descriptor (new key, list element or hash field)
    Add(EntryDescriptor),

    /// A descriptor's payload moved or changed size.
    /// `previous_offset` identifies the replaced list element.
    Update {
        previous_offset: u64,
        descriptor: EntryDescriptor,
    },

    /// A descriptor was dropped
    Remove(EntryDescriptor),

    /// A key's expiry changed without touching its payload
    Expire { key: String, expire_at: u64 },
}

/// A single record in the index journal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexRecord {
    /// Log Sequence Number - monotonically increasing
    pub lsn: u64,

    /// The mutation to replay
    pub op: IndexOp,

    /// Timestamp (unix millis) when the record was created
    pub timestamp: u64,
}

impl IndexRecord {
    /// Create a new record stamped with the current time
    pub fn new(lsn: u64, op: IndexOp) -> Self {
        Self {
            lsn,
            op,
            timestamp: now_millis(),
        }
    }

    /// Serialize into `[LSN (8)][CRC (4)][Len (4)][Data]`
    ///
    /// The CRC covers the bincode data section only.
    pub fn serialize(&self) -> Result<Vec<u8>> {
        let data = bincode::serialize(self)
            .map_err(|e| EmberError::Serialization(e.to_string()))?;

        let len = u32::try_from(data.len()).map_err(|_| {
            EmberError::Serialization(format!("Index record too large: {} bytes", data.len()))
        })?;
        let crc = crc32fast::hash(&data);

        let mut bytes = Vec::with_capacity(HEADER_SIZE + data.len());
        bytes.extend_from_slice(&self.lsn.to_le_bytes());
        bytes.extend_from_slice(&crc.to_le_bytes());
        bytes.extend_from_slice(&len.to_le_bytes());
        bytes.extend_from_slice(&data);

        Ok(bytes)
    }

    /// Deserialize a complete record, verifying its checksum
    pub fn deserialize(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_SIZE {
            return Err(EmberError::IndexCorruption(format!(
                "Record too short: {} bytes (header is {})",
                bytes.len(),
                HEADER_SIZE
            )));
        }

        let (lsn, crc, len) = parse_header(&bytes[..HEADER_SIZE]);
        let data = &bytes[HEADER_SIZE..];

        if data.len() != len as usize {
            return Err(EmberError::IndexCorruption(format!(
                "Record length mismatch: header says {}, got {}",
                len,
                data.len()
            )));
        }

        if crc32fast::hash(data) != crc {
            return Err(EmberError::IndexCorruption(format!(
                "CRC mismatch for record lsn={}",
                lsn
            )));
        }

        let record: IndexRecord = bincode::deserialize(data)
            .map_err(|e| EmberError::IndexCorruption(format!("Undecodable record: {}", e)))?;

        if record.lsn != lsn {
            return Err(EmberError::IndexCorruption(format!(
                "LSN mismatch: header {}, body {}",
                lsn, record.lsn
            )));
        }

        Ok(record)
    }
}

/// Split a record header into `(lsn, crc, len)`
pub(crate) fn parse_header(header: &[u8]) -> (u64, u32, u32) {
    let mut lsn = [0u8; 8];
    lsn.copy_from_slice(&header[0..8]);
    let crc = u32::from_le_bytes([header[8], header[9], header[10], header[11]]);
    let len = u32::from_le_bytes([header[12], header[13], header[14], header[15]]);
    (u64::from_le_bytes(lsn), crc, len)
}
