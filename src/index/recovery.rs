//! Index journal recovery
//!
//! Reads the journal back after a restart or crash.

use std::fs::OpenOptions;
use std::path::Path;

use tracing::warn;

use crate::error::Result;

use super::entry::IndexRecord;
use super::reader::{IndexReader, ReadOutcome};

/// Handles index journal recovery after a crash
pub struct IndexRecovery;

/// Result of a recovery scan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveryResult {
    /// Number of records successfully recovered
    pub entries_recovered: u64,

    /// Number of corrupted records found (replay stops at the first one)
    pub entries_corrupted: u64,

    /// Last valid LSN (0 if none)
    pub last_lsn: u64,

    /// Whether invalid trailing bytes were found (and, on recover, removed)
    pub was_truncated: bool,

    /// Length of the valid prefix of the journal in bytes
    pub valid_len: u64,
}

impl IndexRecovery {
    /// Recover records from a journal file
    ///
    /// This will:
    /// 1. Read all valid records in order
    /// 2. Stop at the first truncated or corrupted record
    /// 3. Truncate the file back to the last valid record
    /// 4. Return all valid records
    pub fn recover(path: &Path) -> Result<(Vec<IndexRecord>, RecoveryResult)> {
        let (records, result) = Self::scan(path, true)?;

        if result.was_truncated {
            let file = OpenOptions::new().write(true).open(path)?;
            file.set_len(result.valid_len)?;
            file.sync_all()?;
            warn!(
                path = %path.display(),
                valid_len = result.valid_len,
                "truncated index journal after last valid record"
            );
        }

        Ok((records, result))
    }

    /// Verify integrity of a journal without modifying it
    pub fn verify(path: &Path) -> Result<RecoveryResult> {
        let (_, result) = Self::scan(path, false)?;
        Ok(result)
    }

    fn scan(path: &Path, keep: bool) -> Result<(Vec<IndexRecord>, RecoveryResult)> {
        let mut result = RecoveryResult {
            entries_recovered: 0,
            entries_corrupted: 0,
            last_lsn: 0,
            was_truncated: false,
            valid_len: 0,
        };
        let mut records = Vec::new();

        if !path.exists() {
            return Ok((records, result));
        }

        let file_len = std::fs::metadata(path)?.len();
        let mut reader = IndexReader::open(path)?;

        loop {
            match reader.next_outcome()? {
                ReadOutcome::Record(record) => {
                    result.entries_recovered += 1;
                    result.last_lsn = record.lsn;
                    if keep {
                        records.push(record);
                    }
                }
                ReadOutcome::End => break,
                ReadOutcome::Truncated => {
                    result.was_truncated = true;
                    break;
                }
                ReadOutcome::Corrupt(reason) => {
                    warn!(path = %path.display(), "corrupt index record: {}", reason);
                    result.entries_corrupted += 1;
                    result.was_truncated = true;
                    break;
                }
            }
        }

        result.valid_len = reader.position();
        if result.valid_len < file_len {
            result.was_truncated = true;
        }

        Ok((records, result))
    }
}
