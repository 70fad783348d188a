//! Index journal writer
//!
//! Handles appending records to the index journal.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::config::SyncStrategy;
use crate::error::Result;

use super::entry::{IndexOp, IndexRecord};
use super::reader::{IndexReader, ReadOutcome};

/// Writes records to the index journal
pub struct IndexWriter {
    path: PathBuf,
    writer: BufWriter<File>,
    /// LSN that the next appended record will receive
    next_lsn: u64,
    sync_strategy: SyncStrategy,
    /// Records written since the last fsync
    uncommitted: usize,
}

impl IndexWriter {
    /// Open or create a journal, continuing after its last valid LSN
    pub fn open(path: &Path, sync_strategy: SyncStrategy) -> Result<Self> {
        let mut last_lsn = 0;
        if path.exists() {
            let mut reader = IndexReader::open(path)?;
            while let ReadOutcome::Record(record) = reader.next_outcome()? {
                last_lsn = record.lsn;
            }
        }
        Self::resume(path, sync_strategy, last_lsn + 1)
    }

    /// Open a journal whose next LSN is already known (after recovery)
    pub fn resume(path: &Path, sync_strategy: SyncStrategy, next_lsn: u64) -> Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            writer: BufWriter::new(file),
            next_lsn,
            sync_strategy,
            uncommitted: 0,
        })
    }

    /// Append an operation, returning the LSN it was written under
    ///
    /// The record is always flushed to the OS before returning; fsync
    /// follows the sync strategy.
    pub fn append(&mut self, op: IndexOp) -> Result<u64> {
        let lsn = self.next_lsn;
        let bytes = IndexRecord::new(lsn, op).serialize()?;

        self.writer.write_all(&bytes)?;
        self.writer.flush()?;
        self.next_lsn += 1;
        self.uncommitted += 1;

        let due = match self.sync_strategy {
            SyncStrategy::EveryWrite => true,
            SyncStrategy::EveryNEntries { count } => self.uncommitted >= count,
        };
        if due {
            self.sync()?;
        }

        Ok(lsn)
    }

    /// Force sync to disk
    pub fn sync(&mut self) -> Result<()> {
        self.writer.flush()?;
        self.writer.get_ref().sync_data()?;
        self.uncommitted = 0;
        Ok(())
    }

    /// LSN the next record will receive
    pub fn current_lsn(&self) -> u64 {
        self.next_lsn
    }

    /// Records appended since the last fsync
    pub fn uncommitted_count(&self) -> usize {
        self.uncommitted
    }

    /// Path of the journal file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for IndexWriter {
    fn drop(&mut self) {
        if self.uncommitted > 0 {
            if let Err(e) = self.sync() {
                tracing::warn!(path = %self.path.display(), "failed to sync index journal on drop: {}", e);
            }
        }
    }
}
