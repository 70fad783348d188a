//! Index Log Module
//!
//! The durable source of truth mapping keys to entry descriptors, and the
//! in-memory index rebuilt from it.
//!
//! ## Responsibilities
//! - Journal every index mutation before it becomes visible
//! - CRC32 checksums and LSNs on every record
//! - Rebuild the in-memory index and expiry map by replay
//! - Stop at a damaged tail, truncate it, and report a partial recovery
//!
//! ## File Format
//! ```text
//! ┌─────────────────────────────────────────┐
//! │ Record 1                                │
//! │ ┌─────────┬─────────┬────────┬────────┐ │
//! │ │ LSN (8) │ CRC (4) │Len (4) │ Data   │ │
//! │ └─────────┴─────────┴────────┴────────┘ │
//! ├─────────────────────────────────────────┤
//! │ Record 2                                │
//! │ ┌─────────┬─────────┬────────┬────────┐ │
//! │ │ LSN (8) │ CRC (4) │Len (4) │ Data   │ │
//! │ └─────────┴─────────┴────────┴────────┘ │
//! └─────────────────────────────────────────┘
//! ```

pub mod assembly;
mod entry;
mod reader;
mod recovery;
mod writer;

use std::ops::Deref;
use std::path::{Path, PathBuf};

use parking_lot::{Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{info, warn};

use crate::config::SyncStrategy;
use crate::error::{EmberError, Result};

pub use assembly::{IndexState, Structure};
pub use entry::{EntryDescriptor, IndexOp, IndexRecord, Kind, HEADER_SIZE};
pub use reader::{IndexIterator, IndexReader, ReadOutcome};
pub use recovery::{IndexRecovery, RecoveryResult};
pub use writer::IndexWriter;

/// Summary of replaying one index journal
#[derive(Debug)]
pub struct ReplayOutcome {
    pub kind: Kind,
    /// Keys present after replay
    pub keys_restored: usize,
    /// Journal records applied
    pub records_replayed: u64,
    /// Set when the journal tail was damaged and dropped
    pub warning: Option<EmberError>,
}

/// Journal + in-memory index for one data kind
///
/// ## Concurrency:
/// - `state`: RwLock, many concurrent readers, one writer
/// - `journal`: Mutex, only touched while the `state` write lock is held
///   (or during recovery, which takes `state` first), so journal order
///   always equals in-memory mutation order
pub struct IndexLog {
    kind: Kind,
    path: PathBuf,
    sync_strategy: SyncStrategy,
    journal: Mutex<IndexWriter>,
    state: RwLock<IndexState>,
}

impl IndexLog {
    /// Open or create the journal at `path`
    ///
    /// The in-memory index starts empty; call [`IndexLog::recover`] to
    /// rebuild it.
    pub fn open(path: &Path, kind: Kind, sync_strategy: SyncStrategy, capacity: usize) -> Result<Self> {
        let journal = IndexWriter::open(path, sync_strategy)?;
        Ok(Self {
            kind,
            path: path.to_path_buf(),
            sync_strategy,
            journal: Mutex::new(journal),
            state: RwLock::new(IndexState::with_capacity(capacity)),
        })
    }

    /// Rebuild the in-memory index from the journal
    ///
    /// Replays from empty state in record order. A damaged tail is cut off
    /// and reported through `warning`; everything before it is kept.
    pub fn recover(&self) -> Result<ReplayOutcome> {
        let mut state = self.state.write();
        let mut journal = self.journal.lock();
        journal.sync()?;

        let (records, result) = IndexRecovery::recover(&self.path)?;

        state.clear();
        for record in &records {
            assembly::apply(&mut state, &record.op);
        }

        *journal = IndexWriter::resume(&self.path, self.sync_strategy, result.last_lsn + 1)?;

        let warning = if result.was_truncated {
            let message = format!(
                "{} journal: kept {} records up to lsn {}, dropped damaged tail ({} corrupt)",
                self.kind.file_stem(),
                result.entries_recovered,
                result.last_lsn,
                result.entries_corrupted
            );
            warn!("{}", message);
            Some(EmberError::PartialRecovery(message))
        } else {
            None
        };

        info!(
            kind = self.kind.file_stem(),
            records = result.entries_recovered,
            keys = state.key_count(),
            "replayed index journal"
        );

        Ok(ReplayOutcome {
            kind: self.kind,
            keys_restored: state.key_count(),
            records_replayed: result.entries_recovered,
            warning,
        })
    }

    /// Shared read access to the in-memory index
    pub fn read(&self) -> RwLockReadGuard<'_, IndexState> {
        self.state.read()
    }

    /// Exclusive access for journaled mutations
    pub fn write(&self) -> IndexWriteGuard<'_> {
        IndexWriteGuard {
            journal: &self.journal,
            state: self.state.write(),
        }
    }

    /// Journal and apply an `Add`
    pub fn add(&self, descriptor: EntryDescriptor) -> Result<()> {
        self.write().add(descriptor)
    }

    /// Journal and apply an `Update`
    pub fn update(&self, previous_offset: u64, descriptor: EntryDescriptor) -> Result<()> {
        self.write().update(previous_offset, descriptor)
    }

    /// Journal and apply a `Remove`
    pub fn remove(&self, descriptor: EntryDescriptor) -> Result<()> {
        self.write().remove(descriptor)
    }

    /// Force the journal to disk
    pub fn sync(&self) -> Result<()> {
        self.journal.lock().sync()
    }

    pub fn kind(&self) -> Kind {
        self.kind
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of keys currently indexed
    pub fn key_count(&self) -> usize {
        self.state.read().key_count()
    }
}

/// Write access to an [`IndexLog`]
///
/// Every mutation is journaled first, then applied through the assembly
/// hook. Readers cannot observe the change until the guard is dropped.
pub struct IndexWriteGuard<'a> {
    journal: &'a Mutex<IndexWriter>,
    state: RwLockWriteGuard<'a, IndexState>,
}

impl IndexWriteGuard<'_> {
    pub fn add(&mut self, descriptor: EntryDescriptor) -> Result<()> {
        self.commit(IndexOp::Add(descriptor))
    }

    pub fn update(&mut self, previous_offset: u64, descriptor: EntryDescriptor) -> Result<()> {
        self.commit(IndexOp::Update {
            previous_offset,
            descriptor,
        })
    }

    pub fn remove(&mut self, descriptor: EntryDescriptor) -> Result<()> {
        self.commit(IndexOp::Remove(descriptor))
    }

    pub fn expire(&mut self, key: &str, expire_at: u64) -> Result<()> {
        self.commit(IndexOp::Expire {
            key: key.to_string(),
            expire_at,
        })
    }

    fn commit(&mut self, op: IndexOp) -> Result<()> {
        self.journal.lock().append(op.clone())?;
        assembly::apply(&mut self.state, &op);
        Ok(())
    }
}

impl Deref for IndexWriteGuard<'_> {
    type Target = IndexState;

    fn deref(&self) -> &IndexState {
        &self.state
    }
}
