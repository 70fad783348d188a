//! Keyspace
//!
//! Owns the value log and index log of every data kind, plus the single
//! write lock that serializes all mutations across kinds.
//!
//! ## Lock order
//! `write_lock` → one kind's index write guard → that kind's value log.
//! Cross-kind lookups take other kinds' read guards one at a time and
//! release them before any write guard is taken.

use std::fs;

use parking_lot::{Mutex, MutexGuard};
use tracing::debug;

use crate::base;
use crate::config::Config;
use crate::error::Result;
use crate::index::{EntryDescriptor, IndexLog, Kind, ReplayOutcome};
use crate::vlog::ValueLog;

/// The two append-only files backing one data kind
pub struct LogPair {
    pub values: ValueLog,
    pub index: IndexLog,
}

impl LogPair {
    fn open(config: &Config, kind: Kind) -> Result<Self> {
        let stem = kind.file_stem();
        let values = ValueLog::open(
            &config.data_dir.join(format!("{}.vlog", stem)),
            config.value_log_capacity,
            config.sync_strategy,
        )?;
        let index = IndexLog::open(
            &config.data_dir.join(format!("{}.idx", stem)),
            kind,
            config.sync_strategy,
            config.index_capacity,
        )?;
        Ok(Self { values, index })
    }

    /// Replay the journal, then realign value log accounting with it
    fn recover(&self) -> Result<ReplayOutcome> {
        let outcome = self.index.recover()?;
        let state = self.index.read();
        self.values
            .reconcile(state.all_descriptors().map(|d| d.location()))?;
        Ok(outcome)
    }

    fn sync(&self) -> Result<()> {
        self.values.sync()?;
        self.index.sync()
    }
}

/// All per-kind logs plus the global write lock
pub struct Keyspace {
    scalar: LogPair,
    list: LogPair,
    hash: LogPair,
    write_lock: Mutex<()>,
}

impl Keyspace {
    /// Open (or create) every kind's files under `config.data_dir`
    ///
    /// Indexes start empty until [`Keyspace::recover`] runs.
    pub fn open(config: &Config) -> Result<Self> {
        fs::create_dir_all(&config.data_dir)?;
        Ok(Self {
            scalar: LogPair::open(config, Kind::Scalar)?,
            list: LogPair::open(config, Kind::List)?,
            hash: LogPair::open(config, Kind::Hash)?,
            write_lock: Mutex::new(()),
        })
    }

    /// The value log and index log of one kind
    pub fn logs(&self, kind: Kind) -> &LogPair {
        match kind {
            Kind::Scalar => &self.scalar,
            Kind::List => &self.list,
            Kind::Hash => &self.hash,
        }
    }

    /// Serialize mutations; held for the whole of every write path
    pub fn lock_writes(&self) -> MutexGuard<'_, ()> {
        self.write_lock.lock()
    }

    /// Kind of the live (non-expired) entry for `key`, if any
    pub fn kind_of(&self, key: &str, now: u64) -> Option<Kind> {
        Kind::ALL.into_iter().find(|kind| {
            let state = self.logs(*kind).index.read();
            base::is_live_in(&state, key, now)
        })
    }

    /// Run `op` against the kind holding a live `key`, under the write lock
    ///
    /// The lookup and the mutation see the same state: no other write can
    /// land in between. `None` when no kind holds `key`.
    pub fn with_live_key<T>(
        &self,
        key: &str,
        op: impl FnOnce(Kind, &LogPair) -> Result<T>,
    ) -> Result<Option<T>> {
        let _writes = self.lock_writes();
        match self.kind_of(key, crate::clock::now_millis()) {
            Some(kind) => op(kind, self.logs(kind)).map(Some),
            None => Ok(None),
        }
    }

    /// Replay every kind's journal from empty state
    pub fn recover(&self) -> Result<Vec<ReplayOutcome>> {
        let _writes = self.lock_writes();
        Kind::ALL
            .into_iter()
            .map(|kind| self.logs(kind).recover())
            .collect()
    }

    /// Drop `key` from `kind` if it is still expired
    pub fn purge_expired(&self, kind: Kind, key: &str) -> Result<()> {
        let _writes = self.lock_writes();
        let now = crate::clock::now_millis();
        let expired = {
            let state = self.logs(kind).index.read();
            base::is_expired_in(&state, key, now)
        };
        if expired {
            self.purge_locked(kind, key)?;
        }
        Ok(())
    }

    /// Remove every descriptor of `key` in `kind`
    ///
    /// Caller must hold the write lock. Returns whether the key existed.
    pub(crate) fn purge_locked(&self, kind: Kind, key: &str) -> Result<bool> {
        let logs = self.logs(kind);
        let mut index = logs.index.write();

        let descriptors: Vec<EntryDescriptor> = match index.get(key) {
            Some(structure) => structure.descriptors().into_iter().cloned().collect(),
            None => return Ok(false),
        };

        debug!(kind = kind.file_stem(), key, count = descriptors.len(), "purging key");
        for descriptor in descriptors {
            let (offset, length) = descriptor.location();
            index.remove(descriptor)?;
            logs.values.remove(offset, length)?;
        }
        Ok(true)
    }

    /// Live keys across all kinds
    pub fn key_count(&self) -> usize {
        let now = crate::clock::now_millis();
        Kind::ALL
            .into_iter()
            .map(|kind| {
                let state = self.logs(kind).index.read();
                state
                    .keys()
                    .filter(|key| !base::is_expired_in(&state, key, now))
                    .count()
            })
            .sum()
    }

    /// Flush and fsync every value log and journal
    pub fn sync_all(&self) -> Result<()> {
        let _writes = self.lock_writes();
        for kind in Kind::ALL {
            self.logs(kind).sync()?;
        }
        Ok(())
    }
}
