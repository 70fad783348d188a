//! Engine Module
//!
//! The top-level handle that owns the keyspace and the typed stores.
//!
//! ## Responsibilities
//! - Open the per-kind value logs and index journals
//! - Rebuild every in-memory index on startup (recovery)
//! - Kind-agnostic key operations (DEL, EXISTS, EXPIRE, TTL, TYPE)
//! - Dispatch protocol commands to the typed stores
//! - Flush and fsync everything on close

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::base;
use crate::clock::now_millis;
use crate::config::Config;
use crate::error::{EmberError, Result};
use crate::index::Kind;
use crate::keyspace::Keyspace;
use crate::protocol::{Command, Reply};
use crate::store::{HashStore, ListStore, ScalarStore, Ttl};

/// Outcome of replaying every index journal at startup
#[derive(Debug, Default)]
pub struct RecoveryReport {
    /// Keys indexed after replay, across all kinds
    pub restored_key_count: usize,

    /// Non-fatal problems found while replaying (damaged journal tails)
    pub warnings: Vec<EmberError>,
}

impl RecoveryReport {
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }
}

/// The main storage engine
///
/// ## Concurrency Model: Single-Writer / Multiple-Reader (SWMR)
///
/// - **Writes**: serialized by the keyspace write lock, then the target
///   kind's index write guard for the duration of the value log write and
///   the journal append
/// - **Reads**: concurrent; each read holds its kind's index read guard
///   across the descriptor lookup and the value log read
///
/// The engine is shared between connection threads behind an `Arc`.
pub struct Engine {
    /// Engine configuration
    config: Config,

    /// Per-kind logs plus the global write lock
    keyspace: Arc<Keyspace>,

    scalar: ScalarStore,
    list: ListStore,
    hash: HashStore,

    /// Report produced by the recovery run in `open`
    report: RecoveryReport,
}

impl Engine {
    /// Open or create an engine with the given config
    ///
    /// On startup:
    /// 1. Validate the config
    /// 2. Open/create every kind's value log and index journal
    /// 3. Replay the journals to rebuild the in-memory indexes
    /// 4. Ready to serve requests
    pub fn open(config: Config) -> Result<Self> {
        config.validate()?;

        let keyspace = Arc::new(Keyspace::open(&config)?);
        let mut engine = Self {
            scalar: ScalarStore::new(Arc::clone(&keyspace)),
            list: ListStore::new(Arc::clone(&keyspace)),
            hash: HashStore::new(Arc::clone(&keyspace)),
            keyspace,
            config,
            report: RecoveryReport::default(),
        };

        engine.report = engine.recover()?;
        info!(
            data_dir = %engine.config.data_dir.display(),
            keys = engine.report.restored_key_count,
            warnings = engine.report.warnings.len(),
            "engine opened"
        );

        Ok(engine)
    }

    /// Open with a path (convenience method)
    ///
    /// Uses default config with the specified data directory
    pub fn open_path(path: &Path) -> Result<Self> {
        let config = Config::builder().data_dir(path).build();
        Self::open(config)
    }

    /// Replay every index journal from empty state
    ///
    /// Runs once from [`Engine::open`]; calling it again rebuilds the same
    /// indexes from the same journals. A damaged journal tail is dropped
    /// and reported in `warnings`, never as a failed recovery.
    pub fn recover(&self) -> Result<RecoveryReport> {
        let outcomes = self.keyspace.recover()?;

        let mut report = RecoveryReport::default();
        for outcome in outcomes {
            debug!(
                kind = outcome.kind.file_stem(),
                keys = outcome.keys_restored,
                records = outcome.records_replayed,
                "kind recovered"
            );
            report.restored_key_count += outcome.keys_restored;
            if let Some(warning) = outcome.warning {
                warn!("recovery warning: {}", warning);
                report.warnings.push(warning);
            }
        }

        Ok(report)
    }

    /// The report produced when this engine was opened
    pub fn recovery_report(&self) -> &RecoveryReport {
        &self.report
    }

    // =========================================================================
    // Typed Stores
    // =========================================================================

    pub fn scalar(&self) -> &ScalarStore {
        &self.scalar
    }

    pub fn list(&self) -> &ListStore {
        &self.list
    }

    pub fn hash(&self) -> &HashStore {
        &self.hash
    }

    // =========================================================================
    // Kind-agnostic Operations
    // =========================================================================

    /// Kind of the live value stored at `key`
    pub fn key_type(&self, key: &str) -> Option<Kind> {
        self.keyspace.kind_of(key, now_millis())
    }

    /// True if any kind holds a live value at `key`
    pub fn exists(&self, key: &str) -> bool {
        base::exists(&self.keyspace, key)
    }

    /// Delete `key` whatever its kind; returns whether it existed
    pub fn del(&self, key: &str) -> Result<bool> {
        let removed = self
            .keyspace
            .with_live_key(key, |kind, _| self.keyspace.purge_locked(kind, key))?;
        Ok(removed.unwrap_or(false))
    }

    /// Set the expiry of `key` to `expire_at` (unix millis)
    ///
    /// Returns whether the key existed.
    pub fn expire_at(&self, key: &str, expire_at: u64) -> Result<bool> {
        let set = self
            .keyspace
            .with_live_key(key, |_, logs| logs.index.write().expire(key, expire_at))?;
        Ok(set.is_some())
    }

    /// Expire `key` after `ttl`
    pub fn expire(&self, key: &str, ttl: Duration) -> Result<bool> {
        let millis = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX);
        self.expire_at(key, now_millis().saturating_add(millis).max(1))
    }

    /// Remove the expiry of `key`; returns whether an expiry was removed
    pub fn persist(&self, key: &str) -> Result<bool> {
        let cleared = self.keyspace.with_live_key(key, |_, logs| {
            let mut index = logs.index.write();
            if index.expire_at(key).is_none() {
                return Ok(false);
            }
            index.expire(key, 0)?;
            Ok(true)
        })?;
        Ok(cleared.unwrap_or(false))
    }

    /// Remaining lifetime of `key`
    pub fn ttl(&self, key: &str) -> Result<Ttl> {
        match self.key_type(key) {
            Some(Kind::Scalar) => self.scalar.ttl(key),
            Some(Kind::List) => self.list.ttl(key),
            Some(Kind::Hash) => self.hash.ttl(key),
            None => Err(EmberError::NotFound),
        }
    }

    /// Live keys across all kinds
    pub fn key_count(&self) -> usize {
        self.keyspace.key_count()
    }

    /// Flush and fsync every value log and journal
    pub fn sync(&self) -> Result<()> {
        self.keyspace.sync_all()
    }

    // =========================================================================
    // Command Dispatch
    // =========================================================================

    /// Execute a protocol command
    ///
    /// Errors are folded into error replies; `SHUTDOWN` only acknowledges,
    /// stopping the server is up to the caller.
    pub fn execute(&self, command: Command) -> Reply {
        match self.dispatch(command) {
            Ok(reply) => reply,
            Err(e) => {
                if !e.is_caller_error() {
                    warn!("command failed: {}", e);
                }
                Reply::from_error(&e)
            }
        }
    }

    fn dispatch(&self, command: Command) -> Result<Reply> {
        let reply = match command {
            Command::Ping(None) => Reply::Simple("PONG".to_string()),
            Command::Ping(Some(message)) => Reply::Bulk(message),

            Command::Get { key } => match self.scalar.read(&key) {
                Ok(value) => Reply::Bulk(value),
                Err(EmberError::NotFound) => Reply::Null,
                Err(e) => return Err(e),
            },
            Command::Set { key, value, expire } => {
                let expire_at = match expire {
                    Some(ttl) => {
                        let millis = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX);
                        now_millis().saturating_add(millis)
                    }
                    None => 0,
                };
                self.scalar.write_with_expiry(&key, &value, expire_at)?;
                Reply::ok()
            }

            Command::Del { keys } => {
                let mut removed = 0;
                for key in &keys {
                    if self.del(key)? {
                        removed += 1;
                    }
                }
                Reply::Integer(removed)
            }
            Command::Exists { keys } => {
                Reply::Integer(keys.iter().filter(|key| self.exists(key)).count() as i64)
            }
            Command::Expire { key, millis } => {
                let existed = if millis <= 0 {
                    self.del(&key)?
                } else {
                    self.expire(&key, Duration::from_millis(millis as u64))?
                };
                Reply::Integer(existed as i64)
            }
            Command::Persist { key } => Reply::Integer(self.persist(&key)? as i64),
            Command::Ttl { key, millis } => Reply::Integer(match self.ttl(&key) {
                Ok(Ttl::Persistent) => -1,
                Ok(Ttl::ExpiresIn(left)) if millis => left.as_millis() as i64,
                Ok(Ttl::ExpiresIn(left)) => ((left.as_millis() + 500) / 1000) as i64,
                Err(EmberError::NotFound) => -2,
                Err(e) => return Err(e),
            }),
            Command::Type { key } => Reply::Simple(
                self.key_type(&key)
                    .map(|kind| kind.name())
                    .unwrap_or("none")
                    .to_string(),
            ),
            Command::DbSize => Reply::Integer(self.key_count() as i64),

            Command::RPush { key, values } => {
                Reply::Integer(self.list.write_all(&key, &values)? as i64)
            }
            Command::LRange { key, start, stop } => {
                let len = match self.list.len(&key) {
                    Ok(len) => len,
                    Err(EmberError::NotFound) => return Ok(Reply::Array(Vec::new())),
                    Err(e) => return Err(e),
                };
                match inclusive_to_exclusive(len, start, stop) {
                    Some((from, to)) => match self.list.read(&key, from, to) {
                        Ok(values) => Reply::bulk_array(values),
                        Err(EmberError::NotFound) => Reply::Array(Vec::new()),
                        Err(e) => return Err(e),
                    },
                    None => Reply::Array(Vec::new()),
                }
            }
            Command::LLen { key } => Reply::Integer(zero_if_missing(self.list.len(&key))?),

            Command::HSet { key, pairs } => {
                Reply::Integer(self.hash.write_pairs(&key, &pairs)? as i64)
            }
            Command::HGet { key, field } => match self.hash.read(&key, &field) {
                Ok(value) => Reply::Bulk(value),
                Err(EmberError::NotFound) => Reply::Null,
                Err(e) => return Err(e),
            },
            Command::HDel { key, fields } => {
                let mut removed = 0;
                for field in &fields {
                    if found(self.hash.remove_field(&key, field))? {
                        removed += 1;
                    }
                }
                Reply::Integer(removed)
            }
            Command::HGetAll { key } => match self.hash.read_all(&key) {
                Ok(pairs) => Reply::bulk_array(
                    pairs
                        .into_iter()
                        .flat_map(|(field, value)| [field.into_bytes(), value]),
                ),
                Err(EmberError::NotFound) => Reply::Array(Vec::new()),
                Err(e) => return Err(e),
            },
            Command::HLen { key } => Reply::Integer(zero_if_missing(self.hash.len(&key))?),

            Command::Shutdown => Reply::ok(),
        };

        Ok(reply)
    }

    /// Close the engine gracefully
    ///
    /// Flushes and fsyncs every value log and index journal
    pub fn close(self) -> Result<()> {
        self.keyspace.sync_all()?;
        info!("engine closed");
        Ok(())
    }

    // =========================================================================
    // Accessors (for testing and debugging)
    // =========================================================================

    /// Get the data directory path
    pub fn data_dir(&self) -> &Path {
        &self.config.data_dir
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Get the shared keyspace
    pub fn keyspace(&self) -> &Arc<Keyspace> {
        &self.keyspace
    }
}

/// `Ok(true)` on success, `Ok(false)` on `NotFound`
fn found(result: Result<()>) -> Result<bool> {
    match result {
        Ok(()) => Ok(true),
        Err(EmberError::NotFound) => Ok(false),
        Err(e) => Err(e),
    }
}

fn zero_if_missing(result: Result<usize>) -> Result<i64> {
    match result {
        Ok(n) => Ok(n as i64),
        Err(EmberError::NotFound) => Ok(0),
        Err(e) => Err(e),
    }
}

/// Map a Redis `LRANGE start stop` (inclusive, negative from the tail) onto
/// a `[from, to)` slice of a list of `len` elements
///
/// `None` means the range selects nothing.
fn inclusive_to_exclusive(len: usize, start: i64, stop: i64) -> Option<(i64, i64)> {
    let len = len as i64;
    let start = if start < 0 { (len + start).max(0) } else { start };
    let stop = if stop < 0 { len + stop } else { stop.min(len - 1) };
    if start > stop || start >= len {
        return None;
    }
    Some((start, stop + 1))
}
