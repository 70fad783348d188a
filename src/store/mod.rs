//! Typed Stores
//!
//! Kind-specific facades over the [`Keyspace`]. Each store composes its
//! kind's value log and index log with the base guards:
//!
//! - [`ScalarStore`]: one value per key, updated in place or relocated
//! - [`ListStore`]: append-only sequence per key, sliced on read
//! - [`HashStore`]: field → value map per key
//!
//! Reads hold the kind's index read guard across the value log read, so a
//! concurrent in-place update can never tear a payload. Writes hold the
//! keyspace write lock and the index write guard across the value log
//! write and the journal append.

mod hash;
mod list;
mod scalar;

use std::time::Duration;

use tracing::warn;

use crate::base;
use crate::clock::now_millis;
use crate::error::{EmberError, Result};
use crate::index::{IndexWriteGuard, Kind, Structure};
use crate::keyspace::Keyspace;
use crate::vlog::ValueLog;

pub use hash::HashStore;
pub use list::ListStore;
pub use scalar::ScalarStore;

/// Remaining lifetime of a key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ttl {
    /// The key never expires
    Persistent,
    /// The key expires after this long
    ExpiresIn(Duration),
}

/// Error for a key missing from `kind`: `WrongType` if another kind holds it
fn absent(keyspace: &Keyspace, kind: Kind, key: &str) -> EmberError {
    match keyspace.kind_of(key, now_millis()) {
        Some(other) if other != kind => EmberError::WrongType,
        _ => EmberError::NotFound,
    }
}

/// Run `read` against the live structure of `key`
///
/// An expired key is purged and reported as `NotFound`.
fn read_live<T>(
    keyspace: &Keyspace,
    kind: Kind,
    key: &str,
    read: impl FnOnce(&Structure, &ValueLog) -> Result<T>,
) -> Result<T> {
    let logs = keyspace.logs(kind);
    let now = now_millis();

    let expired = {
        let state = logs.index.read();
        match state.get(key) {
            Some(structure) if !base::is_expired_in(&state, key, now) => {
                return read(structure, &logs.values);
            }
            Some(_) => true,
            None => false,
        }
    };

    if expired {
        keyspace.purge_expired(kind, key)?;
        return Err(EmberError::NotFound);
    }
    Err(absent(keyspace, kind, key))
}

/// Run a write that may create `key`
fn write_with<T>(
    keyspace: &Keyspace,
    kind: Kind,
    key: &str,
    write: impl FnOnce(&mut IndexWriteGuard<'_>, &ValueLog) -> Result<T>,
) -> Result<T> {
    let _writes = keyspace.lock_writes();
    base::write_gate(keyspace, key, kind)?;

    let logs = keyspace.logs(kind);
    let mut index = logs.index.write();
    write(&mut index, &logs.values)
}

/// Rewrite the frame at `old` with `value`, then journal the new location
///
/// An in-place overwrite is rolled back when `journal` fails, so the
/// descriptor still indexed keeps addressing a readable frame.
fn replace_value(
    values: &ValueLog,
    old: (u64, u32),
    value: &[u8],
    journal: impl FnOnce(u64, u32) -> Result<()>,
) -> Result<()> {
    let (old_offset, old_length) = old;
    let previous = if value.len() as u64 <= old_length as u64 {
        Some(values.read(old_offset, old_length)?)
    } else {
        None
    };

    let (offset, length) = values.update(old_offset, old_length, value)?;
    let result = journal(offset, length);

    if let (Err(e), Some(previous)) = (&result, previous) {
        warn!(offset = old_offset, "journal append failed after in-place update: {}", e);
        values.restore(old_offset, length, &previous)?;
    }
    result
}

/// Run a write that requires `key` to exist live in `kind`
fn modify_existing<T>(
    keyspace: &Keyspace,
    kind: Kind,
    key: &str,
    modify: impl FnOnce(&mut IndexWriteGuard<'_>, &ValueLog) -> Result<T>,
) -> Result<T> {
    let _writes = keyspace.lock_writes();
    let logs = keyspace.logs(kind);
    let now = now_millis();

    let (present, expired) = {
        let state = logs.index.read();
        (state.contains(key), base::is_expired_in(&state, key, now))
    };

    match (present, expired) {
        (true, false) => {
            let mut index = logs.index.write();
            modify(&mut index, &logs.values)
        }
        (true, true) => {
            keyspace.purge_locked(kind, key)?;
            Err(EmberError::NotFound)
        }
        (false, _) => Err(absent(keyspace, kind, key)),
    }
}

/// Drop every descriptor of `key` from `kind`
fn remove_key(keyspace: &Keyspace, kind: Kind, key: &str) -> Result<()> {
    modify_existing(keyspace, kind, key, |index, values| {
        let descriptors: Vec<_> = match index.get(key) {
            Some(structure) => structure.descriptors().into_iter().cloned().collect(),
            None => return Err(EmberError::NotFound),
        };
        for descriptor in descriptors {
            let (offset, length) = descriptor.location();
            index.remove(descriptor)?;
            values.remove(offset, length)?;
        }
        Ok(())
    })
}

/// Set (or clear, with 0) the expiry of `key`
fn set_expiry(keyspace: &Keyspace, kind: Kind, key: &str, expire_at: u64) -> Result<()> {
    modify_existing(keyspace, kind, key, |index, _| index.expire(key, expire_at))
}

/// Remaining lifetime of `key`
fn ttl_of(keyspace: &Keyspace, kind: Kind, key: &str) -> Result<Ttl> {
    let now = now_millis();
    let (present, expire_at) = {
        let state = keyspace.logs(kind).index.read();
        (state.contains(key), state.expire_at(key))
    };

    match (present, expire_at) {
        (true, None) => Ok(Ttl::Persistent),
        (true, Some(at)) if at > now => Ok(Ttl::ExpiresIn(Duration::from_millis(at - now))),
        (true, Some(_)) => {
            keyspace.purge_expired(kind, key)?;
            Err(EmberError::NotFound)
        }
        (false, _) => Err(absent(keyspace, kind, key)),
    }
}

/// True if `key` is live in `kind`
fn exists_in(keyspace: &Keyspace, kind: Kind, key: &str) -> bool {
    let state = keyspace.logs(kind).index.read();
    base::is_live_in(&state, key, now_millis())
}

/// Live keys of `kind`
fn live_key_count(keyspace: &Keyspace, kind: Kind) -> usize {
    let now = now_millis();
    let state = keyspace.logs(kind).index.read();
    state
        .keys()
        .filter(|key| !base::is_expired_in(&state, key, now))
        .count()
}
