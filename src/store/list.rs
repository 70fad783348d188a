//! List store: append-only element sequences.

use std::sync::Arc;

use tracing::trace;

use crate::error::{EmberError, Result};
use crate::index::{EntryDescriptor, IndexWriteGuard, Kind, Structure};
use crate::keyspace::Keyspace;
use crate::vlog::ValueLog;

use super::Ttl;

/// `end` value meaning "through the last element"
pub const TO_END: i64 = -1;

/// Ordered list store (`RPUSH` / `LRANGE`)
#[derive(Clone)]
pub struct ListStore {
    keyspace: Arc<Keyspace>,
}

impl ListStore {
    pub fn new(keyspace: Arc<Keyspace>) -> Self {
        Self { keyspace }
    }

    /// Append `value` to the end of the list at `key`, creating it if needed
    ///
    /// Returns the new length of the list.
    pub fn write(&self, key: &str, value: &[u8]) -> Result<usize> {
        super::write_with(&self.keyspace, Kind::List, key, |index, values| {
            push(index, values, key, value)
        })
    }

    /// Append every value in order as one write
    ///
    /// The elements stay contiguous: no other push to `key` lands between
    /// them. Returns the new length of the list.
    pub fn write_all(&self, key: &str, items: &[Vec<u8>]) -> Result<usize> {
        super::write_with(&self.keyspace, Kind::List, key, |index, values| {
            let mut len = index.get(key).map(|s| s.len()).unwrap_or(0);
            for value in items {
                len = push(index, values, key, value)?;
            }
            Ok(len)
        })
    }

    /// Payloads of elements `[start, end)`; `end = -1` reads to the last element
    ///
    /// Fails with a range error if `start` is negative or `start > end`
    /// (for a non-sentinel `end`). Bounds past the end are clamped.
    pub fn read(&self, key: &str, start: i64, end: i64) -> Result<Vec<Vec<u8>>> {
        validate_range(start, end)?;
        super::read_live(&self.keyspace, Kind::List, key, |structure, values| {
            let items = match structure {
                Structure::List(items) => items,
                _ => return Err(EmberError::WrongType),
            };
            let (from, to) = slice_bounds(items.len(), start, end);
            items[from..to]
                .iter()
                .map(|d| values.read(d.offset, d.length))
                .collect()
        })
    }

    /// Number of elements in the list at `key`
    pub fn len(&self, key: &str) -> Result<usize> {
        super::read_live(&self.keyspace, Kind::List, key, |structure, _| Ok(structure.len()))
    }

    /// Delete the list at `key` and all of its elements
    pub fn remove(&self, key: &str) -> Result<()> {
        super::remove_key(&self.keyspace, Kind::List, key)
    }

    /// True if `key` holds a live list
    pub fn exists(&self, key: &str) -> bool {
        super::exists_in(&self.keyspace, Kind::List, key)
    }

    /// Expire `key` at `expire_at` (unix millis); 0 removes the expiry
    pub fn expire_at(&self, key: &str, expire_at: u64) -> Result<()> {
        super::set_expiry(&self.keyspace, Kind::List, key, expire_at)
    }

    pub fn persist(&self, key: &str) -> Result<()> {
        self.expire_at(key, 0)
    }

    pub fn ttl(&self, key: &str) -> Result<Ttl> {
        super::ttl_of(&self.keyspace, Kind::List, key)
    }

    /// Live list keys (diagnostics only)
    pub fn key_count(&self) -> usize {
        super::live_key_count(&self.keyspace, Kind::List)
    }
}

fn validate_range(start: i64, end: i64) -> Result<()> {
    if start < 0 {
        return Err(EmberError::Range(format!("start {} is negative", start)));
    }
    if end != TO_END && start > end {
        return Err(EmberError::Range(format!(
            "start {} is past end {}",
            start, end
        )));
    }
    Ok(())
}

/// Clamp a validated `[start, end)` request to a list of `len` elements
fn slice_bounds(len: usize, start: i64, end: i64) -> (usize, usize) {
    let to = if end == TO_END {
        len
    } else {
        (end as usize).min(len)
    };
    let from = (start as usize).min(to);
    (from, to)
}

/// Append one element under an already held write guard
fn push(index: &mut IndexWriteGuard<'_>, values: &ValueLog, key: &str, value: &[u8]) -> Result<usize> {
    let expire_at = index.expire_at(key).unwrap_or(0);
    let (offset, length) = values.append(value)?;
    trace!(key, offset, length, "list push");
    index.add(EntryDescriptor::list_element(key, offset, length, expire_at))?;
    Ok(index.get(key).map(|s| s.len()).unwrap_or(0))
}
