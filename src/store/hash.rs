//! Hash store: field → value maps.

use std::sync::Arc;

use tracing::trace;

use crate::error::{EmberError, Result};
use crate::index::{EntryDescriptor, IndexWriteGuard, Kind, Structure};
use crate::keyspace::Keyspace;
use crate::vlog::ValueLog;

use super::Ttl;

/// Field map store (`HSET` / `HGET` / `HGETALL`)
#[derive(Clone)]
pub struct HashStore {
    keyspace: Arc<Keyspace>,
}

impl HashStore {
    pub fn new(keyspace: Arc<Keyspace>) -> Self {
        Self { keyspace }
    }

    /// Set `field` of the hash at `key`
    ///
    /// Returns `true` if the field is new, `false` if it was updated.
    pub fn write(&self, key: &str, field: &str, value: &[u8]) -> Result<bool> {
        super::write_with(&self.keyspace, Kind::Hash, key, |index, values| {
            set_field(index, values, key, field, value)
        })
    }

    /// Set several fields of the hash at `key` as one write
    ///
    /// All pairs land under a single hold of the write lock, so no other
    /// write to `key` interleaves with them. Returns how many fields are new.
    pub fn write_pairs(&self, key: &str, pairs: &[(String, Vec<u8>)]) -> Result<usize> {
        super::write_with(&self.keyspace, Kind::Hash, key, |index, values| {
            let mut added = 0;
            for (field, value) in pairs {
                if set_field(index, values, key, field, value)? {
                    added += 1;
                }
            }
            Ok(added)
        })
    }

    /// Value of `field` in the hash at `key`
    pub fn read(&self, key: &str, field: &str) -> Result<Vec<u8>> {
        super::read_live(&self.keyspace, Kind::Hash, key, |structure, values| {
            match structure {
                Structure::Hash(fields) => match fields.get(field) {
                    Some(d) => values.read(d.offset, d.length),
                    None => Err(EmberError::NotFound),
                },
                _ => Err(EmberError::WrongType),
            }
        })
    }

    /// Every `(field, value)` pair, ordered by field name
    pub fn read_all(&self, key: &str) -> Result<Vec<(String, Vec<u8>)>> {
        super::read_live(&self.keyspace, Kind::Hash, key, |structure, values| {
            match structure {
                Structure::Hash(fields) => fields
                    .iter()
                    .map(|(field, d)| Ok((field.clone(), values.read(d.offset, d.length)?)))
                    .collect(),
                _ => Err(EmberError::WrongType),
            }
        })
    }

    /// Number of fields in the hash at `key`
    pub fn len(&self, key: &str) -> Result<usize> {
        super::read_live(&self.keyspace, Kind::Hash, key, |structure, _| Ok(structure.len()))
    }

    /// Delete one field; the key disappears with its last field
    pub fn remove_field(&self, key: &str, field: &str) -> Result<()> {
        super::modify_existing(&self.keyspace, Kind::Hash, key, |index, values| {
            let descriptor = match index.get(key) {
                Some(Structure::Hash(fields)) => fields.get(field).cloned(),
                _ => None,
            }
            .ok_or(EmberError::NotFound)?;

            let (offset, length) = descriptor.location();
            index.remove(descriptor)?;
            values.remove(offset, length)
        })
    }

    /// Delete the hash at `key` and all of its fields
    pub fn remove(&self, key: &str) -> Result<()> {
        super::remove_key(&self.keyspace, Kind::Hash, key)
    }

    /// True if `key` holds a live hash
    pub fn exists(&self, key: &str) -> bool {
        super::exists_in(&self.keyspace, Kind::Hash, key)
    }

    /// Expire `key` at `expire_at` (unix millis); 0 removes the expiry
    pub fn expire_at(&self, key: &str, expire_at: u64) -> Result<()> {
        super::set_expiry(&self.keyspace, Kind::Hash, key, expire_at)
    }

    pub fn persist(&self, key: &str) -> Result<()> {
        self.expire_at(key, 0)
    }

    pub fn ttl(&self, key: &str) -> Result<Ttl> {
        super::ttl_of(&self.keyspace, Kind::Hash, key)
    }

    /// Live hash keys (diagnostics only)
    pub fn key_count(&self) -> usize {
        super::live_key_count(&self.keyspace, Kind::Hash)
    }
}

/// Insert or update one field under an already held write guard
fn set_field(
    index: &mut IndexWriteGuard<'_>,
    values: &ValueLog,
    key: &str,
    field: &str,
    value: &[u8],
) -> Result<bool> {
    let expire_at = index.expire_at(key).unwrap_or(0);
    let existing = match index.get(key) {
        Some(Structure::Hash(fields)) => fields.get(field).map(|d| d.location()),
        _ => None,
    };

    match existing {
        Some(old) => {
            super::replace_value(values, old, value, |offset, length| {
                trace!(key, field, old_offset = old.0, offset, "hash field update");
                index.update(
                    old.0,
                    EntryDescriptor::hash_field(key, field, offset, length, expire_at),
                )
            })?;
            Ok(false)
        }
        None => {
            let (offset, length) = values.append(value)?;
            trace!(key, field, offset, "hash field add");
            index.add(EntryDescriptor::hash_field(key, field, offset, length, expire_at))?;
            Ok(true)
        }
    }
}
