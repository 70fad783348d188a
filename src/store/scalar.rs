//! Scalar store: one value per key.

use std::sync::Arc;

use tracing::trace;

use crate::error::{EmberError, Result};
use crate::index::{EntryDescriptor, Kind, Structure};
use crate::keyspace::Keyspace;

use super::Ttl;

/// Single-value store (`SET` / `GET` / `DEL`)
#[derive(Clone)]
pub struct ScalarStore {
    keyspace: Arc<Keyspace>,
}

impl ScalarStore {
    pub fn new(keyspace: Arc<Keyspace>) -> Self {
        Self { keyspace }
    }

    /// Store `value` under `key` with no expiry
    ///
    /// Clears any previous expiry, like a plain Redis `SET`.
    pub fn write(&self, key: &str, value: &[u8]) -> Result<()> {
        self.write_with_expiry(key, value, 0)
    }

    /// Store `value` under `key`, expiring at `expire_at` (unix millis, 0 = never)
    ///
    /// An existing key is updated through the value log (in place when the
    /// new value fits, relocated otherwise); a new key is appended.
    pub fn write_with_expiry(&self, key: &str, value: &[u8], expire_at: u64) -> Result<()> {
        super::write_with(&self.keyspace, Kind::Scalar, key, |index, values| {
            let existing = match index.get(key) {
                Some(Structure::Scalar(d)) => Some(d.location()),
                _ => None,
            };

            match existing {
                Some(old) => super::replace_value(values, old, value, |offset, length| {
                    trace!(key, old_offset = old.0, offset, length, "scalar update");
                    index.update(old.0, EntryDescriptor::scalar(key, offset, length, expire_at))
                }),
                None => {
                    let (offset, length) = values.append(value)?;
                    trace!(key, offset, length, "scalar add");
                    index.add(EntryDescriptor::scalar(key, offset, length, expire_at))
                }
            }
        })
    }

    /// Read the value of `key`
    pub fn read(&self, key: &str) -> Result<Vec<u8>> {
        super::read_live(&self.keyspace, Kind::Scalar, key, |structure, values| {
            match structure {
                Structure::Scalar(d) => values.read(d.offset, d.length),
                _ => Err(EmberError::WrongType),
            }
        })
    }

    /// Delete `key`
    pub fn remove(&self, key: &str) -> Result<()> {
        super::remove_key(&self.keyspace, Kind::Scalar, key)
    }

    /// True if `key` holds a live scalar
    pub fn exists(&self, key: &str) -> bool {
        super::exists_in(&self.keyspace, Kind::Scalar, key)
    }

    /// Expire `key` at `expire_at` (unix millis); 0 removes the expiry
    pub fn expire_at(&self, key: &str, expire_at: u64) -> Result<()> {
        super::set_expiry(&self.keyspace, Kind::Scalar, key, expire_at)
    }

    /// Remove any expiry from `key`
    pub fn persist(&self, key: &str) -> Result<()> {
        self.expire_at(key, 0)
    }

    pub fn ttl(&self, key: &str) -> Result<Ttl> {
        super::ttl_of(&self.keyspace, Kind::Scalar, key)
    }

    /// Live scalar keys (diagnostics only)
    pub fn key_count(&self) -> usize {
        super::live_key_count(&self.keyspace, Kind::Scalar)
    }
}
