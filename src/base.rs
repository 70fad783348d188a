//! Base Operation Layer
//!
//! Cross-kind guards every typed store runs before touching a value log:
//! existence, lazy expiry and type compatibility. Nothing here owns state;
//! it only reads the indexes held by the [`Keyspace`].

use crate::clock::now_millis;
use crate::error::{EmberError, Result};
use crate::index::{IndexState, Kind};
use crate::keyspace::Keyspace;

/// True if `key` has an expiry at or before `now`
pub fn is_expired_in(state: &IndexState, key: &str, now: u64) -> bool {
    matches!(state.expire_at(key), Some(at) if at <= now)
}

/// True if `key` is indexed and not expired
pub fn is_live_in(state: &IndexState, key: &str, now: u64) -> bool {
    state.contains(key) && !is_expired_in(state, key, now)
}

/// True iff some kind holds a live entry for `key`
pub fn exists(keyspace: &Keyspace, key: &str) -> bool {
    keyspace.kind_of(key, now_millis()).is_some()
}

/// True iff some kind holds `key` with an expiry that has passed
///
/// Callers treat such a key as absent and may purge it.
pub fn is_expired(keyspace: &Keyspace, key: &str) -> bool {
    let now = now_millis();
    Kind::ALL.into_iter().any(|kind| {
        let state = keyspace.logs(kind).index.read();
        state.contains(key) && is_expired_in(&state, key, now)
    })
}

/// True if `key` is absent (so the caller may create it) or already of
/// the `expected` kind
pub fn check_key_type(keyspace: &Keyspace, key: &str, expected: Kind) -> bool {
    match keyspace.kind_of(key, now_millis()) {
        None => true,
        Some(kind) => kind == expected,
    }
}

/// Admit a write of kind `expected` to `key`
///
/// Fails with `WrongType` before any mutation if another kind holds the
/// key. Otherwise clears any expired leftovers of `key` (in every kind) so
/// the write starts from a fresh entry with fresh TTL bookkeeping.
///
/// Caller must hold the keyspace write lock.
pub fn write_gate(keyspace: &Keyspace, key: &str, expected: Kind) -> Result<()> {
    if !check_key_type(keyspace, key, expected) {
        return Err(EmberError::WrongType);
    }

    let now = now_millis();
    for kind in Kind::ALL {
        let expired = {
            let state = keyspace.logs(kind).index.read();
            state.contains(key) && is_expired_in(&state, key, now)
        };
        if expired {
            keyspace.purge_locked(kind, key)?;
        }
    }

    Ok(())
}
