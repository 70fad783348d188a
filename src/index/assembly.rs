//! Assembly hook
//!
//! Turns journal events into structural changes of the in-memory index.
//! The replay loop and the live write path both go through [`apply`], so a
//! recovered index is built by exactly the code that built the original.

use std::collections::{BTreeMap, HashMap};

use super::entry::{EntryDescriptor, IndexOp, Kind};

/// The structural view of one key
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Structure {
    /// A single value
    Scalar(EntryDescriptor),
    /// Elements in append order
    List(Vec<EntryDescriptor>),
    /// Field → value, ordered by field name
    Hash(BTreeMap<String, EntryDescriptor>),
}

impl Structure {
    pub fn kind(&self) -> Kind {
        match self {
            Structure::Scalar(_) => Kind::Scalar,
            Structure::List(_) => Kind::List,
            Structure::Hash(_) => Kind::Hash,
        }
    }

    /// Every descriptor held under this key
    pub fn descriptors(&self) -> Vec<&EntryDescriptor> {
        match self {
            Structure::Scalar(d) => vec![d],
            Structure::List(items) => items.iter().collect(),
            Structure::Hash(fields) => fields.values().collect(),
        }
    }

    /// Number of descriptors (1 for a scalar)
    pub fn len(&self) -> usize {
        match self {
            Structure::Scalar(_) => 1,
            Structure::List(items) => items.len(),
            Structure::Hash(fields) => fields.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// In-memory index of one kind: key → structure, plus the expiry map
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct IndexState {
    entries: HashMap<String, Structure>,
    expiry: HashMap<String, u64>,
}

impl IndexState {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: HashMap::with_capacity(capacity),
            expiry: HashMap::new(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Structure> {
        self.entries.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Expiry timestamp of `key`, if it has one
    pub fn expire_at(&self, key: &str) -> Option<u64> {
        self.expiry.get(key).copied()
    }

    /// Number of keys (live or not yet lazily expired)
    pub fn key_count(&self) -> usize {
        self.entries.len()
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.entries.keys()
    }

    /// Every descriptor in the index
    pub fn all_descriptors(&self) -> impl Iterator<Item = &EntryDescriptor> {
        self.entries.values().flat_map(|s| s.descriptors())
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.expiry.clear();
    }

    fn set_expiry(&mut self, key: &str, expire_at: u64) {
        if expire_at == 0 {
            self.expiry.remove(key);
        } else {
            self.expiry.insert(key.to_string(), expire_at);
        }
    }

    fn drop_key(&mut self, key: &str) {
        self.entries.remove(key);
        self.expiry.remove(key);
    }
}

/// Apply one journal event to the index
pub fn apply(state: &mut IndexState, op: &IndexOp) {
    match op {
        IndexOp::Expire { key, expire_at } => {
            if state.contains(key) {
                state.set_expiry(key, *expire_at);
            }
        }
        IndexOp::Add(d) | IndexOp::Remove(d) | IndexOp::Update { descriptor: d, .. } => {
            match d.kind {
                Kind::Scalar => apply_scalar(state, op),
                Kind::List => apply_list(state, op),
                Kind::Hash => apply_hash(state, op),
            }
        }
    }
}

fn apply_scalar(state: &mut IndexState, op: &IndexOp) {
    match op {
        IndexOp::Add(d) | IndexOp::Update { descriptor: d, .. } => {
            state
                .entries
                .insert(d.key.clone(), Structure::Scalar(d.clone()));
            state.set_expiry(&d.key, d.expire_at);
        }
        IndexOp::Remove(d) => state.drop_key(&d.key),
        IndexOp::Expire { .. } => {}
    }
}

fn apply_list(state: &mut IndexState, op: &IndexOp) {
    match op {
        IndexOp::Add(d) => {
            if !state.contains(&d.key) {
                state.entries.insert(d.key.clone(), Structure::List(Vec::new()));
                state.set_expiry(&d.key, d.expire_at);
            }
            if let Some(Structure::List(items)) = state.entries.get_mut(&d.key) {
                items.push(d.clone());
            }
        }
        IndexOp::Update {
            previous_offset,
            descriptor,
        } => {
            if let Some(Structure::List(items)) = state.entries.get_mut(&descriptor.key) {
                if let Some(slot) = items.iter_mut().find(|e| e.offset == *previous_offset) {
                    *slot = descriptor.clone();
                }
            }
        }
        IndexOp::Remove(d) => {
            let now_empty = match state.entries.get_mut(&d.key) {
                Some(Structure::List(items)) => {
                    if let Some(pos) = items.iter().position(|e| e.offset == d.offset) {
                        items.remove(pos);
                    }
                    items.is_empty()
                }
                _ => false,
            };
            if now_empty {
                state.drop_key(&d.key);
            }
        }
        IndexOp::Expire { .. } => {}
    }
}

fn apply_hash(state: &mut IndexState, op: &IndexOp) {
    match op {
        IndexOp::Add(d) | IndexOp::Update { descriptor: d, .. } => {
            let Some(field) = d.field.clone() else {
                return;
            };
            if !state.contains(&d.key) {
                state
                    .entries
                    .insert(d.key.clone(), Structure::Hash(BTreeMap::new()));
                state.set_expiry(&d.key, d.expire_at);
            }
            if let Some(Structure::Hash(fields)) = state.entries.get_mut(&d.key) {
                fields.insert(field, d.clone());
            }
        }
        IndexOp::Remove(d) => {
            let now_empty = match (state.entries.get_mut(&d.key), &d.field) {
                (Some(Structure::Hash(fields)), Some(field)) => {
                    fields.remove(field);
                    fields.is_empty()
                }
                _ => false,
            };
            if now_empty {
                state.drop_key(&d.key);
            }
        }
        IndexOp::Expire { .. } => {}
    }
}
