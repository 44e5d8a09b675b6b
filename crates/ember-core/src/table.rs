//! Hash tables keyed by strings
//!
//! - `Table` maps interned string handles to values. It is used for globals
//!   and is a strong root: every key and value is traced.
//! - `InternTable` maps string contents to the one string object holding
//!   them. It is weak: it is never traced, and entries whose string did not
//!   survive marking are purged before the sweep frees them.

use crate::gc::{Heap, ObjId};
use crate::value::Value;
use rustc_hash::FxHashMap;

/// String-keyed value table
#[derive(Debug, Clone, Default)]
pub struct Table {
    entries: FxHashMap<ObjId, Value>,
}

impl Table {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a key
    pub fn get(&self, key: ObjId) -> Option<Value> {
        self.entries.get(&key).copied()
    }

    /// Insert or overwrite; returns true if the key was new
    pub fn set(&mut self, key: ObjId, value: Value) -> bool {
        self.entries.insert(key, value).is_none()
    }

    /// Remove a key; returns true if it was present
    pub fn delete(&mut self, key: ObjId) -> bool {
        self.entries.remove(&key).is_some()
    }

    /// Check if a key is present
    pub fn contains(&self, key: ObjId) -> bool {
        self.entries.contains_key(&key)
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over entries
    pub fn iter(&self) -> impl Iterator<Item = (ObjId, Value)> + '_ {
        self.entries.iter().map(|(&key, &value)| (key, value))
    }
}

/// Weak index from string contents to interned string objects
#[derive(Debug, Default)]
pub struct InternTable {
    strings: FxHashMap<Box<str>, ObjId>,
}

impl InternTable {
    /// Create an empty intern table
    pub fn new() -> Self {
        Self::default()
    }

    /// Find the interned object holding `chars`
    pub fn find(&self, chars: &str) -> Option<ObjId> {
        self.strings.get(chars).copied()
    }

    /// Record a newly interned string
    pub fn insert(&mut self, chars: &str, id: ObjId) {
        self.strings.insert(chars.into(), id);
    }

    /// Check if any entry points at `id`
    pub fn contains_id(&self, id: ObjId) -> bool {
        self.strings.values().any(|&entry| entry == id)
    }

    /// Drop every entry whose string is unmarked; returns how many were removed
    ///
    /// Must run after tracing and before sweeping: afterwards the mark bits
    /// are cleared and the strings are gone.
    pub fn remove_white(&mut self, heap: &Heap) -> usize {
        let before = self.strings.len();
        self.strings.retain(|_, id| heap.is_marked(*id));
        before - self.strings.len()
    }

    /// Number of interned strings
    pub fn len(&self) -> usize {
        self.strings.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }

    /// Iterate over interned handles
    pub fn ids(&self) -> impl Iterator<Item = ObjId> + '_ {
        self.strings.values().copied()
    }

    pub(crate) fn clear(&mut self) {
        self.strings.clear();
    }
}
