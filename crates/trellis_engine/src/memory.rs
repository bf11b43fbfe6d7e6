//! Insertion-ordered working memory.
//!
//! Every node memory in the network is a [`WorkingMemory`]. Iteration order
//! is the order in which keys were inserted, which is what makes emission
//! order deterministic.

use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;

/// Keyed container that remembers insertion order.
///
/// Each insertion receives the next value of a per-memory sequence counter.
/// Re-inserting an existing key replaces its value in place.
#[derive(Clone, Debug)]
pub struct WorkingMemory<K, V> {
    entries: BTreeMap<u64, (K, V)>,
    index: HashMap<K, u64>,
    next: u64,
}

impl<K, V> Default for WorkingMemory<K, V> {
    fn default() -> Self {
        Self {
            entries: BTreeMap::new(),
            index: HashMap::new(),
            next: 0,
        }
    }
}

impl<K: Copy + Eq + Hash, V> WorkingMemory<K, V> {
    /// Creates an empty memory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a value, returning the previous value for the key.
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        if let Some(seq) = self.index.get(&key) {
            if let Some(slot) = self.entries.get_mut(seq) {
                return Some(std::mem::replace(&mut slot.1, value));
            }
        }
        let seq = self.next;
        self.next += 1;
        self.entries.insert(seq, (key, value));
        self.index.insert(key, seq);
        None
    }

    /// Removes a key.
    pub fn remove(&mut self, key: &K) -> Option<V> {
        let seq = self.index.remove(key)?;
        self.entries.remove(&seq).map(|(_, v)| v)
    }

    /// Returns the value for a key.
    #[must_use]
    pub fn get(&self, key: &K) -> Option<&V> {
        let seq = self.index.get(key)?;
        self.entries.get(seq).map(|(_, v)| v)
    }

    /// Returns the value for a key mutably.
    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        let seq = self.index.get(key)?;
        self.entries.get_mut(seq).map(|(_, v)| v)
    }

    /// Returns true if the key is present.
    #[must_use]
    pub fn contains(&self, key: &K) -> bool {
        self.index.contains_key(key)
    }

    /// Iterates entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (K, &V)> {
        self.entries.values().map(|(k, v)| (*k, v))
    }

    /// Iterates entries mutably in insertion order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (K, &mut V)> {
        self.entries.values_mut().map(|(k, v)| (*k, v))
    }

    /// Iterates keys in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = K> + '_ {
        self.entries.values().map(|(k, _)| *k)
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Returns true if empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Removes every entry. The sequence counter keeps running.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.index.clear();
    }
}
