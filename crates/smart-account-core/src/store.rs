//! Key-value state and discardable overlays
//!
//! [`CacheStore`] stages writes on top of any [`KvStore`]. Staged writes reach
//! the parent only through [`CacheStore::write`]; dropping the overlay
//! discards them. Overlays nest, so a branch can itself be branched.

use std::collections::BTreeMap;

/// Ordered byte-keyed state
pub trait KvStore {
    /// Read a value
    fn get(&self, key: &[u8]) -> Option<Vec<u8>>;

    /// Check whether a key is present
    fn has(&self, key: &[u8]) -> bool {
        self.get(key).is_some()
    }

    /// Insert or replace a value
    fn set(&mut self, key: &[u8], value: &[u8]);

    /// Remove a key; missing keys are ignored
    fn delete(&mut self, key: &[u8]);

    /// All entries whose key starts with `prefix`, in ascending key order
    fn prefix_scan(&self, prefix: &[u8]) -> Vec<(Vec<u8>, Vec<u8>)>;
}

/// In-memory committed state
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryStore {
    entries: BTreeMap<Vec<u8>, Vec<u8>>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing is stored
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl KvStore for MemoryStore {
    fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &[u8], value: &[u8]) {
        self.entries.insert(key.to_vec(), value.to_vec());
    }

    fn delete(&mut self, key: &[u8]) {
        self.entries.remove(key);
    }

    fn prefix_scan(&self, prefix: &[u8]) -> Vec<(Vec<u8>, Vec<u8>)> {
        self.entries
            .range(prefix.to_vec()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }
}

/// Staged writes over a parent store.
///
/// `None` in the write set marks a deletion.
pub struct CacheStore<'p> {
    parent: &'p mut dyn KvStore,
    writes: BTreeMap<Vec<u8>, Option<Vec<u8>>>,
}

impl<'p> CacheStore<'p> {
    /// Begin an overlay on `parent`
    pub fn new(parent: &'p mut dyn KvStore) -> Self {
        Self {
            parent,
            writes: BTreeMap::new(),
        }
    }

    /// Number of staged keys
    pub fn pending_writes(&self) -> usize {
        self.writes.len()
    }

    /// Merge staged writes into the parent
    pub fn write(self) {
        let Self { parent, writes } = self;
        tracing::trace!(writes = writes.len(), "committing overlay");
        for (key, value) in writes {
            match value {
                Some(value) => parent.set(&key, &value),
                None => parent.delete(&key),
            }
        }
    }
}

impl KvStore for CacheStore<'_> {
    fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        match self.writes.get(key) {
            Some(staged) => staged.clone(),
            None => self.parent.get(key),
        }
    }

    fn set(&mut self, key: &[u8], value: &[u8]) {
        self.writes.insert(key.to_vec(), Some(value.to_vec()));
    }

    fn delete(&mut self, key: &[u8]) {
        self.writes.insert(key.to_vec(), None);
    }

    fn prefix_scan(&self, prefix: &[u8]) -> Vec<(Vec<u8>, Vec<u8>)> {
        let mut merged: BTreeMap<Vec<u8>, Vec<u8>> =
            self.parent.prefix_scan(prefix).into_iter().collect();
        let staged = self
            .writes
            .range(prefix.to_vec()..)
            .take_while(|(key, _)| key.starts_with(prefix));
        for (key, value) in staged {
            match value {
                Some(value) => {
                    merged.insert(key.clone(), value.clone());
                }
                None => {
                    merged.remove(key);
                }
            }
        }
        merged.into_iter().collect()
    }
}
