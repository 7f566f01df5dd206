//! Write-once-read-many map with lock-free reads.

use crate::{Error, ErrorContext, Result};
use arc_swap::ArcSwap;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex};

/// Snapshot map: readers load the current `Arc<HashMap>` without locking,
/// writers serialise on a mutex and publish a fresh copy.
///
/// Entries are never evicted.
pub struct CopyOnWriteMap<K, V> {
    snapshot: ArcSwap<HashMap<K, V>>,
    writer: Mutex<()>,
}

impl<K, V> CopyOnWriteMap<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new() -> Self {
        Self {
            snapshot: ArcSwap::from_pointee(HashMap::new()),
            writer: Mutex::new(()),
        }
    }

    pub fn get(&self, key: &K) -> Option<V> {
        self.snapshot.load().get(key).cloned()
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.snapshot.load().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.snapshot.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn keys(&self) -> Vec<K> {
        self.snapshot.load().keys().cloned().collect()
    }

    /// Insert or replace.
    pub fn insert(&self, key: K, value: V) -> Result<()> {
        let _guard = self.lock()?;
        self.publish(key, value);
        Ok(())
    }

    /// Return the existing value, or run `init` exactly once per key and store its output.
    ///
    /// `init` runs while the writer lock is held; concurrent first users of the
    /// same key wait and then observe the stored value. A failed `init` stores nothing.
    pub fn get_or_try_insert_with<F>(&self, key: &K, init: F) -> Result<V>
    where
        F: FnOnce() -> Result<V>,
    {
        if let Some(v) = self.get(key) {
            return Ok(v);
        }
        let _guard = self.lock()?;
        if let Some(v) = self.get(key) {
            return Ok(v);
        }
        let value = init()?;
        self.publish(key.clone(), value.clone());
        Ok(value)
    }

    pub fn get_or_insert_with<F>(&self, key: &K, init: F) -> Result<V>
    where
        F: FnOnce() -> V,
    {
        self.get_or_try_insert_with(key, || Ok(init()))
    }

    fn publish(&self, key: K, value: V) {
        let mut next: HashMap<K, V> = HashMap::clone(&self.snapshot.load());
        next.insert(key, value);
        self.snapshot.store(Arc::new(next));
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, ()>> {
        self.writer.lock().map_err(|_| {
            Error::runtime_with_context(
                "cache writer lock poisoned",
                ErrorContext::new().with_source("copy_on_write_map"),
            )
        })
    }
}

impl<K, V> Default for CopyOnWriteMap<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}
