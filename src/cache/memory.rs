//! In-process memoization keyed by a typed enum.
//!
//! [`MemoryCache`] holds at most one value per key for the lifetime of its
//! owner. It is single-threaded (`RefCell`), and the compute callback runs
//! with no borrow held so it may consult the same cache for other keys.
use std::cell::RefCell;
use std::collections::HashMap;
use std::hash::Hash;

/// Key → value memo with lazy fill.
#[derive(Debug)]
pub struct MemoryCache<K, V> {
    entries: RefCell<HashMap<K, V>>,
}

impl<K: Eq + Hash + Clone, V: Clone> MemoryCache<K, V> {
    pub fn new() -> Self {
        MemoryCache { entries: RefCell::new(HashMap::new()) }
    }

    /// Return the cached value for `key`, computing and storing it on a miss.
    ///
    /// Errors
    /// ------
    /// - Whatever `compute` returns. Nothing is stored in that case.
    pub fn get_value<E>(&self, key: &K, compute: impl FnOnce() -> Result<V, E>) -> Result<V, E> {
        if let Some(hit) = self.get(key) {
            return Ok(hit);
        }
        let value = compute()?;
        self.entries.borrow_mut().insert(key.clone(), value.clone());
        Ok(value)
    }

    pub fn get(&self, key: &K) -> Option<V> {
        self.entries.borrow().get(key).cloned()
    }

    pub fn save_value(&self, key: K, value: V) {
        self.entries.borrow_mut().insert(key, value);
    }

    pub fn invalidate(&self, key: &K) -> Option<V> {
        self.entries.borrow_mut().remove(key)
    }

    pub fn contains(&self, key: &K) -> bool {
        self.entries.borrow().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    pub fn clear(&self) {
        self.entries.borrow_mut().clear();
    }
}

impl<K: Eq + Hash + Clone, V: Clone> Default for MemoryCache<K, V> {
    fn default() -> Self {
        Self::new()
    }
}
