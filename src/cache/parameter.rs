//! Memory tier that holds the outputs of a single parameter vector.
//!
//! [`ParameterMemoryCache`] keeps entries for exactly one resident
//! [`ParameterKey`]. Storing a value under a different parameter vector drops
//! everything held for the previous one, so memory stays bounded by the
//! outputs of one model evaluation.
use crate::cache::key::ParameterKey;
use std::cell::RefCell;
use std::collections::HashMap;
use std::hash::Hash;

#[derive(Debug)]
struct Resident<K, V> {
    parameters: ParameterKey,
    entries: HashMap<K, V>,
}

/// Per-parameter memo; a new parameter vector supersedes the previous one.
#[derive(Debug)]
pub struct ParameterMemoryCache<K, V> {
    resident: RefCell<Option<Resident<K, V>>>,
}

impl<K: Eq + Hash + Clone, V: Clone> ParameterMemoryCache<K, V> {
    pub fn new() -> Self {
        ParameterMemoryCache { resident: RefCell::new(None) }
    }

    pub fn get(&self, parameters: &ParameterKey, key: &K) -> Option<V> {
        let resident = self.resident.borrow();
        match resident.as_ref() {
            Some(r) if r.parameters == *parameters => r.entries.get(key).cloned(),
            _ => None,
        }
    }

    /// Return the value for `(parameters, key)`, computing it on a miss.
    ///
    /// The compute callback runs without any borrow held.
    pub fn get_value<E>(
        &self, parameters: &ParameterKey, key: &K,
        compute: impl FnOnce(&ParameterKey) -> Result<V, E>,
    ) -> Result<V, E> {
        if let Some(hit) = self.get(parameters, key) {
            return Ok(hit);
        }
        let value = compute(parameters)?;
        self.save_value(parameters, key.clone(), value.clone());
        Ok(value)
    }

    /// Store a value, evicting all entries of any other parameter vector.
    pub fn save_value(&self, parameters: &ParameterKey, key: K, value: V) {
        let mut resident = self.resident.borrow_mut();
        match resident.as_mut() {
            Some(r) if r.parameters == *parameters => {
                r.entries.insert(key, value);
            }
            _ => {
                let mut entries = HashMap::new();
                entries.insert(key, value);
                *resident = Some(Resident { parameters: parameters.clone(), entries });
            }
        }
    }

    /// Store a value and drop every other entry held for `parameters`.
    ///
    /// Used when a stored quantity is replaced so values derived from the old
    /// one cannot be served afterwards.
    pub fn replace_value(&self, parameters: &ParameterKey, key: K, value: V) {
        let mut entries = HashMap::new();
        entries.insert(key, value);
        *self.resident.borrow_mut() = Some(Resident { parameters: parameters.clone(), entries });
    }

    pub fn resident_parameters(&self) -> Option<ParameterKey> {
        self.resident.borrow().as_ref().map(|r| r.parameters.clone())
    }

    pub fn len(&self) -> usize {
        self.resident.borrow().as_ref().map_or(0, |r| r.entries.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        *self.resident.borrow_mut() = None;
    }
}

impl<K: Eq + Hash + Clone, V: Clone> Default for ParameterMemoryCache<K, V> {
    fn default() -> Self {
        Self::new()
    }
}
