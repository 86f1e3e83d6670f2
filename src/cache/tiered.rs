//! Memory tier in front of the disk tier.
//!
//! Lookups consult the memory tier (payloads of the most recent parameter
//! vector) first, then the parameter-set store, and only then compute. A
//! computed value is written to disk before it enters memory.
use crate::cache::errors::{CacheError, CacheResult};
use crate::cache::key::{EntryKey, ParameterKey};
use crate::cache::options::{CacheOptions, PersistOptions};
use crate::cache::parameter::ParameterMemoryCache;
use crate::cache::payload::{read_payload, Payload};
use crate::cache::persistent::PersistentCache;
use ndarray::ArrayD;
use slog::{debug, Logger};

type MemoryKey = (EntryKey, String);

/// Two-tier cache of model outputs.
#[derive(Debug)]
pub struct TieredCache {
    memory: Option<ParameterMemoryCache<MemoryKey, Payload>>,
    persistent: PersistentCache,
    logger: Logger,
}

impl TieredCache {
    pub fn new(options: &CacheOptions, logger: Logger) -> Self {
        TieredCache {
            memory: options.use_memory_tier.then(ParameterMemoryCache::new),
            persistent: PersistentCache::new(options, logger.clone()),
            logger,
        }
    }

    pub fn persistent(&self) -> &PersistentCache {
        &self.persistent
    }

    /// Cached payload for `(parameters, filename, entry)` without computing.
    pub fn get(
        &self, parameters: &ParameterKey, filename: &str, entry: &EntryKey, use_memmap: bool,
    ) -> CacheResult<Option<Payload>> {
        let key = (*entry, filename.to_string());
        if let Some(hit) = self.memory.as_ref().and_then(|m| m.get(parameters, &key)) {
            return Ok(Some(hit));
        }
        let loaded = self.persistent.load(parameters, filename, entry, use_memmap)?;
        if let (Some(memory), Some(payload)) = (&self.memory, &loaded) {
            memory.save_value(parameters, key, payload.clone());
        }
        Ok(loaded)
    }

    /// Memory, then disk, then `compute`.
    ///
    /// Errors
    /// ------
    /// - Cache failures converted into `E`, or whatever `compute` returns.
    pub fn get_value<E: From<CacheError>>(
        &self, parameters: &ParameterKey, filename: &str, entry: &EntryKey, options: PersistOptions,
        compute: impl FnOnce(&ParameterKey) -> Result<ArrayD<f64>, E>,
    ) -> Result<Payload, E> {
        let key = (*entry, filename.to_string());
        if let Some(hit) = self.memory.as_ref().and_then(|m| m.get(parameters, &key)) {
            debug!(self.logger, "memory tier hit"; "file" => filename);
            return Ok(hit);
        }
        let payload = self.persistent.get_value(parameters, filename, entry, options, compute)?;
        if let Some(memory) = &self.memory {
            memory.save_value(parameters, key, payload.clone());
        }
        Ok(payload)
    }

    /// Overwrite a stored value in both tiers.
    ///
    /// Memory entries derived for the same parameter vector are dropped.
    pub fn save_value(
        &self, parameters: &ParameterKey, filename: &str, entry: &EntryKey, array: ArrayD<f64>,
        options: PersistOptions,
    ) -> CacheResult<Payload> {
        let path =
            self.persistent.save(parameters, filename, entry, array.view(), options.save_also_txt)?;
        let payload = if options.use_memmap {
            read_payload(&path, true)?.1
        } else {
            Payload::owned(array)
        };
        if let Some(memory) = &self.memory {
            memory.replace_value(parameters, (*entry, filename.to_string()), payload.clone());
        }
        Ok(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use std::cell::Cell;

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover:
    // - The lookup order memory → disk → compute.
    // - Overwrites reaching both tiers.
    // -------------------------------------------------------------------------

    fn tiered(root: &std::path::Path, memory: bool) -> TieredCache {
        let options = CacheOptions::new(root, "data_base").with_memory_tier(memory);
        TieredCache::new(&options, crate::logging::discard_logger())
    }

    #[test]
    // Purpose
    // -------
    // After the first computation, a new instance is served from disk and
    // the same instance from memory; the producer runs once overall.
    //
    // Given
    // -----
    // - A shared call counter and two cache instances over one root.
    //
    // Expect
    // ------
    // - One computation across three lookups.
    fn lookups_fall_through_memory_then_disk() {
        // Arrange
        let dir = tempfile::tempdir().unwrap();
        let first = tiered(dir.path(), true);
        let p = ParameterKey::new(&[0.25, 4.0]);
        let calls = Cell::new(0);
        let produce = |_: &ParameterKey| {
            calls.set(calls.get() + 1);
            Ok::<_, CacheError>(array![5.0, 6.0].into_dyn())
        };

        // Act
        first.get_value(&p, "f.bin", &EntryKey::f(), PersistOptions::default(), produce).unwrap();
        first.get_value(&p, "f.bin", &EntryKey::f(), PersistOptions::default(), produce).unwrap();
        let from_disk = tiered(dir.path(), false)
            .get_value(&p, "f.bin", &EntryKey::f(), PersistOptions::default(), produce)
            .unwrap();

        // Assert
        assert_eq!(calls.get(), 1);
        assert_eq!(from_disk.view(), array![5.0, 6.0].into_dyn().view());
    }

    #[test]
    // Purpose
    // -------
    // `save_value` replaces the value seen through both tiers.
    //
    // Given
    // -----
    // - A cached DF of width 1 replaced by a DF of width 2.
    //
    // Expect
    // ------
    // - `get` on the same and on a fresh instance both return width 2.
    fn save_value_overwrites_both_tiers() {
        // Arrange
        let dir = tempfile::tempdir().unwrap();
        let cache = tiered(dir.path(), true);
        let p = ParameterKey::new(&[1.0, 2.0]);
        cache
            .save_value(&p, "df.bin", &EntryKey::df(), array![[1.0], [2.0]].into_dyn(), PersistOptions::default())
            .unwrap();

        // Act
        cache
            .save_value(
                &p,
                "df.bin",
                &EntryKey::df(),
                array![[1.0, 3.0], [2.0, 4.0]].into_dyn(),
                PersistOptions::default(),
            )
            .unwrap();
        let same = cache.get(&p, "df.bin", &EntryKey::df(), false).unwrap().unwrap();
        let fresh = tiered(dir.path(), true).get(&p, "df.bin", &EntryKey::df(), true).unwrap().unwrap();

        // Assert
        assert_eq!(same.shape(), &[2, 2]);
        assert_eq!(fresh.shape(), &[2, 2]);
        assert_eq!(fresh.view(), same.view());
    }
}
