//! Configuration for the persistent and tiered caches.
use std::path::{Path, PathBuf};

/// Directory layout and tier selection of a cache.
///
/// Values live at `<root>/parameter_set_NNNNN/<cache_dirname>/<filename>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheOptions {
    pub root: PathBuf,
    pub cache_dirname: String,
    /// Keep the most recent parameter vector's payloads in memory as well.
    pub use_memory_tier: bool,
}

impl CacheOptions {
    pub fn new(root: impl Into<PathBuf>, cache_dirname: impl Into<String>) -> Self {
        CacheOptions { root: root.into(), cache_dirname: cache_dirname.into(), use_memory_tier: true }
    }

    pub fn with_memory_tier(mut self, use_memory_tier: bool) -> Self {
        self.use_memory_tier = use_memory_tier;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

/// Per-request persistence switches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PersistOptions {
    /// Serve loaded payloads as read-only memory maps.
    pub use_memmap: bool,
    /// Write a human-readable `.txt` copy next to each stored payload.
    pub save_also_txt: bool,
}

impl PersistOptions {
    pub const fn memmap(use_memmap: bool) -> Self {
        PersistOptions { use_memmap, save_also_txt: false }
    }
}
