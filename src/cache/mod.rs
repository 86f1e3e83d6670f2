//! cache — parameter-keyed memoization of model outputs.
//!
//! Purpose
//! -------
//! Avoid recomputing expensive model outputs. Values are addressed by the
//! parameter vector they were computed for and by a typed entry key, and are
//! kept in memory, on disk, or both.
//!
//! Key behaviors
//! -------------
//! - [`MemoryCache`]: typed-key memo for values that do not depend on model
//!   parameters (measurement statistics, correlation matrices).
//! - [`ParameterMemoryCache`]: outputs of the most recent parameter vector
//!   only; a new vector evicts the previous one.
//! - [`PersistentCache`]: `parameter_set_NNNNN/` directories with binary
//!   payload files that can be read back as memory maps.
//! - [`TieredCache`]: memory tier in front of the persistent tier.
//! - [`FilenameTemplate`]: `{field}` substitution with Python-compatible
//!   number formatting for on-disk names.
//!
//! Invariants & assumptions
//! ------------------------
//! - Parameter vectors are compared exactly (see [`ParameterKey`]).
//! - A hit never recomputes; a miss computes exactly once and stores the
//!   result before returning it.
//! - A stored payload whose [`Qualifiers`] differ from the request is a miss.
//!
//! Conventions
//! -----------
//! - Caches are single-threaded (`RefCell`); wrap the owning object in a lock
//!   to share it across threads.
//! - Compute callbacks return the caller's own error type `E: From<CacheError>`,
//!   so failures of the model evaluator are not wrapped.
//!
//! Downstream usage
//! ----------------
//! - `database::DataBaseCore` owns one [`TieredCache`] for box outputs and
//!   selects either a [`ParameterMemoryCache`] or the [`TieredCache`] for
//!   observation-site outputs.
//!
//! Testing notes
//! -------------
//! - Unit tests in each submodule; persistent tests run in `tempfile`
//!   directories.

pub mod errors;
pub mod key;
pub mod memory;
pub mod options;
pub mod parameter;
pub mod payload;
pub mod persistent;
pub mod template;
pub mod tiered;

// ---- Re-exports (primary surface) -----------------------------------------

pub use self::errors::{CacheError, CacheResult};
pub use self::key::{EntryKey, ParameterKey, Qualifiers, Quantity};
pub use self::memory::MemoryCache;
pub use self::options::{CacheOptions, PersistOptions};
pub use self::parameter::ParameterMemoryCache;
pub use self::payload::{read_payload, write_payload, Payload};
pub use self::persistent::PersistentCache;
pub use self::template::{python_float_repr, python_scientific, FilenameTemplate, TemplateValue};
pub use self::tiered::TieredCache;

pub mod prelude {
    pub use super::errors::{CacheError, CacheResult};
    pub use super::key::{EntryKey, ParameterKey};
    pub use super::options::{CacheOptions, PersistOptions};
    pub use super::payload::Payload;
    pub use super::template::FilenameTemplate;
    pub use super::tiered::TieredCache;
}
