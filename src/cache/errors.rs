//! Errors for the cache tiers (filename templates, payload files, parameter sets).
//!
//! This module defines [`CacheError`], the single error type returned by the
//! memory, persistent, and tiered caches. Filesystem failures are captured as
//! strings together with the offending path so the enum stays `Clone` and
//! comparable in tests.
//!
//! ## Conventions
//! - Paths are reported exactly as the cache tried to access them.
//! - A payload whose qualifiers disagree with the request is **not** an error;
//!   the persistent tier treats it as a miss and recomputes.
//! - Failures raised by a compute callback never pass through this type; they
//!   are returned in the caller's own error type.
use std::path::{Path, PathBuf};

/// Result alias for cache operations that may produce [`CacheError`].
pub type CacheResult<T> = Result<T, CacheError>;

/// Unified error type for the cache tiers.
#[derive(Debug, Clone, PartialEq)]
pub enum CacheError {
    // ---- Filesystem ----
    /// Reading, writing, renaming, or mapping a file failed.
    Io { path: PathBuf, message: String },

    /// A text file that must exist in a parameter-set directory is missing.
    MissingFile { path: PathBuf },

    // ---- Payload format ----
    /// The payload header is malformed or truncated.
    InvalidPayload { path: PathBuf, reason: &'static str },

    /// The payload was written by a newer format revision.
    UnsupportedVersion { path: PathBuf, version: u32 },

    // ---- Parameter sets ----
    /// A `parameters.txt` or numeric text file holds a token that is not a float.
    InvalidNumber { path: PathBuf, line: usize, token: String },

    // ---- Filename templates ----
    /// A placeholder names a field that was not supplied.
    MissingTemplateField { template: String, field: String },

    /// A `{` without a matching `}` (or a lone `}`).
    UnbalancedBraces { template: String },

    /// A placeholder uses a format spec outside the supported subset.
    UnsupportedFormatSpec { template: String, spec: String },
}

impl CacheError {
    pub(crate) fn io(path: &Path, err: std::io::Error) -> Self {
        CacheError::Io { path: path.to_path_buf(), message: err.to_string() }
    }
}

impl std::error::Error for CacheError {}

impl std::fmt::Display for CacheError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            // ---- Filesystem ----
            CacheError::Io { path, message } => {
                write!(f, "Cache Error: I/O failure at {}: {message}", path.display())
            }
            CacheError::MissingFile { path } => {
                write!(f, "Cache Error: required file {} does not exist", path.display())
            }
            // ---- Payload format ----
            CacheError::InvalidPayload { path, reason } => {
                write!(f, "Cache Error: invalid payload {}: {reason}", path.display())
            }
            CacheError::UnsupportedVersion { path, version } => {
                write!(
                    f,
                    "Cache Error: payload {} has unsupported format version {version}",
                    path.display()
                )
            }
            // ---- Parameter sets ----
            CacheError::InvalidNumber { path, line, token } => {
                write!(
                    f,
                    "Cache Error: {} line {line}: '{token}' is not a floating point value",
                    path.display()
                )
            }
            // ---- Filename templates ----
            CacheError::MissingTemplateField { template, field } => {
                write!(f, "Cache Error: template '{template}' needs field '{field}'")
            }
            CacheError::UnbalancedBraces { template } => {
                write!(f, "Cache Error: template '{template}' has unbalanced braces")
            }
            CacheError::UnsupportedFormatSpec { template, spec } => {
                write!(f, "Cache Error: template '{template}' uses unsupported format spec '{spec}'")
            }
        }
    }
}

#[cfg(feature = "python-bindings")]
impl From<CacheError> for pyo3::PyErr {
    fn from(err: CacheError) -> pyo3::PyErr {
        pyo3::exceptions::PyIOError::new_err(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover:
    // - `Display` messages carrying the offending path and field.
    // - The `io` helper preserving the path of the failing operation.
    // -------------------------------------------------------------------------

    #[test]
    // Purpose
    // -------
    // Ensure template errors name both the template and the missing field.
    //
    // Given
    // -----
    // - `MissingTemplateField` for template "f_{time_dim}.bin".
    //
    // Expect
    // ------
    // - The rendered message contains both strings.
    fn missing_template_field_message_names_template_and_field() {
        // Arrange
        let err = CacheError::MissingTemplateField {
            template: "f_{time_dim}.bin".to_string(),
            field: "time_dim".to_string(),
        };

        // Act
        let msg = err.to_string();

        // Assert
        assert!(msg.contains("f_{time_dim}.bin"));
        assert!(msg.contains("'time_dim'"));
    }

    #[test]
    // Purpose
    // -------
    // Verify that `CacheError::io` keeps the path and the OS message.
    //
    // Given
    // -----
    // - A synthetic `NotFound` I/O error at "/tmp/x.bin".
    //
    // Expect
    // ------
    // - `CacheError::Io` with the same path and a non-empty message.
    fn io_helper_preserves_path() {
        // Arrange
        let path = Path::new("/tmp/x.bin");
        let os = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");

        // Act
        let err = CacheError::io(path, os);

        // Assert
        match err {
            CacheError::Io { path: p, message } => {
                assert_eq!(p, PathBuf::from("/tmp/x.bin"));
                assert!(message.contains("gone"));
            }
            other => panic!("expected Io, got {other:?}"),
        }
    }
}
