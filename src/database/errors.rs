//! Unified error handling for the DataBase hierarchy.
//!
//! [`DataBaseError`] wraps failures of the cache tiers and the correlation
//! engine, reports configuration problems (unknown data kinds, missing
//! collaborators, legacy parameter mismatches), and carries collaborator
//! failures (`anyhow::Error`) as strings.
//!
//! Shape invariants of model outputs are **not** reported here: they indicate
//! programming errors and abort with a panic.
use crate::cache::CacheError;
use crate::correlation::CorrelationError;

/// Result alias for DataBase operations.
pub type DataBaseResult<T> = Result<T, DataBaseError>;

#[derive(Debug, Clone, PartialEq)]
pub enum DataBaseError {
    // ---- Layers ----
    Cache(CacheError),

    Correlation(CorrelationError),

    // ---- Configuration ----
    /// A data-kind string is not recognized.
    UnknownDataKind { value: String, allowed: String },

    /// A collaborator required by the chosen data kind was not supplied.
    MissingCollaborator { name: &'static str },

    /// A requested time dimension is finer than the stored series.
    InvalidTimeDim { requested: usize, available: usize },

    /// `default_boxes_t_dim` must be at least 1.
    InvalidDefaultTimeDim { value: usize },

    /// Legacy artifacts exist only for one frozen configuration value.
    LegacyParameterMismatch { name: &'static str, expected: f64, actual: f64 },

    // ---- Numerical ----
    /// A correlation matrix is not positive definite.
    NotPositiveDefinite { dim: usize },

    // ---- Collaborators ----
    /// Failure reported by an evaluator, measurement source, or other collaborator.
    Collaborator(String),
}

impl std::error::Error for DataBaseError {}

impl std::fmt::Display for DataBaseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            // ---- Layers ----
            DataBaseError::Cache(err) => write!(f, "DataBase Error: {err}"),
            DataBaseError::Correlation(err) => write!(f, "DataBase Error: {err}"),
            // ---- Configuration ----
            DataBaseError::UnknownDataKind { value, allowed } => {
                write!(f, "DataBase Error: data kind '{value}' unknown; must be one of {allowed}")
            }
            DataBaseError::MissingCollaborator { name } => {
                write!(f, "DataBase Error: collaborator '{name}' is required but was not provided")
            }
            DataBaseError::InvalidTimeDim { requested, available } => write!(
                f,
                "DataBase Error: time dimension {requested} is finer than the stored {available}"
            ),
            DataBaseError::InvalidDefaultTimeDim { value } => {
                write!(f, "DataBase Error: default boxes time dimension must be >= 1; got {value}")
            }
            DataBaseError::LegacyParameterMismatch { name, expected, actual } => write!(
                f,
                "DataBase Error: legacy artifacts only exist for {name} = {expected}; got {actual}"
            ),
            // ---- Numerical ----
            DataBaseError::NotPositiveDefinite { dim } => {
                write!(f, "DataBase Error: {dim}x{dim} correlation matrix is not positive definite")
            }
            // ---- Collaborators ----
            DataBaseError::Collaborator(msg) => write!(f, "DataBase Error: {msg}"),
        }
    }
}

impl From<CacheError> for DataBaseError {
    fn from(err: CacheError) -> Self {
        DataBaseError::Cache(err)
    }
}

impl From<CorrelationError> for DataBaseError {
    fn from(err: CorrelationError) -> Self {
        DataBaseError::Correlation(err)
    }
}

impl From<anyhow::Error> for DataBaseError {
    fn from(err: anyhow::Error) -> Self {
        DataBaseError::Collaborator(format!("{err:#}"))
    }
}

#[cfg(feature = "python-bindings")]
impl From<DataBaseError> for pyo3::PyErr {
    fn from(err: DataBaseError) -> pyo3::PyErr {
        pyo3::exceptions::PyValueError::new_err(err.to_string())
    }
}
