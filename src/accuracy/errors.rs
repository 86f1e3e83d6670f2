//! Errors for accuracy computations.
//!
//! [`AccuracyError`] wraps database and correlation failures, rejects
//! malformed configuration strings and statistical settings, and carries
//! `statrs` and `anyhow` failures as strings.
use crate::correlation::CorrelationError;
use crate::database::DataBaseError;

/// Result alias for accuracy routines.
pub type AccuracyResult<T> = Result<T, AccuracyError>;

#[derive(Debug, Clone, PartialEq)]
pub enum AccuracyError {
    // ---- Layers ----
    DataBase(DataBaseError),

    Correlation(CorrelationError),

    // ---- Configuration ----
    /// A cost-function kind string is not recognized.
    UnknownCostFunctionKind { value: String, allowed: &'static str },

    /// A covariance approximation name is not recognized.
    UnknownMatrixType { value: String },

    /// The cost-function kind has no information matrix implementation.
    UnsupportedInformation { kind: String },

    /// GLS requires correlated point measurements.
    RequiresPointData { data_base: String },

    /// The chosen covariance approximation needs the cost-function Hessian.
    MissingHessian,

    // ---- Statistics ----
    /// Confidence level must lie in `(0, 1)`.
    InvalidAlpha { alpha: f64 },

    /// At least `p + 1` measurements are required for `p` parameters.
    NotEnoughMeasurements { measurements: usize, parameters: usize },

    /// Matrix or vector sizes disagree with the parameter count.
    DimensionMismatch { expected: usize, actual: usize },

    /// A `statrs` distribution could not be built.
    Distribution(String),

    // ---- Anyhow catchall ----
    Anyhow(String),
}

impl std::error::Error for AccuracyError {}

impl std::fmt::Display for AccuracyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            // ---- Layers ----
            AccuracyError::DataBase(err) => write!(f, "Accuracy Error: {err}"),
            AccuracyError::Correlation(err) => write!(f, "Accuracy Error: {err}"),
            // ---- Configuration ----
            AccuracyError::UnknownCostFunctionKind { value, allowed } => {
                write!(f, "Accuracy Error: cost function kind '{value}' unknown; must be one of {allowed}")
            }
            AccuracyError::UnknownMatrixType { value } => {
                write!(f, "Accuracy Error: matrix type '{value}' unknown; must be one of 'F_H', 'F', 'H'")
            }
            AccuracyError::UnsupportedInformation { kind } => {
                write!(f, "Accuracy Error: no information matrix for cost function kind {kind}")
            }
            AccuracyError::RequiresPointData { data_base } => {
                write!(f, "Accuracy Error: GLS needs point measurements; {data_base} is gridded")
            }
            AccuracyError::MissingHessian => {
                write!(f, "Accuracy Error: matrix type needs the cost function Hessian")
            }
            // ---- Statistics ----
            AccuracyError::InvalidAlpha { alpha } => {
                write!(f, "Accuracy Error: confidence level must lie in (0, 1); got {alpha}")
            }
            AccuracyError::NotEnoughMeasurements { measurements, parameters } => write!(
                f,
                "Accuracy Error: {measurements} measurements cannot determine {parameters} parameters"
            ),
            AccuracyError::DimensionMismatch { expected, actual } => {
                write!(f, "Accuracy Error: expected dimension {expected}, got {actual}")
            }
            AccuracyError::Distribution(msg) => write!(f, "Accuracy Error: {msg}"),
            // ---- Anyhow catchall ----
            AccuracyError::Anyhow(msg) => write!(f, "Accuracy Error: {msg}"),
        }
    }
}

impl From<DataBaseError> for AccuracyError {
    fn from(err: DataBaseError) -> Self {
        AccuracyError::DataBase(err)
    }
}

impl From<CorrelationError> for AccuracyError {
    fn from(err: CorrelationError) -> Self {
        AccuracyError::Correlation(err)
    }
}

impl From<statrs::StatsError> for AccuracyError {
    fn from(err: statrs::StatsError) -> Self {
        AccuracyError::Distribution(err.to_string())
    }
}

impl From<anyhow::Error> for AccuracyError {
    fn from(err: anyhow::Error) -> Self {
        AccuracyError::Anyhow(err.to_string())
    }
}

#[cfg(feature = "python-bindings")]
impl From<AccuracyError> for pyo3::PyErr {
    fn from(err: AccuracyError) -> pyo3::PyErr {
        pyo3::exceptions::PyValueError::new_err(err.to_string())
    }
}
