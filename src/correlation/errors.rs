//! Errors for block-correlation algebra.
//!
//! All variants describe invalid inputs; the closed-form routines themselves
//! cannot fail once a [`BlockCorrelation`](super::BlockCorrelation) has been
//! constructed.

/// Result alias for correlation routines.
pub type CorrelationResult<T> = Result<T, CorrelationError>;

#[derive(Debug, Clone, PartialEq)]
pub enum CorrelationError {
    // ---- Parameters ----
    /// Exactly three parameters `(a, b, c)` are required.
    InvalidParameterCount { actual: usize },

    /// A parameter is NaN/±inf.
    NonFiniteParameter { index: usize, value: f64 },

    /// Within-group correlations must be strictly below one.
    WithinGroupTooLarge { name: &'static str, value: f64 },

    /// `(1 + (n-1)a)(1 + (m-1)b) - n·m·c² <= 0`: the matrix is singular or
    /// indefinite.
    SingularMatrix { a: f64, b: f64, c: f64, n: usize, m: usize, regularity: f64 },

    // ---- Shapes ----
    /// Both groups must contain at least one observation.
    EmptyGroup { n: usize, m: usize },

    /// The group split index must lie inside the data.
    SplitOutOfRange { split: usize, len: usize },

    /// Vector or projection dimensions disagree with the group sizes.
    DimensionMismatch { expected: usize, actual: usize },
}

impl std::error::Error for CorrelationError {}

impl std::fmt::Display for CorrelationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            // ---- Parameters ----
            CorrelationError::InvalidParameterCount { actual } => {
                write!(f, "Correlation Error: expected 3 parameters (a, b, c), got {actual}")
            }
            CorrelationError::NonFiniteParameter { index, value } => {
                write!(f, "Correlation Error: parameter {index} is non-finite: {value}")
            }
            CorrelationError::WithinGroupTooLarge { name, value } => {
                write!(f, "Correlation Error: within-group correlation {name} must be < 1; got {value}")
            }
            CorrelationError::SingularMatrix { a, b, c, n, m, regularity } => write!(
                f,
                "Correlation Error: correlation matrix with a={a}, b={b}, c={c}, n={n}, m={m} is \
                 singular (regularity factor {regularity} <= 0)"
            ),
            // ---- Shapes ----
            CorrelationError::EmptyGroup { n, m } => {
                write!(f, "Correlation Error: both groups must be non-empty (n={n}, m={m})")
            }
            CorrelationError::SplitOutOfRange { split, len } => {
                write!(f, "Correlation Error: split index {split} outside 0..={len}")
            }
            CorrelationError::DimensionMismatch { expected, actual } => {
                write!(f, "Correlation Error: expected dimension {expected}, got {actual}")
            }
        }
    }
}

#[cfg(feature = "python-bindings")]
impl From<CorrelationError> for pyo3::PyErr {
    fn from(err: CorrelationError) -> pyo3::PyErr {
        pyo3::exceptions::PyValueError::new_err(err.to_string())
    }
}
