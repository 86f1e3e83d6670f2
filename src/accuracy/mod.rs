//! accuracy — information matrices, covariances and confidence intervals.
//!
//! Purpose
//! -------
//! Quantify how well measurements determine model parameters once a fit is
//! done, on top of the cached [`crate::database`] outputs and the
//! block-correlation algebra of [`crate::correlation`].
//!
//! Key behaviors
//! -------------
//! - [`CostFunctionKind`] / [`AccuracyKind`]: parse `"OLS"`, `"WLS"`,
//!   `"LWLS"`, `"GLS"`, `"GLS.<min>.<years>"` and `"<DATA>_<CF>"` strings.
//! - [`information`]: per-kind Fisher information, eigen pseudoinverses and
//!   `F` / `H` / `F_H` covariances.
//! - [`confidence`]: Student-t parameter and model confidences and their
//!   averages.
//! - [`Asymptotic`]: binds a database and a cost-function kind.
//! - [`filenames`]: historical result filenames.
//! - [`ExecutionMode`]: serial or `rayon`-parallel per-box fan-out.
//!
//! Invariants & assumptions
//! ------------------------
//! - Degrees of freedom are `m - p > 0`.
//! - `LWLS` parses but has no information matrix.
//!
//! Testing notes
//! -------------
//! - Unit tests per submodule; `tests/database_pipeline.rs` checks the GLS
//!   information matrix against a dense `JᵀΣ⁻¹J`.

pub mod asymptotic;
pub mod confidence;
pub mod errors;
pub mod filenames;
pub mod information;
pub mod kind;
pub mod parallel;

// ---- Re-exports (primary surface) -----------------------------------------

pub use self::asymptotic::Asymptotic;
pub use self::confidence::{average_model_confidence, model_confidence, parameter_confidence, t_quantile};
pub use self::errors::{AccuracyError, AccuracyResult};
pub use self::filenames::ConfidenceSettings;
pub use self::information::{
    correlation_matrix, covariance_matrix, gls_correlation_spec, information_matrix,
    symmetric_pseudo_inverse, variance_factor, EIGEN_EPS,
};
pub use self::kind::{AccuracyKind, CostFunctionKind, MatrixType};
pub use self::parallel::ExecutionMode;

pub mod prelude {
    pub use super::asymptotic::Asymptotic;
    pub use super::errors::{AccuracyError, AccuracyResult};
    pub use super::filenames::ConfidenceSettings;
    pub use super::kind::{AccuracyKind, CostFunctionKind, MatrixType};
    pub use super::parallel::ExecutionMode;
}
