//! correlation — two-group block correlation algebra for GLS.
//!
//! Purpose
//! -------
//! Evaluate generalized-least-squares quantities for measurements of two
//! tracers whose correlation matrix has the constant-block form described in
//! [`block`], in `O((n+m)·k²)` time and without materializing the matrix.
//!
//! Key behaviors
//! -------------
//! - [`CorrelationParameters`] validates `(a, b, c)`.
//! - [`check_regularity`] / [`regularity_factor`] decide invertibility.
//! - [`project`] reduces stacked data to per-group Gram matrices and column
//!   sums, optionally in double-double precision ([`Precision::Extended`]).
//! - [`BlockCorrelation`] combines projections with `(a, b, c)` into
//!   `XᵀC⁻¹X`, `xᵀC⁻¹x`, and `ln det C`.
//!
//! Invariants & assumptions
//! ------------------------
//! - Data are stacked group 1 first; the split index is the size of group 1.
//! - All routines are pure; errors are returned as [`CorrelationError`].
//!
//! Downstream usage
//! ----------------
//! - `database::PointDataBase` builds a [`BlockCorrelation`] from fitted
//!   correlation parameters and per-tracer measurement counts.
//! - `accuracy` uses [`BlockCorrelation::projected_product`] for GLS
//!   information matrices.
//!
//! Testing notes
//! -------------
//! - Closed forms are checked against dense `nalgebra` Cholesky solves.

pub mod block;
pub mod errors;
pub mod params;
pub mod precision;
pub mod projection;

// ---- Re-exports (primary surface) -----------------------------------------

pub use self::block::{check_regularity, regularity_factor, BlockCorrelation};
pub use self::errors::{CorrelationError, CorrelationResult};
pub use self::params::CorrelationParameters;
pub use self::precision::Precision;
pub use self::projection::{project, project_squared, project_summed, project_vector, Projection};

pub mod prelude {
    pub use super::block::BlockCorrelation;
    pub use super::errors::{CorrelationError, CorrelationResult};
    pub use super::params::CorrelationParameters;
    pub use super::precision::Precision;
    pub use super::projection::{project, Projection};
}
