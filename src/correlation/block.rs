//! Closed-form algebra for the two-group block correlation matrix.
//!
//! Purpose
//! -------
//! For `n` observations of group 1 and `m` of group 2, the correlation matrix
//! `C` (`(n+m) × (n+m)`) has unit diagonal, constant correlation `a` inside
//! group 1, `b` inside group 2, and `c` across groups. This module evaluates
//! `ln det C`, `xᵀC⁻¹x` and `XᵀC⁻¹X` without ever forming `C`.
//!
//! Key behaviors
//! -------------
//! - With `W = diag(1-a, 1-b)`, `D = diag(n, m)`, `A = [[a, c], [c, b]]` and
//!   `H = W + D·A`, the Woodbury identity gives
//!   `XᵀC⁻¹X = X₁ᵀX₁/(1-a) + X₂ᵀX₂/(1-b) - sᵀ(W⁻¹AH⁻¹)s`, where `s` holds the
//!   per-group column sums (see [`Projection`]).
//! - `det H = (1+(n-1)a)(1+(m-1)b) - n·m·c²` is the *regularity factor*;
//!   `C` is singular iff it is `<= 0` (given `a, b < 1`).
//! - `ln det C = (n-1)·ln(1-a) + (m-1)·ln(1-b) + ln(det H)`.
//!
//! Invariants & assumptions
//! ------------------------
//! - A constructed [`BlockCorrelation`] has `a, b < 1`, finite parameters,
//!   `n, m >= 1`, and a strictly positive regularity factor, so every
//!   closed-form expression below is finite.
//!
//! Conventions
//! -----------
//! - Group 1 occupies the first `n` rows of stacked data.
use crate::correlation::errors::{CorrelationError, CorrelationResult};
use crate::correlation::params::CorrelationParameters;
use crate::correlation::precision::Precision;
use crate::correlation::projection::{project, project_vector, Projection};
use nalgebra::Matrix2;
use ndarray::{Array2, ArrayView1, ArrayView2};

/// `(1+(n-1)a)(1+(m-1)b) - n·m·c²`.
pub fn regularity_factor(params: &CorrelationParameters, n: usize, m: usize) -> f64 {
    let (n, m) = (n as f64, m as f64);
    let CorrelationParameters { a, b, c } = *params;
    (1.0 + (n - 1.0) * a) * (1.0 + (m - 1.0) * b) - n * m * c * c
}

/// Fail with [`CorrelationError::SingularMatrix`] if the regularity factor is `<= 0`.
pub fn check_regularity(params: &CorrelationParameters, n: usize, m: usize) -> CorrelationResult<()> {
    let regularity = regularity_factor(params, n, m);
    if regularity > 0.0 {
        Ok(())
    } else {
        let CorrelationParameters { a, b, c } = *params;
        Err(CorrelationError::SingularMatrix { a, b, c, n, m, regularity })
    }
}

/// A validated two-group block correlation structure.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlockCorrelation {
    params: CorrelationParameters,
    n: usize,
    m: usize,
}

impl BlockCorrelation {
    /// Errors
    /// ------
    /// - [`CorrelationError::EmptyGroup`] if `n == 0` or `m == 0`.
    /// - [`CorrelationError::SingularMatrix`] if the regularity factor is `<= 0`.
    pub fn new(params: CorrelationParameters, n: usize, m: usize) -> CorrelationResult<Self> {
        if n == 0 || m == 0 {
            return Err(CorrelationError::EmptyGroup { n, m });
        }
        check_regularity(&params, n, m)?;
        Ok(BlockCorrelation { params, n, m })
    }

    pub fn params(&self) -> CorrelationParameters {
        self.params
    }

    pub fn groups(&self) -> (usize, usize) {
        (self.n, self.m)
    }

    pub fn dim(&self) -> usize {
        self.n + self.m
    }

    pub fn regularity_factor(&self) -> f64 {
        regularity_factor(&self.params, self.n, self.m)
    }

    /// Natural log of `det C`.
    pub fn ln_det(&self) -> f64 {
        let CorrelationParameters { a, b, .. } = self.params;
        (self.n as f64 - 1.0) * (1.0 - a).ln()
            + (self.m as f64 - 1.0) * (1.0 - b).ln()
            + self.regularity_factor().ln()
    }

    /// The 2×2 correction `W⁻¹AH⁻¹`.
    pub fn core_matrix(&self) -> CorrelationResult<Matrix2<f64>> {
        let CorrelationParameters { a, b, c } = self.params;
        let w_inv = Matrix2::new(1.0 / (1.0 - a), 0.0, 0.0, 1.0 / (1.0 - b));
        let coupling = Matrix2::new(a, c, c, b);
        let counts = Matrix2::new(self.n as f64, 0.0, 0.0, self.m as f64);
        let h = Matrix2::new(1.0 - a, 0.0, 0.0, 1.0 - b) + counts * coupling;
        let h_inv = h.try_inverse().ok_or(CorrelationError::SingularMatrix {
            a,
            b,
            c,
            n: self.n,
            m: self.m,
            regularity: h.determinant(),
        })?;
        Ok(w_inv * coupling * h_inv)
    }

    /// `XᵀC⁻¹X` from a projection of `X` (`k × k`, symmetrized).
    ///
    /// Errors
    /// ------
    /// - [`CorrelationError::DimensionMismatch`] if the projection was taken
    ///   with other group sizes.
    pub fn projected_product(&self, projection: &Projection) -> CorrelationResult<Array2<f64>> {
        if projection.groups != (self.n, self.m) {
            return Err(CorrelationError::DimensionMismatch {
                expected: self.dim(),
                actual: projection.groups.0 + projection.groups.1,
            });
        }
        let CorrelationParameters { a, b, .. } = self.params;
        let core = self.core_matrix()?;
        let core = Array2::from_shape_fn((2, 2), |(i, j)| core[(i, j)]);
        let sums = &projection.summed;

        let mut product = &projection.squared[0] / (1.0 - a) + &projection.squared[1] / (1.0 - b);
        product -= &sums.t().dot(&core.dot(sums));
        let symmetric = (&product + &product.t()) * 0.5;
        Ok(symmetric)
    }

    /// `XᵀC⁻¹X` for stacked data `X` (`(n+m) × k`).
    pub fn inverse_product(&self, values: ArrayView2<f64>, precision: Precision) -> CorrelationResult<Array2<f64>> {
        self.check_len(values.nrows())?;
        self.projected_product(&project(values, self.n, precision)?)
    }

    /// `xᵀC⁻¹x` for a stacked vector `x` of length `n + m`.
    pub fn quadratic_form(&self, x: ArrayView1<f64>, precision: Precision) -> CorrelationResult<f64> {
        self.check_len(x.len())?;
        let product = self.projected_product(&project_vector(x, self.n, precision)?)?;
        Ok(product[[0, 0]])
    }

    fn check_len(&self, len: usize) -> CorrelationResult<()> {
        if len != self.dim() {
            return Err(CorrelationError::DimensionMismatch { expected: self.dim(), actual: len });
        }
        Ok(())
    }
}
