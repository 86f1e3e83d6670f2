//! accuracy::information — information matrices and parameter covariances.
//!
//! Purpose
//! -------
//! Turn a database's Jacobian and measurement statistics into the Fisher
//! information of each cost-function kind, and invert it into a parameter
//! covariance with eigen-based pseudoinverses.
//!
//! Key behaviors
//! -------------
//! - OLS: `I = JᵀJ / σ̄²` with `σ̄²` the average variance.
//! - WLS: `I = Jᵀ diag(1/σ²) J`.
//! - GLS: `I = (D⁻¹J)ᵀ C⁻¹ (D⁻¹J)` with `D = diag(σ)`.
//!   - `GLS.<min>.<years>`: `C` is the estimated site correlation matrix for
//!     those thresholds, applied through its Cholesky factor `L` as
//!     `(L⁻¹D⁻¹J)ᵀ(L⁻¹D⁻¹J)`.
//!   - `GLS`: `C` is the two-group block correlation matrix, evaluated
//!     through the projected product so `C` is never formed.
//! - Covariances: `F → I⁺`, `H → H⁺`, `F_H → H⁺ I H⁺`.
//!
//! Invariants & assumptions
//! ------------------------
//! - Cost-function Hessians are expected on the information scale (half the
//!   Hessian of the sum of squares).
//! - Eigenvalues at most [`EIGEN_EPS`] are dropped from pseudoinverses,
//!   inflating variances along weakly identified directions.
//!
//! Conventions
//! -----------
//! - `J` is `(m, p)` as returned by `DataBase::df`.
use crate::accuracy::errors::{AccuracyError, AccuracyResult};
use crate::accuracy::kind::{CostFunctionKind, MatrixType};
use crate::correlation::Precision;
use crate::database::{AnyDataBase, CorrelationSpec, DataBase, DataBaseError, PointDataBase};
use nalgebra::DMatrix;
use ndarray::{Array1, Array2, Axis};

/// Eigenvalues at most this large are treated as zero.
pub const EIGEN_EPS: f64 = 1e-12;

fn require_point_data(data_base: &AnyDataBase) -> AccuracyResult<&dyn PointDataBase> {
    data_base.as_point_data_base().ok_or_else(|| AccuracyError::RequiresPointData {
        data_base: data_base.as_data_base().name().to_string(),
    })
}

pub fn information_matrix_ols<D: DataBase + ?Sized>(
    data_base: &D, parameters: &[f64],
) -> AccuracyResult<Array2<f64>> {
    let df = data_base.df(parameters)?;
    Ok(df.t().dot(&df) * data_base.inverse_average_variance()?)
}

pub fn information_matrix_wls<D: DataBase + ?Sized>(
    data_base: &D, parameters: &[f64],
) -> AccuracyResult<Array2<f64>> {
    let df = data_base.df(parameters)?;
    let inverse_variances = data_base.inverse_variances()?;
    let weighted = &df * &inverse_variances.view().insert_axis(Axis(1));
    Ok(df.t().dot(&weighted))
}

/// Correlation matrix parameters of `GLS.<min_values>.<max_year_diff>` on
/// `data_base`, with the data kind's own diagonal floor.
pub fn gls_correlation_spec<D: PointDataBase + ?Sized>(
    data_base: &D, min_values: usize, max_year_diff: f64,
) -> CorrelationSpec {
    CorrelationSpec::new(min_values)
        .with_max_year_diff(max_year_diff)
        .with_min_diag_value(data_base.default_min_diag_value())
}

/// `L⁻¹ X` for the lower Cholesky factor `L` of the correlation matrix `spec`.
fn whiten<D: PointDataBase + ?Sized>(
    data_base: &D, spec: &CorrelationSpec, values: &DMatrix<f64>,
) -> AccuracyResult<DMatrix<f64>> {
    let factor = data_base.correlation_matrix_cholesky_decomposition(spec)?;
    let dim = factor.nrows();
    if dim != values.nrows() {
        return Err(AccuracyError::DimensionMismatch { expected: dim, actual: values.nrows() });
    }
    factor
        .solve_lower_triangular(values)
        .ok_or(AccuracyError::DataBase(DataBaseError::NotPositiveDefinite { dim }))
}

fn normalized_jacobian<D: PointDataBase + ?Sized>(
    data_base: &D, parameters: &[f64],
) -> AccuracyResult<Array2<f64>> {
    let df = data_base.df(parameters)?;
    let inverse_deviations = data_base.inverse_deviations()?;
    Ok(&df * &inverse_deviations.view().insert_axis(Axis(1)))
}

/// GLS information with the estimated site correlation matrix of `spec`.
///
/// Errors
/// ------
/// - [`DataBaseError::NotPositiveDefinite`] if the correlation matrix has no
///   Cholesky factor.
/// - [`AccuracyError::DimensionMismatch`] if the matrix does not cover every
///   measurement.
pub fn information_matrix_gls<D: PointDataBase + ?Sized>(
    data_base: &D, parameters: &[f64], spec: &CorrelationSpec,
) -> AccuracyResult<Array2<f64>> {
    let normalized = normalized_jacobian(data_base, parameters)?;
    let (m, p) = normalized.dim();
    let whitened = whiten(data_base, spec, &DMatrix::from_fn(m, p, |i, j| normalized[[i, j]]))?;
    let gram = whitened.transpose() * &whitened;
    Ok(Array2::from_shape_fn((p, p), |(i, j)| gram[(i, j)]))
}

/// GLS information with the two-group block correlation matrix.
///
/// Errors
/// ------
/// - Missing or invalid correlation parameters for `parameters`.
/// - [`CorrelationError::SingularMatrix`](crate::correlation::CorrelationError::SingularMatrix)
///   for a singular block matrix.
pub fn information_matrix_block_gls<D: PointDataBase + ?Sized>(
    data_base: &D, parameters: &[f64], precision: Precision,
) -> AccuracyResult<Array2<f64>> {
    let normalized = normalized_jacobian(data_base, parameters)?;
    let params = data_base.correlation_parameters(parameters)?;
    let projection = data_base.project(normalized.view(), data_base.m_dop()?, precision)?;
    Ok(data_base.projected_product_inverse_correlation_matrix_both_sides(&projection, &params)?)
}

/// Fisher information of `kind` at `parameters`, `(p, p)`.
///
/// Errors
/// ------
/// - [`AccuracyError::UnsupportedInformation`] for `LWLS`.
/// - [`AccuracyError::RequiresPointData`] for `GLS` on gridded data.
pub fn information_matrix(
    kind: &CostFunctionKind, data_base: &AnyDataBase, parameters: &[f64], precision: Precision,
) -> AccuracyResult<Array2<f64>> {
    match kind {
        CostFunctionKind::Ols => information_matrix_ols(data_base.as_data_base(), parameters),
        CostFunctionKind::Wls => information_matrix_wls(data_base.as_data_base(), parameters),
        CostFunctionKind::Lwls => {
            Err(AccuracyError::UnsupportedInformation { kind: kind.to_string() })
        }
        CostFunctionKind::Gls { min_values, max_year_diff } => {
            let point = require_point_data(data_base)?;
            let spec = gls_correlation_spec(point, *min_values, *max_year_diff);
            information_matrix_gls(point, parameters, &spec)
        }
        CostFunctionKind::BlockGls => {
            information_matrix_block_gls(require_point_data(data_base)?, parameters, precision)
        }
    }
}

/// Weighted residual sum of squares of `kind` at `parameters`.
///
/// Errors
/// ------
/// - Same as [`information_matrix`].
pub fn cost_function_value(
    kind: &CostFunctionKind, data_base: &AnyDataBase, parameters: &[f64], precision: Precision,
) -> AccuracyResult<f64> {
    let db = data_base.as_data_base();
    let residuals = || -> AccuracyResult<Array1<f64>> { Ok(&*db.results()? - &db.f(parameters)?) };
    match kind {
        CostFunctionKind::Ols => {
            let r = residuals()?;
            Ok(r.dot(&r) * db.inverse_average_variance()?)
        }
        CostFunctionKind::Wls => {
            let r = residuals()?;
            Ok((&r * &r * &*db.inverse_variances()?).sum())
        }
        CostFunctionKind::Lwls => {
            Err(AccuracyError::UnsupportedInformation { kind: kind.to_string() })
        }
        CostFunctionKind::Gls { min_values, max_year_diff } => {
            let point = require_point_data(data_base)?;
            let spec = gls_correlation_spec(point, *min_values, *max_year_diff);
            let normalized = point.diff(parameters, true)?;
            let column = DMatrix::from_iterator(normalized.len(), 1, normalized.iter().copied());
            Ok(whiten(point, &spec, &column)?.norm_squared())
        }
        CostFunctionKind::BlockGls => {
            let point = require_point_data(data_base)?;
            let normalized = point.diff(parameters, true)?;
            let params = point.correlation_parameters(parameters)?;
            Ok(point.block_correlation(&params)?.quadratic_form(normalized.view(), precision)?)
        }
    }
}

/// `cost / (m - p)`.
///
/// Errors
/// ------
/// - [`AccuracyError::NotEnoughMeasurements`] if `m <= p`.
pub fn variance_factor(cost: f64, measurements: usize, parameters: usize) -> AccuracyResult<f64> {
    if measurements <= parameters {
        return Err(AccuracyError::NotEnoughMeasurements { measurements, parameters });
    }
    Ok(cost / (measurements - parameters) as f64)
}

/// Moore–Penrose pseudoinverse of a symmetric matrix via eigen truncation.
///
/// Panics
/// ------
/// - If `matrix` is not square.
pub fn symmetric_pseudo_inverse(matrix: &Array2<f64>) -> Array2<f64> {
    let n = matrix.nrows();
    assert_eq!(matrix.ncols(), n, "pseudoinverse needs a square matrix");
    let eigen = DMatrix::from_fn(n, n, |i, j| matrix[[i, j]]).symmetric_eigen();
    let q = &eigen.eigenvectors;
    let mut inverse = Array2::<f64>::zeros((n, n));
    for (k, &lambda) in eigen.eigenvalues.iter().enumerate() {
        if lambda > EIGEN_EPS {
            for i in 0..n {
                let coeff = q[(i, k)] / lambda;
                for j in 0..n {
                    inverse[[i, j]] += coeff * q[(j, k)];
                }
            }
        }
    }
    inverse
}

/// `H⁺` for a `(p, p)` Hessian.
///
/// Errors
/// ------
/// - [`AccuracyError::MissingHessian`] if `hessian` is `None`.
/// - [`AccuracyError::DimensionMismatch`] if the Hessian is not `(p, p)`.
pub fn inverse_hessian(hessian: Option<&Array2<f64>>, p: usize) -> AccuracyResult<Array2<f64>> {
    let hessian = hessian.ok_or(AccuracyError::MissingHessian)?;
    if hessian.dim() != (p, p) {
        return Err(AccuracyError::DimensionMismatch { expected: p, actual: hessian.nrows() });
    }
    Ok(symmetric_pseudo_inverse(hessian))
}

/// Parameter covariance for `matrix_type`.
///
/// Errors
/// ------
/// - Same as [`inverse_hessian`] for `H` and `F_H`.
pub fn covariance_matrix(
    matrix_type: MatrixType, information: &Array2<f64>, hessian: Option<&Array2<f64>>,
) -> AccuracyResult<Array2<f64>> {
    let p = information.nrows();
    match matrix_type {
        MatrixType::F => Ok(symmetric_pseudo_inverse(information)),
        MatrixType::H => inverse_hessian(hessian, p),
        MatrixType::FH => {
            let h = inverse_hessian(hessian, p)?;
            Ok(h.dot(information).dot(&h))
        }
    }
}

/// `cov_ij / sqrt(cov_ii · cov_jj)`; NaN rows for zero variances.
pub fn correlation_matrix(covariance: &Array2<f64>) -> Array2<f64> {
    let scale = covariance.diag().mapv(|v| 1.0 / v.sqrt());
    let mut correlation = covariance.clone();
    for ((i, j), value) in correlation.indexed_iter_mut() {
        *value *= scale[i] * scale[j];
    }
    correlation
}
