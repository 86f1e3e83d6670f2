//! ndop_db — parameter-keyed model-output database with Python bindings.
//!
//! Purpose
//! -------
//! Mediate access to an expensive parameterized model evaluator: cache its
//! outputs and Jacobians by parameter vector, reconcile cached results with
//! changing requests (derivative widths, time resolutions, measurement
//! subsets), and evaluate generalized least squares for a two-group block
//! correlation model without forming the dense correlation matrix. When the
//! `python-bindings` feature is enabled, this module also defines the
//! `_ndop_db` extension module exposing the correlation engine.
//!
//! Key behaviors
//! -------------
//! - [`cache`]: memory, parameter-scoped and persistent tiers keyed by
//!   [`cache::ParameterKey`].
//! - [`correlation`]: regularity, log-determinant, projection and projected
//!   quadratic forms of the block correlation matrix.
//! - [`database`]: the data kinds (`Woa`, `Wod`, `WodTmm`, legacy variants)
//!   built on the caches, and `Family`.
//! - [`accuracy`]: information matrices, covariances and confidences.
//! - [`logging`]: `slog` roots for the option structs.
//!
//! Invariants & assumptions
//! ------------------------
//! - Caches are single-threaded (`Rc` / `RefCell`); only the accuracy fan-out
//!   crosses threads, over `Sync` views.
//! - Collaborators (model, measurement providers) are deterministic for a
//!   fixed parameter vector; caching relies on it.
//!
//! Conventions
//! -----------
//! - Point vectors stack DOP measurements before PO4 measurements.
//! - Errors are layered (`CacheError` → `DataBaseError` → `AccuracyError`)
//!   and converted to `ValueError` at the PyO3 boundary.
//!
//! Downstream usage
//! ----------------
//! - Rust callers use [`database::init_data_base`] or the concrete data
//!   kinds, then [`accuracy::Asymptotic`] for post-fit analysis.
//! - Python callers import `_ndop_db.correlation` for the block-correlation
//!   engine.
//!
//! Testing notes
//! -------------
//! - Unit tests in every module; `tests/database_pipeline.rs` runs the data
//!   kinds end to end against a counting fake model in a temp directory.

pub mod accuracy;
pub mod cache;
pub mod correlation;
pub mod database;
pub mod logging;
pub mod utils;

#[cfg(feature = "python-bindings")]
use numpy::{IntoPyArray, PyArray2};

#[cfg(feature = "python-bindings")]
use pyo3::{prelude::*, types::PyAny};

#[cfg(feature = "python-bindings")]
use crate::{
    correlation::{project, project_vector, BlockCorrelation, CorrelationParameters},
    utils::{extract_matrix, extract_precision, extract_vector},
};

/// BlockCorrelation — Python-facing two-group block correlation matrix.
///
/// Purpose
/// -------
/// Expose [`BlockCorrelation`] to Python without ever materializing the
/// `(n + m) × (n + m)` matrix.
///
/// Parameters
/// ----------
/// Constructed from Python via `BlockCorrelation(a, b, c, n, m)`:
/// - `a`, `b`: within-group correlations, each below 1.
/// - `c`: cross-group correlation.
/// - `n`, `m`: group sizes.
///
/// Errors
/// ------
/// - `ValueError` for `a >= 1`, `b >= 1` or a singular matrix.
#[cfg(feature = "python-bindings")]
#[pyclass(module = "ndop_db.correlation", name = "BlockCorrelation")]
pub struct PyBlockCorrelation {
    inner: BlockCorrelation,
}

#[cfg(feature = "python-bindings")]
#[pymethods]
impl PyBlockCorrelation {
    #[new]
    #[pyo3(text_signature = "(a, b, c, n, m, /)")]
    pub fn new(a: f64, b: f64, c: f64, n: usize, m: usize) -> PyResult<Self> {
        let params = CorrelationParameters::new(a, b, c)?;
        Ok(PyBlockCorrelation { inner: BlockCorrelation::new(params, n, m)? })
    }

    /// `(1 + (n-1)a)(1 + (m-1)b) - n·m·c²`.
    #[getter]
    pub fn regularity_factor(&self) -> f64 {
        self.inner.regularity_factor()
    }

    /// Natural log of the determinant.
    #[getter]
    pub fn ln_det(&self) -> f64 {
        self.inner.ln_det()
    }

    /// `xᵀ C⁻¹ x` for a stacked vector `x` of length `n + m`.
    #[pyo3(signature = (x, precision = None), text_signature = "(x, /, precision=None)")]
    pub fn quadratic_form(&self, x: &Bound<'_, PyAny>, precision: Option<&str>) -> PyResult<f64> {
        let x = extract_vector(x)?;
        Ok(self.inner.quadratic_form(x.view(), extract_precision(precision)?)?)
    }

    /// `Xᵀ C⁻¹ X` for stacked columns `X` with `n + m` rows.
    #[pyo3(signature = (values, precision = None), text_signature = "(values, /, precision=None)")]
    pub fn projected_product<'py>(
        &self, py: Python<'py>, values: &Bound<'py, PyAny>, precision: Option<&str>,
    ) -> PyResult<Bound<'py, PyArray2<f64>>> {
        let values = extract_matrix(values)?;
        let (n, _) = self.inner.groups();
        let projection = project(values.view(), n, extract_precision(precision)?)?;
        Ok(self.inner.projected_product(&projection)?.into_pyarray(py))
    }

    /// Squared norms and sums of the two groups of a stacked vector.
    #[pyo3(signature = (x, precision = None), text_signature = "(x, /, precision=None)")]
    pub fn project(
        &self, x: &Bound<'_, PyAny>, precision: Option<&str>,
    ) -> PyResult<((f64, f64), (f64, f64))> {
        let x = extract_vector(x)?;
        let (n, _) = self.inner.groups();
        let projection = project_vector(x.view(), n, extract_precision(precision)?)?;
        Ok((
            (projection.squared[0][[0, 0]], projection.squared[1][[0, 0]]),
            (projection.summed[[0, 0]], projection.summed[[1, 0]]),
        ))
    }
}

/// _ndop_db — PyO3 module initializer for the Python extension.
///
/// Registers the `correlation` submodule and makes it importable as
/// `ndop_db.correlation`.
#[cfg(feature = "python-bindings")]
#[pymodule]
fn _ndop_db<'py>(_py: Python<'py>, m: &Bound<'py, PyModule>) -> PyResult<()> {
    let correlation_mod = PyModule::new(_py, "correlation")?;
    correlation_mod.add_class::<PyBlockCorrelation>()?;
    m.add_submodule(&correlation_mod)?;

    // Manually add submodules into sys.modules to allow for dot notation.
    _py.import("sys")?
        .getattr("modules")?
        .set_item("ndop_db.correlation", correlation_mod)?;
    Ok(())
}
