//! The model-evaluator seam and observation-site coordinates.
//!
//! A [`ModelEvaluator`] runs the (expensive) biogeochemical model. The
//! database never looks inside it; it only asks for values and Jacobians on
//! the box grid or at observation sites and caches what comes back.
use ndarray::{Array1, Array2, ArrayD};

/// Observation coordinates of both tracers.
///
/// Each array is `(n_i, 4)` with columns `(t, x, y, z)`; row order defines
/// the order of every per-site vector derived from it.
#[derive(Debug, Clone, PartialEq)]
pub struct PointSets {
    pub dop: Array2<f64>,
    pub po4: Array2<f64>,
}

impl PointSets {
    pub fn new(dop: Array2<f64>, po4: Array2<f64>) -> Self {
        PointSets { dop, po4 }
    }

    pub fn counts(&self) -> (usize, usize) {
        (self.dop.nrows(), self.po4.nrows())
    }

    pub fn total(&self) -> usize {
        self.dop.nrows() + self.po4.nrows()
    }
}

/// Deterministic model evaluation.
///
/// Shape contract
/// --------------
/// - `f_boxes(p, t)`: `(tracer, t, x, y, z)`.
/// - `df_boxes(p, t)`: `(tracer, t, x, y, z, q)` with the parameter axis last;
///   `q` is usually `p.len()` but may be larger when the model appends extra
///   partial derivatives.
/// - `f_points(p, points)`: one vector per tracer, lengths `points.counts()`.
/// - `df_points(p, points)`: one `(n_i, q)` matrix per tracer.
pub trait ModelEvaluator {
    fn f_boxes(&self, parameters: &[f64], time_dim: usize) -> anyhow::Result<ArrayD<f64>>;

    fn df_boxes(&self, parameters: &[f64], time_dim: usize) -> anyhow::Result<ArrayD<f64>>;

    fn f_points(
        &self, parameters: &[f64], points: &PointSets,
    ) -> anyhow::Result<(Array1<f64>, Array1<f64>)>;

    fn df_points(
        &self, parameters: &[f64], points: &PointSets,
    ) -> anyhow::Result<(Array2<f64>, Array2<f64>)>;

    /// Finite-difference step used for Jacobians; part of Jacobian cache filenames.
    fn derivative_step_size(&self) -> f64;
}
