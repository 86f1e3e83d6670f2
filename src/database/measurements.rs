//! Measurement-side collaborators.
//!
//! Measurement sources, land-sea filters, correlation estimators, and legacy
//! artifact readers are external. Each is a small trait so the database can be
//! driven by real stores in production and by fixtures in tests. All methods
//! return `anyhow::Result`; failures surface as
//! [`DataBaseError::Collaborator`](super::DataBaseError::Collaborator).
use crate::database::evaluator::PointSets;
use nalgebra::DMatrix;
use ndarray::{Array1, ArrayD, ArrayView1, ArrayView2};
use std::hash::{Hash, Hasher};
use std::path::Path;

/// Gridded climatology: means, variances, and observation counts per box,
/// each `(tracer, time, x, y, z)`.
pub trait BoxMeasurements {
    fn means(&self) -> anyhow::Result<ArrayD<f64>>;
    fn variances(&self) -> anyhow::Result<ArrayD<f64>>;
    fn nobs(&self) -> anyhow::Result<ArrayD<f64>>;
}

/// Per-box measurement deviation at a given time resolution,
/// `(tracer, time_dim, x, y, z)`.
pub trait DeviationBoxes {
    fn deviation_boxes(&self, time_dim: usize) -> anyhow::Result<ArrayD<f64>>;
}

/// Scattered observations of both tracers.
pub trait PointMeasurements {
    fn points(&self) -> anyhow::Result<PointSets>;
    fn results(&self) -> anyhow::Result<(Array1<f64>, Array1<f64>)>;
    fn deviations(&self) -> anyhow::Result<(Array1<f64>, Array1<f64>)>;
}

/// Marks observations that lie close enough to water on the model grid.
pub trait NearWaterFilter {
    /// One mask per tracer, aligned with [`PointMeasurements::points`].
    fn points_near_water_mask(&self, max_land_boxes: usize) -> anyhow::Result<(Array1<bool>, Array1<bool>)>;
}

/// Estimated correlation matrices of the stacked observations.
pub trait PointCorrelationProvider {
    /// `spec.max_land_boxes` is `Some` for near-water filtered observations.
    fn correlation_matrix(&self, spec: &CorrelationSpec) -> anyhow::Result<DMatrix<f64>>;
}

/// Maps per-site values of one tracer onto the box grid.
pub trait BoxMapper {
    /// `(time_dim, x, y, z)` map; boxes without observations hold `no_data_value`.
    fn points_to_boxes(
        &self, points: ArrayView2<f64>, values: ArrayView1<f64>, time_dim: usize, no_data_value: f64,
    ) -> anyhow::Result<ArrayD<f64>>;
}

/// Readers for the frozen artifacts used by the legacy data kinds.
pub trait LegacyArtifacts {
    /// Root directory of the historical measurement store.
    fn base_dir(&self) -> &Path;
    /// DOP deviations at the observation sites.
    fn dop_point_deviations(&self) -> anyhow::Result<Array1<f64>>;
    fn load_vector(&self, path: &Path) -> anyhow::Result<Array1<f64>>;
    /// Lower-triangular Cholesky factor stored at `path`.
    fn load_cholesky_factor(&self, path: &Path) -> anyhow::Result<DMatrix<f64>>;
}

pub const DEFAULT_MIN_DIAG_VALUE: f64 = 0.1;
pub const LEGACY_MIN_DIAG_VALUE: f64 = 0.01;

/// Parameters of an estimated correlation matrix.
///
/// Equality and hashing compare floats bitwise so the value can key a cache.
#[derive(Debug, Clone, Copy)]
pub struct CorrelationSpec {
    pub min_measurements: usize,
    /// `f64::INFINITY` for no limit.
    pub max_year_diff: f64,
    /// Diagonal floor of the positive-definite approximation.
    pub min_diag_value: f64,
    pub max_land_boxes: Option<usize>,
}

impl CorrelationSpec {
    pub fn new(min_measurements: usize) -> Self {
        CorrelationSpec {
            min_measurements,
            max_year_diff: f64::INFINITY,
            min_diag_value: DEFAULT_MIN_DIAG_VALUE,
            max_land_boxes: None,
        }
    }

    /// Parameters of the frozen matrices read by the legacy data kinds.
    pub fn legacy(min_measurements: usize) -> Self {
        Self::new(min_measurements).with_min_diag_value(LEGACY_MIN_DIAG_VALUE)
    }

    pub fn with_max_year_diff(mut self, max_year_diff: f64) -> Self {
        self.max_year_diff = max_year_diff;
        self
    }

    pub fn with_min_diag_value(mut self, min_diag_value: f64) -> Self {
        self.min_diag_value = min_diag_value;
        self
    }

    pub(crate) fn with_max_land_boxes(mut self, max_land_boxes: Option<usize>) -> Self {
        self.max_land_boxes = max_land_boxes;
        self
    }
}

impl PartialEq for CorrelationSpec {
    fn eq(&self, other: &Self) -> bool {
        self.min_measurements == other.min_measurements
            && self.max_year_diff.to_bits() == other.max_year_diff.to_bits()
            && self.min_diag_value.to_bits() == other.min_diag_value.to_bits()
            && self.max_land_boxes == other.max_land_boxes
    }
}

impl Eq for CorrelationSpec {}

impl Hash for CorrelationSpec {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.min_measurements.hash(state);
        self.max_year_diff.to_bits().hash(state);
        self.min_diag_value.to_bits().hash(state);
        self.max_land_boxes.hash(state);
    }
}
