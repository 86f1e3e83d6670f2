//! database — model outputs paired with the measurements they are fit to.
//!
//! Purpose
//! -------
//! Provide every quantity a cost function needs: model values `F` and
//! Jacobians `DF` at the measurement sites, observed results, deviations and
//! their derived statistics, box-grid model fields, and (for point data)
//! correlation structure. Model evaluations are expensive, so every output is
//! cached.
//!
//! Key behaviors
//! -------------
//! - [`DataBaseCore`] + [`DataBase`]: shared caching machinery and provided
//!   operations; concrete kinds implement four hooks.
//! - Data kinds: [`Woa`] (gridded climatology), [`Wod`] (scattered points of
//!   two tracers), [`WodTmm`] (near-water subset), and the legacy
//!   [`OldWod`] / [`OldWodTmm`].
//! - [`PointDataBase`]: correlation matrices, Cholesky factors, and the
//!   block-correlation GLS operations for point kinds.
//! - [`DataKind`] + [`init_data_base`]: construction from configuration strings.
//! - [`Family`]: members sharing one database handle.
//!
//! Invariants & assumptions
//! ------------------------
//! - `F.len() == DF.nrows() == m` and `DF.ncols() == p`; box series have the
//!   requested time dimension. Violations panic.
//! - Point vectors stack DOP observations first, then PO4.
//!
//! Conventions
//! -----------
//! - Collaborators (model, measurements, filters) are trait objects behind
//!   `Rc`; their `anyhow` errors surface as [`DataBaseError::Collaborator`].
//! - Logging goes to the `slog::Logger` in [`DataBaseOptions`].
//!
//! Testing notes
//! -------------
//! - Unit tests per submodule; `tests/database_pipeline.rs` drives the data
//!   kinds end to end with a counting fake evaluator.

pub mod base;
pub mod errors;
pub mod evaluator;
pub mod family;
pub mod keys;
pub mod kind;
pub mod legacy;
pub mod measurements;
pub mod options;
pub mod reconcile;
pub mod resample;
pub mod woa;
pub mod wod;
pub mod wod_tmm;

// ---- Re-exports (primary surface) -----------------------------------------

pub use self::base::{lower_cholesky, DataBase, DataBaseCore, PointCaches, PointDataBase};
pub use self::errors::{DataBaseError, DataBaseResult};
pub use self::evaluator::{ModelEvaluator, PointSets};
pub use self::family::{Family, FamilyRegistry};
pub use self::keys::{MatrixKey, MeasurementKey};
pub use self::kind::{init_data_base, AnyDataBase, Collaborators, DataKind};
pub use self::legacy::{OldWod, OldWodTmm};
pub use self::measurements::{
    BoxMapper, BoxMeasurements, CorrelationSpec, DeviationBoxes, LegacyArtifacts, NearWaterFilter,
    PointCorrelationProvider, PointMeasurements,
};
pub use self::options::{DataBaseOptions, OutputCaching, OutputTemplates, DEFAULT_BOXES_T_DIM};
pub use self::reconcile::{reconcile_columns, ColumnReconciliation};
pub use self::resample::change_time_dim;
pub use self::woa::{AnnualThreshold, Woa};
pub use self::wod::Wod;
pub use self::wod_tmm::WodTmm;

pub mod prelude {
    pub use super::base::{DataBase, PointDataBase};
    pub use super::errors::{DataBaseError, DataBaseResult};
    pub use super::evaluator::{ModelEvaluator, PointSets};
    pub use super::kind::{init_data_base, Collaborators, DataKind};
    pub use super::measurements::CorrelationSpec;
    pub use super::options::DataBaseOptions;
}
