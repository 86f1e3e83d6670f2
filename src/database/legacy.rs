//! Legacy point data kinds backed by frozen artifacts.
//!
//! [`OldWod`] and [`OldWodTmm`] reproduce historical cost-function setups:
//! PO4 deviations and the Cholesky factors of the correlation matrices are
//! read from a fixed directory layout instead of being estimated. Those
//! artifacts exist for a single configuration (diagonal floor `0.01`, no year
//! limit); any other request is rejected.
use crate::cache::{FilenameTemplate, ParameterKey, TemplateValue};
use crate::database::base::{DataBase, DataBaseCore, PointCaches, PointDataBase};
use crate::database::errors::{DataBaseError, DataBaseResult};
use crate::database::evaluator::{ModelEvaluator, PointSets};
use crate::database::measurements::{
    CorrelationSpec, LegacyArtifacts, NearWaterFilter, PointCorrelationProvider, PointMeasurements,
    LEGACY_MIN_DIAG_VALUE,
};
use crate::database::options::DataBaseOptions;
use crate::database::wod::{concat_tracers, Wod};
use crate::database::wod_tmm::WodTmm;
use nalgebra::DMatrix;
use ndarray::{Array1, Array2};
use std::rc::Rc;

pub const LEGACY_PO4_DEVIATION_PATH: &str =
    "po4/wod13/analysis/deviation/old/interpolated_deviation_lexsorted_points_0.1,2,0.2,1.npy";

pub const LEGACY_CHOLESKY_TEMPLATE: &str = "all/pw/correlation/old/lsm_48_woa13r/\
correlation_matrix.min_{min_measurements}_measurements.max_inf_year_diff.positive_definite.\
default_ordering.reordering_True.min_diag_1e-02.cholesky_factors.csc.ppy";

pub const LEGACY_TMM_CHOLESKY_TEMPLATE: &str =
    "all/pw_nearest_lsm_tmm_{max_land_boxes}/correlation/old/lsm_48_woa13r/\
correlation_matrix.min_{min_measurements}_measurements.max_inf_year_diff.positive_definite.\
default_ordering.reordering_True.min_diag_1e-02.cholesky_factors.csc.ppy";

/// Errors
/// ------
/// - [`DataBaseError::LegacyParameterMismatch`] unless `spec` is the frozen
///   configuration.
pub(crate) fn check_legacy_spec(spec: &CorrelationSpec) -> DataBaseResult<()> {
    if spec.min_diag_value != LEGACY_MIN_DIAG_VALUE {
        return Err(DataBaseError::LegacyParameterMismatch {
            name: "min_diag_value",
            expected: LEGACY_MIN_DIAG_VALUE,
            actual: spec.min_diag_value,
        });
    }
    if spec.max_year_diff != f64::INFINITY {
        return Err(DataBaseError::LegacyParameterMismatch {
            name: "max_year_diff",
            expected: f64::INFINITY,
            actual: spec.max_year_diff,
        });
    }
    Ok(())
}

pub(crate) fn legacy_cholesky(
    artifacts: &dyn LegacyArtifacts, template: &FilenameTemplate, spec: &CorrelationSpec,
    max_land_boxes: Option<usize>,
) -> DataBaseResult<DMatrix<f64>> {
    check_legacy_spec(spec)?;
    let mut fields = vec![("min_measurements", TemplateValue::from(spec.min_measurements))];
    if let Some(max_land_boxes) = max_land_boxes {
        fields.push(("max_land_boxes", TemplateValue::from(max_land_boxes)));
    }
    let path = artifacts.base_dir().join(template.render(&fields)?);
    Ok(artifacts.load_cholesky_factor(&path)?)
}

/// Point measurements with frozen PO4 deviations and correlation factors.
pub struct OldWod {
    wod: Wod,
    artifacts: Rc<dyn LegacyArtifacts>,
}

impl OldWod {
    pub fn new(
        evaluator: Rc<dyn ModelEvaluator>, measurements: Rc<dyn PointMeasurements>,
        correlations: Rc<dyn PointCorrelationProvider>, artifacts: Rc<dyn LegacyArtifacts>,
        options: &DataBaseOptions,
    ) -> Self {
        OldWod { wod: Wod::named("OLDWOD", evaluator, measurements, correlations, options), artifacts }
    }
}

impl DataBase for OldWod {
    fn core(&self) -> &DataBaseCore {
        self.wod.core()
    }

    fn evaluate(&self, parameters: &ParameterKey) -> DataBaseResult<Array1<f64>> {
        self.wod.evaluate(parameters)
    }

    fn derivative(&self, parameters: &ParameterKey) -> DataBaseResult<Array2<f64>> {
        self.wod.derivative(parameters)
    }

    fn observed_results(&self) -> DataBaseResult<Array1<f64>> {
        self.wod.observed_results()
    }

    fn observed_deviations(&self) -> DataBaseResult<Array1<f64>> {
        let dop = self.artifacts.dop_point_deviations()?;
        let po4_path = self.artifacts.base_dir().join(LEGACY_PO4_DEVIATION_PATH);
        let po4 = self.artifacts.load_vector(&po4_path)?;
        Ok(concat_tracers((dop, po4)))
    }
}

impl PointDataBase for OldWod {
    fn point_caches(&self) -> &PointCaches {
        self.wod.point_caches()
    }

    fn points_calculate(&self) -> DataBaseResult<PointSets> {
        self.wod.points_calculate()
    }

    fn correlation_matrix_calculate(&self, spec: &CorrelationSpec) -> DataBaseResult<DMatrix<f64>> {
        self.wod.correlation_matrix_calculate(spec)
    }

    fn default_min_diag_value(&self) -> f64 {
        LEGACY_MIN_DIAG_VALUE
    }

    fn correlation_matrix_cholesky_decomposition_calculate(
        &self, spec: &CorrelationSpec,
    ) -> DataBaseResult<DMatrix<f64>> {
        let template = FilenameTemplate::new(LEGACY_CHOLESKY_TEMPLATE);
        legacy_cholesky(self.artifacts.as_ref(), &template, spec, None)
    }
}

/// Near-water subset of [`OldWod`] with its own frozen correlation factors.
pub type OldWodTmm = WodTmm<OldWod>;

impl WodTmm<OldWod> {
    pub fn legacy(
        evaluator: Rc<dyn ModelEvaluator>, measurements: Rc<dyn PointMeasurements>,
        filter: Rc<dyn NearWaterFilter>, correlations: Rc<dyn PointCorrelationProvider>,
        artifacts: Rc<dyn LegacyArtifacts>, max_land_boxes: usize, options: &DataBaseOptions,
    ) -> Self {
        let inner =
            OldWod::new(evaluator, measurements, correlations.clone(), artifacts.clone(), options);
        WodTmm::wrap("OLDWOD_TMM", inner, filter, correlations, Some(artifacts), max_land_boxes, options)
    }
}
