//! Scattered point-measurement data kind.
//!
//! [`Wod`] evaluates the model at each observation site of both tracers. All
//! per-site vectors stack DOP sites first, then PO4 sites; Jacobians stack
//! their rows the same way. Site outputs are kept in the persistent tier.
use crate::cache::ParameterKey;
use crate::database::base::{DataBase, DataBaseCore, PointCaches, PointDataBase};
use crate::database::errors::{DataBaseError, DataBaseResult};
use crate::database::evaluator::{ModelEvaluator, PointSets};
use crate::database::measurements::{
    BoxMapper, CorrelationSpec, DeviationBoxes, PointCorrelationProvider, PointMeasurements,
};
use crate::database::options::{DataBaseOptions, OutputCaching, OutputTemplates};
use nalgebra::DMatrix;
use ndarray::{s, Array1, Array2, ArrayD, ArrayView1};
use std::rc::Rc;

pub struct Wod {
    core: DataBaseCore,
    measurements: Rc<dyn PointMeasurements>,
    correlations: Rc<dyn PointCorrelationProvider>,
    box_mapper: Option<Rc<dyn BoxMapper>>,
    caches: PointCaches,
}

impl Wod {
    pub fn new(
        evaluator: Rc<dyn ModelEvaluator>, measurements: Rc<dyn PointMeasurements>,
        correlations: Rc<dyn PointCorrelationProvider>, options: &DataBaseOptions,
    ) -> Self {
        Self::named("WOD", evaluator, measurements, correlations, options)
    }

    pub(crate) fn named(
        name: &str, evaluator: Rc<dyn ModelEvaluator>, measurements: Rc<dyn PointMeasurements>,
        correlations: Rc<dyn PointCorrelationProvider>, options: &DataBaseOptions,
    ) -> Self {
        let outputs = OutputCaching::Persistent(OutputTemplates::wod());
        Wod {
            core: DataBaseCore::new(name, evaluator, outputs, options),
            measurements,
            correlations,
            box_mapper: None,
            caches: PointCaches::new(),
        }
    }

    pub fn with_box_mapper(mut self, mapper: Rc<dyn BoxMapper>) -> Self {
        self.box_mapper = Some(mapper);
        self
    }

    pub fn with_deviation_boxes(mut self, source: Rc<dyn DeviationBoxes>) -> Self {
        self.core = self.core.with_deviation_boxes(source);
        self
    }

    /// Spread a stacked per-site vector onto the box grid, one map per tracer.
    ///
    /// Errors
    /// ------
    /// - [`DataBaseError::MissingCollaborator`] without a box mapper.
    ///
    /// Panics
    /// ------
    /// - If `data` does not have one value per measurement.
    pub fn convert_to_boxes(
        &self, data: ArrayView1<f64>, time_dim: usize, no_data_value: f64,
    ) -> DataBaseResult<[ArrayD<f64>; 2]> {
        let mapper = self
            .box_mapper
            .as_ref()
            .ok_or(DataBaseError::MissingCollaborator { name: "box mapper" })?;
        let points = self.points()?;
        let split = points.dop.nrows();
        assert_eq!(data.len(), points.total(), "{}: one value per measurement expected", self.name());
        let (dop, po4) = (data.slice(s![..split]), data.slice(s![split..]));
        Ok([
            mapper.points_to_boxes(points.dop.view(), dop, time_dim, no_data_value)?,
            mapper.points_to_boxes(points.po4.view(), po4, time_dim, no_data_value)?,
        ])
    }
}

pub(crate) fn concat_tracers((dop, po4): (Array1<f64>, Array1<f64>)) -> Array1<f64> {
    dop.iter().chain(po4.iter()).copied().collect()
}

/// Stack the per-tracer Jacobians row-wise.
///
/// Panics
/// ------
/// - If the two blocks have different column counts.
pub(crate) fn stack_tracers((dop, po4): (Array2<f64>, Array2<f64>)) -> Array2<f64> {
    assert_eq!(dop.ncols(), po4.ncols(), "tracer Jacobians must have equal widths");
    let mut stacked = Array2::zeros((dop.nrows() + po4.nrows(), dop.ncols()));
    stacked.slice_mut(s![..dop.nrows(), ..]).assign(&dop);
    stacked.slice_mut(s![dop.nrows().., ..]).assign(&po4);
    stacked
}

impl DataBase for Wod {
    fn core(&self) -> &DataBaseCore {
        &self.core
    }

    fn evaluate(&self, parameters: &ParameterKey) -> DataBaseResult<Array1<f64>> {
        let points = self.points()?;
        Ok(concat_tracers(self.core.evaluator().f_points(parameters.values(), &points)?))
    }

    fn derivative(&self, parameters: &ParameterKey) -> DataBaseResult<Array2<f64>> {
        let points = self.points()?;
        Ok(stack_tracers(self.core.evaluator().df_points(parameters.values(), &points)?))
    }

    fn observed_results(&self) -> DataBaseResult<Array1<f64>> {
        Ok(concat_tracers(self.measurements.results()?))
    }

    fn observed_deviations(&self) -> DataBaseResult<Array1<f64>> {
        Ok(concat_tracers(self.measurements.deviations()?))
    }
}

impl PointDataBase for Wod {
    fn point_caches(&self) -> &PointCaches {
        &self.caches
    }

    fn points_calculate(&self) -> DataBaseResult<PointSets> {
        Ok(self.measurements.points()?)
    }

    fn correlation_matrix_calculate(&self, spec: &CorrelationSpec) -> DataBaseResult<DMatrix<f64>> {
        Ok(self.correlations.correlation_matrix(&spec.with_max_land_boxes(None))?)
    }
}
