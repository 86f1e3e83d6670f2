//! Point measurements restricted to sites near water on the model grid.
//!
//! [`WodTmm`] wraps another point database and keeps only the observations
//! within `max_land_boxes` land boxes of water. Every vector, Jacobian, and
//! point set of the inner database is filtered with the same mask, so the
//! DOP-then-PO4 stacking is preserved. Site outputs are only cached in
//! memory; the inner database keeps its own cache of the unfiltered values.
use crate::cache::{FilenameTemplate, MemoryCache, ParameterKey};
use crate::database::base::{lower_cholesky, DataBase, DataBaseCore, PointCaches, PointDataBase};
use crate::database::errors::DataBaseResult;
use crate::database::evaluator::{ModelEvaluator, PointSets};
use crate::database::legacy::{legacy_cholesky, LEGACY_TMM_CHOLESKY_TEMPLATE};
use crate::database::measurements::{
    CorrelationSpec, LegacyArtifacts, NearWaterFilter, PointCorrelationProvider, PointMeasurements,
};
use crate::database::options::{DataBaseOptions, OutputCaching};
use crate::database::wod::Wod;
use nalgebra::DMatrix;
use ndarray::{Array1, Array2, ArrayD, Axis};
use std::rc::Rc;

/// Row indices kept by the near-water mask.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Selection {
    dop: Vec<usize>,
    po4: Vec<usize>,
    /// Indices into the stacked DOP-then-PO4 vectors.
    stacked: Vec<usize>,
}

impl Selection {
    fn from_masks(dop: &Array1<bool>, po4: &Array1<bool>) -> Self {
        let kept = |mask: &Array1<bool>| -> Vec<usize> {
            mask.iter().enumerate().filter_map(|(i, &keep)| keep.then_some(i)).collect()
        };
        let (dop_kept, po4_kept) = (kept(dop), kept(po4));
        let stacked = dop_kept.iter().copied().chain(po4_kept.iter().map(|i| i + dop.len())).collect();
        Selection { dop: dop_kept, po4: po4_kept, stacked }
    }
}

pub struct WodTmm<W = Wod> {
    core: DataBaseCore,
    inner: W,
    filter: Rc<dyn NearWaterFilter>,
    correlations: Rc<dyn PointCorrelationProvider>,
    legacy: Option<Rc<dyn LegacyArtifacts>>,
    max_land_boxes: usize,
    caches: PointCaches,
    masks: MemoryCache<(), Rc<(Array1<bool>, Array1<bool>)>>,
    selection: MemoryCache<(), Rc<Selection>>,
}

impl WodTmm<Wod> {
    pub fn new(
        evaluator: Rc<dyn ModelEvaluator>, measurements: Rc<dyn PointMeasurements>,
        filter: Rc<dyn NearWaterFilter>, correlations: Rc<dyn PointCorrelationProvider>,
        max_land_boxes: usize, options: &DataBaseOptions,
    ) -> Self {
        let wod = Wod::new(evaluator, measurements, correlations.clone(), options);
        WodTmm::wrap("WOD_TMM", wod, filter, correlations, None, max_land_boxes, options)
    }
}

impl<W: PointDataBase> WodTmm<W> {
    pub(crate) fn wrap(
        name: &str, inner: W, filter: Rc<dyn NearWaterFilter>,
        correlations: Rc<dyn PointCorrelationProvider>, legacy: Option<Rc<dyn LegacyArtifacts>>,
        max_land_boxes: usize, options: &DataBaseOptions,
    ) -> Self {
        let evaluator = inner.core().evaluator().clone();
        let name = format!("{name}_{max_land_boxes}");
        WodTmm {
            core: DataBaseCore::new(name, evaluator, OutputCaching::Memory, options),
            inner,
            filter,
            correlations,
            legacy,
            max_land_boxes,
            caches: PointCaches::new(),
            masks: MemoryCache::new(),
            selection: MemoryCache::new(),
        }
    }

    pub fn max_land_boxes(&self) -> usize {
        self.max_land_boxes
    }

    /// The unfiltered database.
    pub fn inner(&self) -> &W {
        &self.inner
    }

    /// Per-tracer masks of the inner observations that are kept.
    pub fn points_near_water_mask(&self) -> DataBaseResult<Rc<(Array1<bool>, Array1<bool>)>> {
        self.masks.get_value(&(), || {
            Ok(Rc::new(self.filter.points_near_water_mask(self.max_land_boxes)?))
        })
    }

    /// Both masks stacked DOP-then-PO4.
    pub fn points_near_water_mask_concatenated(&self) -> DataBaseResult<Array1<bool>> {
        let masks = self.points_near_water_mask()?;
        Ok(masks.0.iter().chain(masks.1.iter()).copied().collect())
    }

    fn selection(&self) -> DataBaseResult<Rc<Selection>> {
        self.selection.get_value(&(), || {
            let masks = self.points_near_water_mask()?;
            let inner = self.inner.points()?;
            assert_eq!(
                (masks.0.len(), masks.1.len()),
                inner.counts(),
                "{}: near-water masks must cover every inner observation",
                self.core.name()
            );
            Ok(Rc::new(Selection::from_masks(&masks.0, &masks.1)))
        })
    }

    fn select(&self, values: &Array1<f64>) -> DataBaseResult<Array1<f64>> {
        let selection = self.selection()?;
        Ok(values.select(Axis(0), &selection.stacked))
    }

    fn select_rows(&self, values: &Array2<f64>) -> DataBaseResult<Array2<f64>> {
        let selection = self.selection()?;
        Ok(values.select(Axis(0), &selection.stacked))
    }
}

impl<W: PointDataBase> DataBase for WodTmm<W> {
    fn core(&self) -> &DataBaseCore {
        &self.core
    }

    fn evaluate(&self, parameters: &ParameterKey) -> DataBaseResult<Array1<f64>> {
        self.select(&self.inner.f(parameters.values())?)
    }

    fn derivative(&self, parameters: &ParameterKey) -> DataBaseResult<Array2<f64>> {
        self.select_rows(&self.inner.df(parameters.values())?)
    }

    fn observed_results(&self) -> DataBaseResult<Array1<f64>> {
        self.select(&*self.inner.results()?)
    }

    fn observed_deviations(&self) -> DataBaseResult<Array1<f64>> {
        self.select(&*self.inner.deviations()?)
    }

    // Box deviations are not filtered; the inner database owns the source.
    fn deviations_boxes(&self, time_dim: usize) -> DataBaseResult<Rc<ArrayD<f64>>> {
        self.inner.deviations_boxes(time_dim)
    }

    fn inverse_deviations_boxes(&self, time_dim: usize) -> DataBaseResult<Rc<ArrayD<f64>>> {
        self.inner.inverse_deviations_boxes(time_dim)
    }
}

impl<W: PointDataBase> PointDataBase for WodTmm<W> {
    fn point_caches(&self) -> &PointCaches {
        &self.caches
    }

    fn points_calculate(&self) -> DataBaseResult<PointSets> {
        let inner = self.inner.points()?;
        let selection = self.selection()?;
        Ok(PointSets::new(
            inner.dop.select(Axis(0), &selection.dop),
            inner.po4.select(Axis(0), &selection.po4),
        ))
    }

    fn correlation_matrix_calculate(&self, spec: &CorrelationSpec) -> DataBaseResult<DMatrix<f64>> {
        let spec = spec.with_max_land_boxes(Some(self.max_land_boxes));
        Ok(self.correlations.correlation_matrix(&spec)?)
    }

    fn default_min_diag_value(&self) -> f64 {
        self.inner.default_min_diag_value()
    }

    fn correlation_matrix_cholesky_decomposition_calculate(
        &self, spec: &CorrelationSpec,
    ) -> DataBaseResult<DMatrix<f64>> {
        match &self.legacy {
            Some(artifacts) => {
                let template = FilenameTemplate::new(LEGACY_TMM_CHOLESKY_TEMPLATE);
                legacy_cholesky(artifacts.as_ref(), &template, spec, Some(self.max_land_boxes))
            }
            None => lower_cholesky(&*self.correlation_matrix(spec)?),
        }
    }
}
