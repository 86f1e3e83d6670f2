//! Gridded climatology data kind.
//!
//! Purpose
//! -------
//! [`Woa`] compares model box fields with a gridded climatology. Each box with
//! at least one observation is one measurement. Boxes shallower than the
//! annual threshold depth contribute one measurement per time step; deeper
//! boxes contribute one measurement, the time mean.
//!
//! Conventions
//! -----------
//! - Box arrays are `(tracer, time, x, y, z)`; Jacobians append the parameter
//!   axis. The mask is `nobs > 0` with the same leading shape.
//! - Measurement order: all monthly boxes in row-major order over
//!   `(tracer, time, x, y, z < index)`, then all annual boxes over
//!   `(tracer, x, y, z ≥ index)`.
//! - Deviations are standard errors `sqrt(variance / nobs)`; annual ones are
//!   scaled by `1/12`.
use crate::cache::{MemoryCache, ParameterKey};
use crate::database::base::{DataBase, DataBaseCore};
use crate::database::errors::DataBaseResult;
use crate::database::evaluator::ModelEvaluator;
use crate::database::keys::MeasurementKey;
use crate::database::measurements::{BoxMeasurements, DeviationBoxes};
use crate::database::options::{DataBaseOptions, OutputCaching, OutputTemplates};
use ndarray::{s, Array1, Array2, ArrayD, ArrayView5, ArrayViewD, Axis, Ix5, Ix6, Zip};
use std::rc::Rc;

/// Scale of annual-mean deviations relative to monthly ones.
pub const ANNUAL_FACTOR: f64 = 1.0 / 12.0;

/// Vertical layout of the box grid.
#[derive(Debug, Clone, PartialEq)]
pub struct AnnualThreshold {
    /// Upper edge depth of each vertical layer, increasing.
    pub z_left: Vec<f64>,
    /// Layers whose upper edge lies deeper than this are averaged over time.
    pub depth: f64,
}

impl AnnualThreshold {
    pub fn new(z_left: Vec<f64>, depth: f64) -> Self {
        AnnualThreshold { z_left, depth }
    }

    /// Number of leading layers that keep their full time resolution.
    pub fn index(&self) -> usize {
        self.z_left.partition_point(|&z| z <= self.depth)
    }
}

pub struct Woa {
    core: DataBaseCore,
    measurements: Rc<dyn BoxMeasurements>,
    annual_threshold_index: usize,
    mask: MemoryCache<(), Rc<ArrayD<bool>>>,
}

impl Woa {
    pub fn new(
        evaluator: Rc<dyn ModelEvaluator>, measurements: Rc<dyn BoxMeasurements>,
        annual_threshold: &AnnualThreshold, options: &DataBaseOptions,
    ) -> Self {
        let outputs = OutputCaching::Persistent(OutputTemplates::woa());
        let core = DataBaseCore::new("WOA", evaluator, outputs, options);
        Woa {
            core,
            measurements,
            annual_threshold_index: annual_threshold.index(),
            mask: MemoryCache::new(),
        }
    }

    pub fn with_deviation_boxes(mut self, source: Rc<dyn DeviationBoxes>) -> Self {
        self.core = self.core.with_deviation_boxes(source);
        self
    }

    pub fn annual_threshold_index(&self) -> usize {
        self.annual_threshold_index
    }

    /// `nobs > 0` per box.
    pub fn mask(&self) -> DataBaseResult<Rc<ArrayD<bool>>> {
        self.mask.get_value(&(), || {
            let nobs = self.measurements.nobs()?;
            Ok(Rc::new(nobs.mapv(|n| n > 0.0)))
        })
    }

    pub fn results_boxes(&self) -> DataBaseResult<Rc<ArrayD<f64>>> {
        self.core.field(MeasurementKey::ResultsBoxes, || Ok(self.measurements.means()?))
    }

    /// Standard error of each box mean; not finite where `nobs == 0`.
    pub fn mean_deviations_boxes(&self) -> DataBaseResult<Rc<ArrayD<f64>>> {
        self.core.field(MeasurementKey::MeanDeviationsBoxes, || {
            let variances = self.measurements.variances()?;
            let nobs = self.measurements.nobs()?;
            Ok(Zip::from(&variances).and(&nobs).map_collect(|&v, &n| (v / n).sqrt()))
        })
    }

    /// Box residuals `results - f_boxes`; boxes without observations hold
    /// `no_data_value`.
    pub fn diff_boxes(
        &self, parameters: &[f64], normalize_with_deviation: bool, no_data_value: f64,
    ) -> DataBaseResult<ArrayD<f64>> {
        let results = self.results_boxes()?;
        let f = self.f_boxes(parameters, self.core.default_boxes_t_dim(), false)?;
        let mut diff = &*results - &f.view();
        if normalize_with_deviation {
            diff /= &*self.mean_deviations_boxes()?;
        }
        let mask = self.mask()?;
        Zip::from(&mut diff).and(&*mask).for_each(|d, &keep| {
            if !keep {
                *d = no_data_value;
            }
        });
        Ok(diff)
    }

    fn measurement_rows(
        &self, data: ArrayViewD<f64>, annual_factor: f64,
    ) -> DataBaseResult<Array2<f64>> {
        let mask = self.mask()?;
        let mask = match mask.view().into_dimensionality::<Ix5>() {
            Ok(mask) => mask,
            Err(_) => panic!("{}: mask must be (tracer, time, x, y, z)", self.core.name()),
        };
        Ok(split_annual(data, mask, self.annual_threshold_index, annual_factor))
    }
}

/// Collect the masked boxes of `data` as rows, averaging deep layers over time.
///
/// `data` is `(tracer, time, x, y, z)` or `(tracer, time, x, y, z, k)`; the
/// result is `(measurements, k)` with `k = 1` for rank-5 input.
///
/// Panics
/// ------
/// - If the leading five axes of `data` differ from the mask shape.
fn split_annual(
    data: ArrayViewD<f64>, mask: ArrayView5<bool>, index: usize, annual_factor: f64,
) -> Array2<f64> {
    let data = if data.ndim() == 5 { data.insert_axis(Axis(5)) } else { data };
    let shape = data.shape().to_vec();
    let data = match data.into_dimensionality::<Ix6>() {
        Ok(data) => data,
        Err(_) => panic!("box data has unexpected shape {shape:?}"),
    };
    assert_eq!(&shape[..5], mask.shape(), "box data and mask shapes differ");
    let k = shape[5];
    let index = index.min(shape[4]);

    let mut values = Vec::new();
    let mut rows = 0;
    for ((t, ti, x, y, z), &keep) in mask.slice(s![.., .., .., .., ..index]).indexed_iter() {
        if keep {
            values.extend(data.slice(s![t, ti, x, y, z, ..]).iter());
            rows += 1;
        }
    }
    if shape[1] > 0 {
        let deep = data.slice(s![.., .., .., .., index.., ..]);
        if let Some(annual) = deep.mean_axis(Axis(1)) {
            for ((t, x, y, z), &keep) in mask.slice(s![.., 0, .., .., index..]).indexed_iter() {
                if keep {
                    values.extend(annual.slice(s![t, x, y, z, ..]).iter().map(|v| v * annual_factor));
                    rows += 1;
                }
            }
        }
    }
    match Array2::from_shape_vec((rows, k), values) {
        Ok(rows) => rows,
        Err(_) => unreachable!("one row of k values per kept box"),
    }
}

impl DataBase for Woa {
    fn core(&self) -> &DataBaseCore {
        &self.core
    }

    fn evaluate(&self, parameters: &ParameterKey) -> DataBaseResult<Array1<f64>> {
        let f = self.core.f_boxes(parameters, self.core.default_boxes_t_dim(), false)?;
        Ok(self.measurement_rows(f.view(), 1.0)?.column(0).to_owned())
    }

    fn derivative(&self, parameters: &ParameterKey) -> DataBaseResult<Array2<f64>> {
        let df = self.core.df_boxes(parameters, self.core.default_boxes_t_dim(), false)?;
        self.measurement_rows(df.view(), 1.0)
    }

    fn observed_results(&self) -> DataBaseResult<Array1<f64>> {
        let results = self.results_boxes()?;
        Ok(self.measurement_rows(results.view(), 1.0)?.column(0).to_owned())
    }

    fn observed_deviations(&self) -> DataBaseResult<Array1<f64>> {
        let deviations = self.mean_deviations_boxes()?;
        Ok(self.measurement_rows(deviations.view(), ANNUAL_FACTOR)?.column(0).to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array;

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover:
    // - Threshold index from layer depths.
    // - Monthly/annual measurement layout and annual scaling.
    // - Jacobian rows keeping the parameter axis.
    // -------------------------------------------------------------------------

    #[test]
    fn annual_threshold_index_counts_shallow_layers() {
        let threshold = AnnualThreshold::new(vec![0.0, 50.0, 120.0, 220.0], 100.0);
        assert_eq!(threshold.index(), 2);
        assert_eq!(AnnualThreshold::new(vec![0.0, 50.0], 1000.0).index(), 2);
        assert_eq!(AnnualThreshold::new(vec![10.0], 0.0).index(), 0);
    }

    #[test]
    // Purpose
    // -------
    // Shallow boxes give one row per month; deep boxes one scaled time mean.
    //
    // Given
    // -----
    // - One tracer, two months, 1×1 horizontal, two layers, index 1.
    // - Values: layer 0 → [1, 2], layer 1 → [4, 6]; all boxes observed.
    //
    // Expect
    // ------
    // - Rows [1, 2, 5·factor].
    fn split_annual_orders_monthly_then_annual() {
        // Arrange
        let data = Array::from_shape_vec((1, 2, 1, 1, 2), vec![1.0, 4.0, 2.0, 6.0]).unwrap().into_dyn();
        let mask = Array::from_elem((1, 2, 1, 1, 2), true);

        // Act
        let rows = split_annual(data.view(), mask.view(), 1, 0.5);

        // Assert
        assert_eq!(rows.column(0).to_vec(), vec![1.0, 2.0, 2.5]);
    }

    #[test]
    // Purpose
    // -------
    // Unobserved boxes are skipped and Jacobians keep their parameter axis.
    //
    // Given
    // -----
    // - Same grid, layer-0 month-1 box unobserved, two parameters.
    //
    // Expect
    // ------
    // - Two rows: month-0 shallow box and the deep annual mean, two columns each.
    fn split_annual_skips_unobserved_boxes() {
        // Arrange
        let data = Array::from_shape_fn((1, 2, 1, 1, 2, 2), |(_, t, _, _, z, q)| {
            (10 * z + t) as f64 + q as f64 * 100.0
        })
        .into_dyn();
        let mut mask = Array::from_elem((1, 2, 1, 1, 2), true);
        mask[[0, 1, 0, 0, 0]] = false;

        // Act
        let rows = split_annual(data.view(), mask.view(), 1, 1.0);

        // Assert
        assert_eq!(rows.dim(), (2, 2));
        assert_eq!(rows.row(0).to_vec(), vec![0.0, 100.0]);
        assert_eq!(rows.row(1).to_vec(), vec![10.5, 110.5]);
    }
}
