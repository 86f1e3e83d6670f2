//! DataBase core: cached model outputs and measurement statistics.
//!
//! Purpose
//! -------
//! Every concrete data kind pairs model outputs (`F` at the measurement
//! sites, its Jacobian `DF`, and the full box fields) with the measurements
//! they are compared against. [`DataBaseCore`] owns the shared machinery:
//! the tiered cache of box outputs, the cache of site outputs (memory-only or
//! persistent depending on the data kind), and memoized measurement
//! statistics. The [`DataBase`] trait layers the public operations on top of
//! a handful of kind-specific hooks; [`PointDataBase`] adds the correlated
//! point-measurement operations.
//!
//! Key behaviors
//! -------------
//! - Box outputs are computed at `max(time_dim, default_boxes_t_dim)` and
//!   averaged down when a coarser series is requested.
//! - Cached Jacobians wider than the parameter vector are truncated; narrower
//!   ones are recomputed and the stored copy is overwritten.
//! - Measurement statistics are computed once per database instance.
//!
//! Invariants & assumptions
//! ------------------------
//! - `F` has length `m`; `DF` is `(m, p)`; box series carry the requested time
//!   dimension on axis 1. Violations are programming errors and panic.
//! - Databases are single-threaded (`Rc`/`RefCell` caches); they are not `Sync`.
//!
//! Downstream usage
//! ----------------
//! - Implement [`DataBase`] by returning a [`DataBaseCore`] from `core()` and
//!   providing `evaluate`, `derivative`, `observed_results`, and
//!   `observed_deviations`. Everything else is provided.
use crate::cache::{
    EntryKey, FilenameTemplate, MemoryCache, ParameterKey, ParameterMemoryCache, Payload,
    PersistOptions, Quantity, TemplateValue, TieredCache,
};
use crate::correlation::{
    check_regularity, project, BlockCorrelation, CorrelationParameters, Precision, Projection,
};
use crate::database::errors::{DataBaseError, DataBaseResult};
use crate::database::evaluator::{ModelEvaluator, PointSets};
use crate::database::keys::{MatrixKey, MeasurementKey};
use crate::database::measurements::{CorrelationSpec, DeviationBoxes, DEFAULT_MIN_DIAG_VALUE};
use crate::database::options::{DataBaseOptions, OutputCaching, CORRELATION_PARAMETER_FILENAME};
use crate::database::reconcile::{reconcile_columns, truncate_last_axis, ColumnReconciliation};
use crate::database::resample::change_time_dim;
use nalgebra::DMatrix;
use ndarray::{Array, Array1, Array2, ArrayD, ArrayView2, ArrayViewD, Dimension, Ix1, Ix2};
use slog::{debug, Logger};
use std::rc::Rc;

/// Shared state of one database instance.
pub struct DataBaseCore {
    name: String,
    evaluator: Rc<dyn ModelEvaluator>,
    boxes: TieredCache,
    outputs: OutputCaching,
    output_memory: ParameterMemoryCache<Quantity, Payload>,
    vectors: MemoryCache<MeasurementKey, Rc<Array1<f64>>>,
    fields: MemoryCache<MeasurementKey, Rc<ArrayD<f64>>>,
    scalars: MemoryCache<MeasurementKey, f64>,
    counts: MemoryCache<MeasurementKey, usize>,
    deviation_boxes: Option<Rc<dyn DeviationBoxes>>,
    default_boxes_t_dim: usize,
    f_boxes_template: FilenameTemplate,
    df_boxes_template: FilenameTemplate,
    save_also_txt: bool,
    logger: Logger,
}

impl std::fmt::Debug for DataBaseCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataBaseCore")
            .field("name", &self.name)
            .field("outputs", &self.outputs)
            .field("default_boxes_t_dim", &self.default_boxes_t_dim)
            .finish_non_exhaustive()
    }
}

impl DataBaseCore {
    pub fn new(
        name: impl Into<String>, evaluator: Rc<dyn ModelEvaluator>, outputs: OutputCaching,
        options: &DataBaseOptions,
    ) -> Self {
        let name = name.into();
        let logger = options.logger.new(slog::o!("data_base" => name.clone()));
        DataBaseCore {
            boxes: TieredCache::new(&options.cache, logger.clone()),
            name,
            evaluator,
            outputs,
            output_memory: ParameterMemoryCache::new(),
            vectors: MemoryCache::new(),
            fields: MemoryCache::new(),
            scalars: MemoryCache::new(),
            counts: MemoryCache::new(),
            deviation_boxes: None,
            default_boxes_t_dim: options.default_boxes_t_dim,
            f_boxes_template: options.f_boxes_template.clone(),
            df_boxes_template: options.df_boxes_template.clone(),
            save_also_txt: options.save_also_txt,
            logger,
        }
    }

    /// Attach the source of per-box deviations.
    pub fn with_deviation_boxes(mut self, source: Rc<dyn DeviationBoxes>) -> Self {
        self.deviation_boxes = Some(source);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn evaluator(&self) -> &Rc<dyn ModelEvaluator> {
        &self.evaluator
    }

    pub fn logger(&self) -> &Logger {
        &self.logger
    }

    pub fn boxes_cache(&self) -> &TieredCache {
        &self.boxes
    }

    pub fn default_boxes_t_dim(&self) -> usize {
        self.default_boxes_t_dim
    }

    // ---- Measurement memoization ----

    pub fn vector(
        &self, key: MeasurementKey, compute: impl FnOnce() -> DataBaseResult<Array1<f64>>,
    ) -> DataBaseResult<Rc<Array1<f64>>> {
        self.vectors.get_value(&key, || compute().map(Rc::new))
    }

    pub fn field(
        &self, key: MeasurementKey, compute: impl FnOnce() -> DataBaseResult<ArrayD<f64>>,
    ) -> DataBaseResult<Rc<ArrayD<f64>>> {
        self.fields.get_value(&key, || compute().map(Rc::new))
    }

    pub fn scalar(
        &self, key: MeasurementKey, compute: impl FnOnce() -> DataBaseResult<f64>,
    ) -> DataBaseResult<f64> {
        self.scalars.get_value(&key, compute)
    }

    pub fn count(
        &self, key: MeasurementKey, compute: impl FnOnce() -> DataBaseResult<usize>,
    ) -> DataBaseResult<usize> {
        self.counts.get_value(&key, compute)
    }

    // ---- Box outputs ----

    fn render(&self, template: &FilenameTemplate, time_dim: Option<usize>) -> DataBaseResult<String> {
        let mut fields = vec![("step_size", TemplateValue::from(self.evaluator.derivative_step_size()))];
        if let Some(time_dim) = time_dim {
            fields.push(("time_dim", TemplateValue::from(time_dim)));
        }
        Ok(template.render(&fields)?)
    }

    /// Model tracer fields `(tracer, time_dim, x, y, z)`.
    ///
    /// Errors
    /// ------
    /// - Cache and evaluator failures.
    ///
    /// Panics
    /// ------
    /// - If the evaluator returns a field without the requested time axis.
    pub fn f_boxes(
        &self, parameters: &ParameterKey, time_dim: usize, use_memmap: bool,
    ) -> DataBaseResult<Payload> {
        let calculation_time_dim = time_dim.max(self.default_boxes_t_dim);
        let filename = self.render(&self.f_boxes_template, Some(calculation_time_dim))?;
        let entry = EntryKey::f_boxes(calculation_time_dim);
        let payload = self.boxes.get_value(
            parameters,
            &filename,
            &entry,
            PersistOptions::memmap(use_memmap),
            |key| {
                debug!(self.logger, "calculating f_boxes"; "time_dim" => calculation_time_dim);
                Ok::<_, DataBaseError>(self.evaluator.f_boxes(key.values(), calculation_time_dim)?)
            },
        )?;
        let payload = self.average_time(payload, time_dim)?;
        assert_time_dim(&payload, time_dim, "f_boxes");
        Ok(payload)
    }

    /// Model Jacobian fields `(tracer, time_dim, x, y, z, p)`.
    ///
    /// Errors
    /// ------
    /// - Cache and evaluator failures.
    ///
    /// Panics
    /// ------
    /// - If the (re)computed Jacobian has fewer than `p` columns or lacks the
    ///   requested time axis.
    pub fn df_boxes(
        &self, parameters: &ParameterKey, time_dim: usize, use_memmap: bool,
    ) -> DataBaseResult<Payload> {
        let calculation_time_dim = time_dim.max(self.default_boxes_t_dim);
        let filename = self.render(&self.df_boxes_template, Some(calculation_time_dim))?;
        let entry = EntryKey::df_boxes(calculation_time_dim);
        let options = PersistOptions::memmap(use_memmap);
        let compute = |key: &ParameterKey| -> DataBaseResult<ArrayD<f64>> {
            debug!(self.logger, "calculating df_boxes"; "time_dim" => calculation_time_dim);
            Ok(self.evaluator.df_boxes(key.values(), calculation_time_dim)?)
        };

        let cached = self.boxes.get_value(parameters, &filename, &entry, options, &compute)?;
        let requested = parameters.len();
        let payload = match reconcile_columns(last_axis_len(&cached), requested) {
            ColumnReconciliation::Keep => cached,
            ColumnReconciliation::Truncate { cached: width, requested } => {
                debug!(self.logger, "truncating cached df_boxes"; "cached" => width, "requested" => requested);
                Payload::owned(truncate_last_axis(cached.view(), requested))
            }
            ColumnReconciliation::Recompute { cached: width, requested } => {
                debug!(self.logger, "cached df_boxes too narrow, recomputing";
                    "cached" => width, "requested" => requested);
                let fresh = compute(parameters)?;
                let stored = self.boxes.save_value(parameters, &filename, &entry, fresh, options)?;
                if last_axis_len(&stored) > requested {
                    Payload::owned(truncate_last_axis(stored.view(), requested))
                } else {
                    stored
                }
            }
        };
        assert_eq!(
            last_axis_len(&payload),
            requested,
            "{}: df_boxes must carry one partial derivative per parameter",
            self.name
        );
        let payload = self.average_time(payload, time_dim)?;
        assert_time_dim(&payload, time_dim, "df_boxes");
        Ok(payload)
    }

    fn average_time(&self, payload: Payload, time_dim: usize) -> DataBaseResult<Payload> {
        assert!(payload.ndim() >= 2, "{}: box outputs need a time axis", self.name);
        if payload.shape()[1] == time_dim {
            return Ok(payload);
        }
        debug!(self.logger, "averaging time axis"; "from" => payload.shape()[1], "to" => time_dim);
        Ok(Payload::owned(change_time_dim(payload.view(), 1, time_dim)?))
    }

    /// Per-box deviations at `time_dim`, averaged from the canonical resolution.
    ///
    /// Errors
    /// ------
    /// - [`DataBaseError::MissingCollaborator`] if no deviation source was attached.
    pub fn deviations_boxes(&self, time_dim: usize) -> DataBaseResult<Rc<ArrayD<f64>>> {
        self.field(MeasurementKey::DeviationsBoxes { time_dim }, || {
            let source = self
                .deviation_boxes
                .as_ref()
                .ok_or(DataBaseError::MissingCollaborator { name: "deviation boxes" })?;
            let calculation_time_dim = time_dim.max(self.default_boxes_t_dim);
            let data = source.deviation_boxes(calculation_time_dim)?;
            let data = if data.ndim() >= 2 && data.shape()[1] != time_dim {
                change_time_dim(data.view(), 1, time_dim)?
            } else {
                data
            };
            assert!(
                data.ndim() >= 2 && data.shape()[1] == time_dim,
                "{}: deviation boxes must have time dimension {time_dim}",
                self.name
            );
            Ok(data)
        })
    }

    pub fn inverse_deviations_boxes(&self, time_dim: usize) -> DataBaseResult<Rc<ArrayD<f64>>> {
        self.field(MeasurementKey::InverseDeviationsBoxes { time_dim }, || {
            Ok(self.deviations_boxes(time_dim)?.mapv(|d| 1.0 / d))
        })
    }

    // ---- Site outputs ----

    fn output_payload(
        &self, parameters: &ParameterKey, quantity: Quantity,
        compute: impl FnOnce(&ParameterKey) -> DataBaseResult<ArrayD<f64>>,
    ) -> DataBaseResult<Payload> {
        match &self.outputs {
            OutputCaching::Memory => self
                .output_memory
                .get_value(parameters, &quantity, |key| compute(key).map(Payload::owned)),
            OutputCaching::Persistent(templates) => {
                let (template, entry) = match quantity {
                    Quantity::DF => (&templates.df, EntryKey::df()),
                    _ => (&templates.f, EntryKey::f()),
                };
                let filename = self.render(template, None)?;
                let options = PersistOptions { use_memmap: false, save_also_txt: self.save_also_txt };
                self.boxes.get_value(parameters, &filename, &entry, options, compute)
            }
        }
    }

    fn store_output(
        &self, parameters: &ParameterKey, quantity: Quantity, array: ArrayD<f64>,
    ) -> DataBaseResult<Payload> {
        match &self.outputs {
            OutputCaching::Memory => {
                let payload = Payload::owned(array);
                self.output_memory.save_value(parameters, quantity, payload.clone());
                Ok(payload)
            }
            OutputCaching::Persistent(templates) => {
                let (template, entry) = match quantity {
                    Quantity::DF => (&templates.df, EntryKey::df()),
                    _ => (&templates.f, EntryKey::f()),
                };
                let filename = self.render(template, None)?;
                let options = PersistOptions { use_memmap: false, save_also_txt: self.save_also_txt };
                Ok(self.boxes.save_value(parameters, &filename, &entry, array, options)?)
            }
        }
    }

    /// Site values, cached per this database's output caching.
    pub fn model_f(
        &self, parameters: &ParameterKey,
        compute: impl FnOnce(&ParameterKey) -> DataBaseResult<Array1<f64>>,
    ) -> DataBaseResult<Array1<f64>> {
        let payload = self.output_payload(parameters, Quantity::F, |key| {
            debug!(self.logger, "calculating F");
            compute(key).map(|values| values.into_dyn())
        })?;
        Ok(owned_with_rank::<Ix1>(payload.view(), "F"))
    }

    /// Site Jacobian with columns reconciled to `parameters.len()`.
    ///
    /// Panics
    /// ------
    /// - If a recomputed Jacobian still has fewer than `p` columns.
    pub fn model_df(
        &self, parameters: &ParameterKey,
        compute: impl Fn(&ParameterKey) -> DataBaseResult<Array2<f64>>,
    ) -> DataBaseResult<Array2<f64>> {
        let cached = self.output_payload(parameters, Quantity::DF, |key| {
            debug!(self.logger, "calculating DF");
            compute(key).map(|values| values.into_dyn())
        })?;
        let requested = parameters.len();
        let df = match reconcile_columns(last_axis_len(&cached), requested) {
            ColumnReconciliation::Keep => cached.to_owned_array(),
            ColumnReconciliation::Truncate { cached: width, requested } => {
                debug!(self.logger, "truncating cached DF"; "cached" => width, "requested" => requested);
                truncate_last_axis(cached.view(), requested)
            }
            ColumnReconciliation::Recompute { cached: width, requested } => {
                debug!(self.logger, "cached DF too narrow, recomputing";
                    "cached" => width, "requested" => requested);
                let fresh = compute(parameters)?.into_dyn();
                let stored = self.store_output(parameters, Quantity::DF, fresh)?;
                if last_axis_len(&stored) > requested {
                    truncate_last_axis(stored.view(), requested)
                } else {
                    stored.to_owned_array()
                }
            }
        };
        Ok(owned_with_rank::<Ix2>(df.view(), "DF"))
    }

    /// Numeric text file stored in the parameter set of `parameters`.
    ///
    /// Errors
    /// ------
    /// - [`CacheError::MissingFile`](crate::cache::CacheError::MissingFile) if absent.
    pub fn get_file(&self, parameters: &ParameterKey, filename: &str) -> DataBaseResult<Array1<f64>> {
        Ok(self.boxes.persistent().load_text_vector(parameters, filename)?)
    }
}

fn last_axis_len(payload: &Payload) -> usize {
    payload.shape().last().copied().unwrap_or(0)
}

fn assert_time_dim(payload: &Payload, time_dim: usize, what: &str) {
    assert_eq!(payload.shape()[1], time_dim, "{what} must have time dimension {time_dim}");
}

fn owned_with_rank<D: Dimension>(view: ArrayViewD<f64>, what: &str) -> Array<f64, D> {
    let shape = view.shape().to_vec();
    match view.into_dimensionality::<D>() {
        Ok(view) => view.to_owned(),
        Err(_) => panic!("{what} has unexpected shape {shape:?}"),
    }
}

/// Lower Cholesky factor of a symmetric positive-definite matrix.
///
/// Errors
/// ------
/// - [`DataBaseError::NotPositiveDefinite`] if the factorization fails.
pub fn lower_cholesky(matrix: &DMatrix<f64>) -> DataBaseResult<DMatrix<f64>> {
    let dim = matrix.nrows();
    let cholesky = matrix.clone().cholesky().ok_or(DataBaseError::NotPositiveDefinite { dim })?;
    Ok(cholesky.l())
}

/// Public operations of every data kind.
///
/// Required:
/// - `core()`: shared caches and collaborators.
/// - `evaluate(p)`: model values at the measurement sites (uncached).
/// - `derivative(p)`: their Jacobian (uncached, may have extra columns).
/// - `observed_results()`, `observed_deviations()`: raw measurement vectors.
///
/// Provided: cached `f`/`df`, box outputs, and measurement statistics.
pub trait DataBase {
    // Required methods
    fn core(&self) -> &DataBaseCore;
    fn evaluate(&self, parameters: &ParameterKey) -> DataBaseResult<Array1<f64>>;
    fn derivative(&self, parameters: &ParameterKey) -> DataBaseResult<Array2<f64>>;
    fn observed_results(&self) -> DataBaseResult<Array1<f64>>;
    fn observed_deviations(&self) -> DataBaseResult<Array1<f64>>;

    fn name(&self) -> &str {
        self.core().name()
    }

    /// Model values at the measurement sites, length `m`.
    ///
    /// Panics
    /// ------
    /// - If the computed vector does not have length `m`.
    fn f(&self, parameters: &[f64]) -> DataBaseResult<Array1<f64>> {
        let key = ParameterKey::new(parameters);
        let values = self.core().model_f(&key, |k| self.evaluate(k))?;
        let m = self.m()?;
        assert_eq!(values.len(), m, "{}: F must have one value per measurement", self.name());
        Ok(values)
    }

    /// Jacobian at the measurement sites, `(m, p)`.
    ///
    /// Panics
    /// ------
    /// - If the result is not `(m, p)` after column reconciliation.
    fn df(&self, parameters: &[f64]) -> DataBaseResult<Array2<f64>> {
        let key = ParameterKey::new(parameters);
        let values = self.core().model_df(&key, |k| self.derivative(k))?;
        let m = self.m()?;
        assert_eq!(
            values.dim(),
            (m, parameters.len()),
            "{}: DF must be (measurements, parameters)",
            self.name()
        );
        Ok(values)
    }

    fn f_boxes(&self, parameters: &[f64], time_dim: usize, use_memmap: bool) -> DataBaseResult<Payload> {
        self.core().f_boxes(&ParameterKey::new(parameters), time_dim, use_memmap)
    }

    fn df_boxes(&self, parameters: &[f64], time_dim: usize, use_memmap: bool) -> DataBaseResult<Payload> {
        self.core().df_boxes(&ParameterKey::new(parameters), time_dim, use_memmap)
    }

    /// Number of measurements.
    fn m(&self) -> DataBaseResult<usize> {
        self.core().count(MeasurementKey::M, || Ok(self.results()?.len()))
    }

    fn results(&self) -> DataBaseResult<Rc<Array1<f64>>> {
        self.core().vector(MeasurementKey::Results, || self.observed_results())
    }

    fn deviations(&self) -> DataBaseResult<Rc<Array1<f64>>> {
        self.core().vector(MeasurementKey::Deviations, || self.observed_deviations())
    }

    fn inverse_deviations(&self) -> DataBaseResult<Rc<Array1<f64>>> {
        self.core().vector(MeasurementKey::InverseDeviations, || {
            Ok(self.deviations()?.mapv(|d| 1.0 / d))
        })
    }

    fn variances(&self) -> DataBaseResult<Rc<Array1<f64>>> {
        self.core().vector(MeasurementKey::Variances, || Ok(self.deviations()?.mapv(|d| d * d)))
    }

    fn inverse_variances(&self) -> DataBaseResult<Rc<Array1<f64>>> {
        self.core().vector(MeasurementKey::InverseVariances, || {
            Ok(self.variances()?.mapv(|v| 1.0 / v))
        })
    }

    /// Mean of the variances; NaN when there are no measurements.
    fn average_variance(&self) -> DataBaseResult<f64> {
        self.core().scalar(MeasurementKey::AverageVariance, || {
            Ok(self.variances()?.mean().unwrap_or(f64::NAN))
        })
    }

    fn inverse_average_variance(&self) -> DataBaseResult<f64> {
        self.core().scalar(MeasurementKey::InverseAverageVariance, || {
            Ok(1.0 / self.average_variance()?)
        })
    }

    fn deviations_boxes(&self, time_dim: usize) -> DataBaseResult<Rc<ArrayD<f64>>> {
        self.core().deviations_boxes(time_dim)
    }

    fn inverse_deviations_boxes(&self, time_dim: usize) -> DataBaseResult<Rc<ArrayD<f64>>> {
        self.core().inverse_deviations_boxes(time_dim)
    }
}

/// Memoized point coordinates and correlation matrices.
#[derive(Debug, Default)]
pub struct PointCaches {
    points: MemoryCache<(), Rc<PointSets>>,
    matrices: MemoryCache<MatrixKey, Rc<DMatrix<f64>>>,
}

impl PointCaches {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Correlated point measurements of the two tracers (DOP first, then PO4).
///
/// Required:
/// - `point_caches()`: storage for memoized coordinates and matrices.
/// - `points_calculate()`: observation coordinates.
/// - `correlation_matrix_calculate(spec)`: estimated correlation matrix.
///
/// Optional:
/// - `correlation_matrix_cholesky_decomposition_calculate(spec)`: defaults to
///   the Cholesky factor of `correlation_matrix(spec)`.
pub trait PointDataBase: DataBase {
    // Required methods
    fn point_caches(&self) -> &PointCaches;
    fn points_calculate(&self) -> DataBaseResult<PointSets>;
    fn correlation_matrix_calculate(&self, spec: &CorrelationSpec) -> DataBaseResult<DMatrix<f64>>;

    // Optional methods
    /// Diagonal floor applied when a cost function names only the sample
    /// count and year limit of its correlation matrix.
    fn default_min_diag_value(&self) -> f64 {
        DEFAULT_MIN_DIAG_VALUE
    }

    fn correlation_matrix_cholesky_decomposition_calculate(
        &self, spec: &CorrelationSpec,
    ) -> DataBaseResult<DMatrix<f64>> {
        lower_cholesky(&*self.correlation_matrix(spec)?)
    }

    fn points(&self) -> DataBaseResult<Rc<PointSets>> {
        self.point_caches().points.get_value(&(), || self.points_calculate().map(Rc::new))
    }

    /// Number of DOP measurements (the first group).
    fn m_dop(&self) -> DataBaseResult<usize> {
        Ok(self.points()?.dop.nrows())
    }

    /// Number of PO4 measurements (the second group).
    fn m_po4(&self) -> DataBaseResult<usize> {
        Ok(self.points()?.po4.nrows())
    }

    fn correlation_matrix(&self, spec: &CorrelationSpec) -> DataBaseResult<Rc<DMatrix<f64>>> {
        self.point_caches().matrices.get_value(&MatrixKey::Correlation(*spec), || {
            self.correlation_matrix_calculate(spec).map(Rc::new)
        })
    }

    /// Lower Cholesky factor `L` with `L Lᵀ = C`.
    ///
    /// Errors
    /// ------
    /// - [`DataBaseError::NotPositiveDefinite`] from the default implementation.
    fn correlation_matrix_cholesky_decomposition(
        &self, spec: &CorrelationSpec,
    ) -> DataBaseResult<Rc<DMatrix<f64>>> {
        self.point_caches().matrices.get_value(&MatrixKey::Cholesky(*spec), || {
            self.correlation_matrix_cholesky_decomposition_calculate(spec).map(Rc::new)
        })
    }

    /// `(a, b, c)` stored alongside the outputs of `parameters`.
    fn correlation_parameters(&self, parameters: &[f64]) -> DataBaseResult<CorrelationParameters> {
        let values =
            self.core().get_file(&ParameterKey::new(parameters), CORRELATION_PARAMETER_FILENAME)?;
        Ok(CorrelationParameters::from_slice(&values.to_vec())?)
    }

    fn block_correlation(&self, params: &CorrelationParameters) -> DataBaseResult<BlockCorrelation> {
        Ok(BlockCorrelation::new(*params, self.m_dop()?, self.m_po4()?)?)
    }

    /// Errors
    /// ------
    /// - [`CorrelationError::SingularMatrix`](crate::correlation::CorrelationError::SingularMatrix)
    ///   if the block matrix is singular for these group sizes.
    fn check_regularity(&self, params: &CorrelationParameters) -> DataBaseResult<()> {
        Ok(check_regularity(params, self.m_dop()?, self.m_po4()?)?)
    }

    fn ln_det_correlation_matrix(&self, params: &CorrelationParameters) -> DataBaseResult<f64> {
        Ok(self.block_correlation(params)?.ln_det())
    }

    /// Project rows of `values` (DOP rows before `split_index`) onto the
    /// group sufficient statistics.
    fn project(
        &self, values: ArrayView2<f64>, split_index: usize, precision: Precision,
    ) -> DataBaseResult<Projection> {
        Ok(project(values, split_index, precision)?)
    }

    /// `Xᵀ C⁻¹ X` from a projection of `X`.
    fn projected_product_inverse_correlation_matrix_both_sides(
        &self, projection: &Projection, params: &CorrelationParameters,
    ) -> DataBaseResult<Array2<f64>> {
        Ok(self.block_correlation(params)?.projected_product(projection)?)
    }

    /// Residuals `results - F`, optionally divided by the deviations.
    fn diff(&self, parameters: &[f64], normalize_with_deviation: bool) -> DataBaseResult<Array1<f64>> {
        let results = self.results()?;
        let mut diff = &*results - &self.f(parameters)?;
        if normalize_with_deviation {
            diff /= &*self.deviations()?;
        }
        Ok(diff)
    }
}
