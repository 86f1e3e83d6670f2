//! accuracy::asymptotic — asymptotic accuracy of a fitted parameter vector.
//!
//! Purpose
//! -------
//! Bind one [`AnyDataBase`] to one [`CostFunctionKind`] and answer the
//! accuracy questions asked after a fit: information and covariance
//! matrices, parameter confidences and model confidences on the box grid.
//!
//! Key behaviors
//! -------------
//! - The database caches do the heavy lifting; repeated calls at the same
//!   parameter vector reuse `F`, `DF` and the box outputs.
//! - Degrees of freedom are `m - p` with `m` the database's measurement
//!   count.
//! - `include_variance_factor` scales covariances by `cost / (m - p)`.
//! - Model confidences evaluate `DF` on the box grid at `time_dim_model`
//!   and fan the per-box work out according to the [`ExecutionMode`].
//! - Confidence increases rank candidate boxes by how much added
//!   observations there would shrink the average model confidence.
//!
//! Conventions
//! -----------
//! - Hessians are passed in by the caller on the information scale; no
//!   Hessian is computed here.
use crate::accuracy::confidence;
use crate::accuracy::errors::{AccuracyError, AccuracyResult};
use crate::accuracy::filenames::ConfidenceSettings;
use crate::accuracy::information::{self, inverse_hessian};
use crate::accuracy::kind::{CostFunctionKind, MatrixType};
use crate::accuracy::parallel::ExecutionMode;
use crate::correlation::Precision;
use crate::database::{AnyDataBase, DataBase};
use ndarray::{Array1, Array2, ArrayD, ArrayViewD};
use slog::{debug, Logger};

pub struct Asymptotic<'a> {
    data_base: &'a AnyDataBase,
    cost_function: CostFunctionKind,
    precision: Precision,
    mode: ExecutionMode,
    logger: Logger,
}

impl std::fmt::Debug for Asymptotic<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Asymptotic")
            .field("data_base", &self.db().name())
            .field("cost_function", &self.cost_function)
            .field("precision", &self.precision)
            .field("mode", &self.mode)
            .finish()
    }
}

impl<'a> Asymptotic<'a> {
    pub fn new(data_base: &'a AnyDataBase, cost_function: CostFunctionKind) -> Self {
        let logger = data_base
            .as_data_base()
            .core()
            .logger()
            .new(slog::o!("cost_function" => cost_function.to_string()));
        Asymptotic {
            data_base,
            cost_function,
            precision: Precision::default(),
            mode: ExecutionMode::default(),
            logger,
        }
    }

    pub fn with_precision(mut self, precision: Precision) -> Self {
        self.precision = precision;
        self
    }

    pub fn with_execution_mode(mut self, mode: ExecutionMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn cost_function(&self) -> &CostFunctionKind {
        &self.cost_function
    }

    fn db(&self) -> &dyn DataBase {
        self.data_base.as_data_base()
    }

    pub fn information_matrix(&self, parameters: &[f64]) -> AccuracyResult<Array2<f64>> {
        debug!(self.logger, "calculating information matrix"; "parameters" => parameters.len());
        information::information_matrix(
            &self.cost_function,
            self.data_base,
            parameters,
            self.precision,
        )
    }

    pub fn cost_function_value(&self, parameters: &[f64]) -> AccuracyResult<f64> {
        information::cost_function_value(
            &self.cost_function,
            self.data_base,
            parameters,
            self.precision,
        )
    }

    pub fn degrees_of_freedom(&self, parameters: &[f64]) -> AccuracyResult<usize> {
        let (measurements, parameters) = (self.db().m()?, parameters.len());
        if measurements <= parameters {
            return Err(AccuracyError::NotEnoughMeasurements { measurements, parameters });
        }
        Ok(measurements - parameters)
    }

    pub fn variance_factor(&self, parameters: &[f64]) -> AccuracyResult<f64> {
        let cost = self.cost_function_value(parameters)?;
        information::variance_factor(cost, self.db().m()?, parameters.len())
    }

    /// Errors
    /// ------
    /// - [`AccuracyError::MissingHessian`] for `H` and `F_H` without a Hessian.
    /// - Information matrix failures for `F` and `F_H`.
    pub fn covariance_matrix(
        &self, parameters: &[f64], matrix_type: MatrixType, include_variance_factor: bool,
        hessian: Option<&Array2<f64>>,
    ) -> AccuracyResult<Array2<f64>> {
        let mut covariance = match matrix_type {
            MatrixType::H => inverse_hessian(hessian, parameters.len())?,
            _ => {
                let information = self.information_matrix(parameters)?;
                information::covariance_matrix(matrix_type, &information, hessian)?
            }
        };
        if include_variance_factor {
            let factor = self.variance_factor(parameters)?;
            debug!(self.logger, "scaling covariance"; "variance_factor" => factor);
            covariance *= factor;
        }
        Ok(covariance)
    }

    pub fn correlation_matrix(
        &self, parameters: &[f64], matrix_type: MatrixType, hessian: Option<&Array2<f64>>,
    ) -> AccuracyResult<Array2<f64>> {
        let covariance = self.covariance_matrix(parameters, matrix_type, false, hessian)?;
        Ok(information::correlation_matrix(&covariance))
    }

    pub fn parameter_confidence(
        &self, parameters: &[f64], settings: &ConfidenceSettings, hessian: Option<&Array2<f64>>,
        relative: bool,
    ) -> AccuracyResult<Array1<f64>> {
        let covariance = self.covariance_matrix(
            parameters,
            settings.matrix_type,
            settings.include_variance_factor,
            hessian,
        )?;
        confidence::parameter_confidence(
            &covariance,
            parameters,
            settings.alpha,
            self.degrees_of_freedom(parameters)?,
            relative,
        )
    }

    /// Confidence half-widths on the box grid, shaped like `f_boxes` at
    /// `time_dim_model`.
    pub fn model_confidence(
        &self, parameters: &[f64], settings: &ConfidenceSettings, hessian: Option<&Array2<f64>>,
        time_dim_model: usize, use_memmap: bool,
    ) -> AccuracyResult<ArrayD<f64>> {
        let covariance = self.covariance_matrix(
            parameters,
            settings.matrix_type,
            settings.include_variance_factor,
            hessian,
        )?;
        let df_boxes = self.db().df_boxes(parameters, time_dim_model, use_memmap)?;
        debug!(self.logger, "calculating model confidence";
            "time_dim_model" => time_dim_model, "mode" => format!("{:?}", self.mode));
        confidence::model_confidence(
            &covariance,
            df_boxes.view(),
            settings.alpha,
            self.degrees_of_freedom(parameters)?,
            self.mode,
        )
    }

    pub fn average_model_confidence(
        &self, parameters: &[f64], settings: &ConfidenceSettings, hessian: Option<&Array2<f64>>,
        time_dim_model: usize, per_tracer: bool, relative: bool,
    ) -> AccuracyResult<Array1<f64>> {
        let model_confidence =
            self.model_confidence(parameters, settings, hessian, time_dim_model, false)?;
        let average = if relative {
            let f_boxes = self.db().f_boxes(parameters, time_dim_model, false)?;
            confidence::average_model_confidence(
                model_confidence.view(),
                Some(f_boxes.view()),
                per_tracer,
            )
        } else {
            confidence::average_model_confidence(model_confidence.view(), None, per_tracer)
        };
        Ok(average)
    }

    /// Drop of the overall average model confidence at `time_dim_model` when
    /// `number_of_measurements` observations are added at one box of the
    /// `time_dim_confidence_increase` grid, shaped `(tracer, t, x, y, z)`.
    ///
    /// Added observations carry the box deviation (the average variance for
    /// `OLS`) and raise both the information matrix and the Hessian by
    /// `n·gᵀg/σ²`. Boxes outside `value_mask` or without a positive finite
    /// deviation are NaN. Candidates fan out per the [`ExecutionMode`].
    ///
    /// Errors
    /// ------
    /// - [`AccuracyError::DimensionMismatch`] if `value_mask` does not match
    ///   the candidate grid.
    /// - Database failures, including a missing deviation source.
    /// - Same as [`Asymptotic::covariance_matrix`].
    pub fn average_model_confidence_increase(
        &self, parameters: &[f64], settings: &ConfidenceSettings, hessian: Option<&Array2<f64>>,
        number_of_measurements: usize, time_dim_confidence_increase: usize, time_dim_model: usize,
        value_mask: Option<ArrayViewD<bool>>, relative: bool, use_memmap: bool,
    ) -> AccuracyResult<ArrayD<f64>> {
        let p = parameters.len();
        let information = match settings.matrix_type {
            MatrixType::H => Array2::zeros((p, p)),
            _ => self.information_matrix(parameters)?,
        };
        let factor = if settings.include_variance_factor {
            self.variance_factor(parameters)?
        } else {
            1.0
        };
        let matrix_type = settings.matrix_type;
        let covariance_with = |update: Option<&Array2<f64>>| -> AccuracyResult<Array2<f64>> {
            let covariance = match update {
                None => information::covariance_matrix(matrix_type, &information, hessian)?,
                Some(update) => {
                    let hessian = hessian.map(|h| h + update);
                    information::covariance_matrix(matrix_type, &(&information + update), hessian.as_ref())?
                }
            };
            Ok(covariance * factor)
        };

        let weights = self.candidate_weights(time_dim_confidence_increase, value_mask)?;
        let candidates = self.db().df_boxes(parameters, time_dim_confidence_increase, use_memmap)?;
        let df_model = self.db().df_boxes(parameters, time_dim_model, use_memmap)?;
        let f_model =
            if relative { Some(self.db().f_boxes(parameters, time_dim_model, false)?) } else { None };
        debug!(self.logger, "calculating average model confidence increase";
            "number_of_measurements" => number_of_measurements,
            "time_dim_confidence_increase" => time_dim_confidence_increase,
            "time_dim_model" => time_dim_model, "mode" => format!("{:?}", self.mode));
        confidence::average_model_confidence_increase(
            candidates.view(),
            weights.view(),
            df_model.view(),
            f_model.as_ref().map(|f| f.view()),
            settings.alpha,
            self.degrees_of_freedom(parameters)?,
            number_of_measurements,
            self.mode,
            covariance_with,
        )
    }

    // Inverse variance of one added observation per box, NaN where masked.
    fn candidate_weights(
        &self, time_dim: usize, value_mask: Option<ArrayViewD<bool>>,
    ) -> AccuracyResult<ArrayD<f64>> {
        let deviations = self.db().deviations_boxes(time_dim)?;
        let usable = |d: f64| d.is_finite() && d > 0.0;
        let mut weights = match self.cost_function {
            CostFunctionKind::Ols => {
                let weight = self.db().inverse_average_variance()?;
                deviations.mapv(|d| if usable(d) { weight } else { f64::NAN })
            }
            _ => deviations.mapv(|d| if usable(d) { 1.0 / (d * d) } else { f64::NAN }),
        };
        if let Some(mask) = value_mask {
            if mask.shape() != weights.shape() {
                return Err(AccuracyError::DimensionMismatch {
                    expected: weights.len(),
                    actual: mask.len(),
                });
            }
            weights.zip_mut_with(&mask, |w, &keep| {
                if !keep {
                    *w = f64::NAN;
                }
            });
        }
        Ok(weights)
    }
}
