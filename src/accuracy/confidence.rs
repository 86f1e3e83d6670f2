//! Confidence intervals for parameters and model outputs.
//!
//! Half-widths are `t_{(1+α)/2, m-p} · sqrt(gᵀ Σ g)` with `Σ` the parameter
//! covariance and `g` a unit vector (parameters) or a Jacobian row (model
//! outputs). Averages skip non-finite entries, so land boxes carrying NaN
//! drop out.
use crate::accuracy::errors::{AccuracyError, AccuracyResult};
use crate::accuracy::parallel::{map_indexed, try_map_indexed, ExecutionMode};
use ndarray::{Array1, Array2, ArrayD, ArrayViewD, Axis, IxDyn};
use statrs::distribution::{ContinuousCDF, StudentsT};

/// Two-sided Student-t quantile for confidence level `alpha`.
///
/// Errors
/// ------
/// - [`AccuracyError::InvalidAlpha`] unless `0 < alpha < 1`.
/// - [`AccuracyError::NotEnoughMeasurements`] for zero degrees of freedom.
pub fn t_quantile(alpha: f64, degrees_of_freedom: usize) -> AccuracyResult<f64> {
    if !(alpha > 0.0 && alpha < 1.0) {
        return Err(AccuracyError::InvalidAlpha { alpha });
    }
    if degrees_of_freedom == 0 {
        return Err(AccuracyError::NotEnoughMeasurements { measurements: 0, parameters: 0 });
    }
    let distribution = StudentsT::new(0.0, 1.0, degrees_of_freedom as f64)?;
    Ok(distribution.inverse_cdf((1.0 + alpha) / 2.0))
}

/// Half-widths of the parameter confidence intervals, optionally relative
/// to `|parameters|`.
///
/// Errors
/// ------
/// - [`AccuracyError::DimensionMismatch`] if `covariance` is not `(p, p)`.
/// - Same as [`t_quantile`].
pub fn parameter_confidence(
    covariance: &Array2<f64>, parameters: &[f64], alpha: f64, degrees_of_freedom: usize,
    relative: bool,
) -> AccuracyResult<Array1<f64>> {
    let p = parameters.len();
    if covariance.dim() != (p, p) {
        return Err(AccuracyError::DimensionMismatch { expected: p, actual: covariance.nrows() });
    }
    let t = t_quantile(alpha, degrees_of_freedom)?;
    let mut confidence = covariance.diag().mapv(|v| t * v.max(0.0).sqrt());
    if relative {
        confidence.iter_mut().zip(parameters).for_each(|(c, x)| *c /= x.abs());
    }
    Ok(confidence)
}

/// Half-widths of the model output confidence intervals for every box.
///
/// `df_boxes` carries the parameters on its last axis; the result has the
/// remaining axes.
///
/// Errors
/// ------
/// - [`AccuracyError::DimensionMismatch`] if the last axis of `df_boxes` is
///   not the covariance dimension.
/// - Same as [`t_quantile`].
pub fn model_confidence(
    covariance: &Array2<f64>, df_boxes: ArrayViewD<f64>, alpha: f64, degrees_of_freedom: usize,
    mode: ExecutionMode,
) -> AccuracyResult<ArrayD<f64>> {
    let p = covariance.nrows();
    let Some((&last, leading)) = df_boxes.shape().split_last() else {
        return Err(AccuracyError::DimensionMismatch { expected: p, actual: 0 });
    };
    if last != p {
        return Err(AccuracyError::DimensionMismatch { expected: p, actual: last });
    }
    let t = t_quantile(alpha, degrees_of_freedom)?;
    let rows: usize = leading.iter().product();
    let gradients = df_boxes
        .to_shape((rows, p))
        .map_err(|_| AccuracyError::DimensionMismatch { expected: p, actual: last })?;

    let values = map_indexed(mode, rows, |i| {
        let g = gradients.row(i);
        t * g.dot(&covariance.dot(&g)).max(0.0).sqrt()
    });
    ArrayD::from_shape_vec(IxDyn(leading), values)
        .map_err(|_| AccuracyError::DimensionMismatch { expected: rows, actual: rows })
}

fn finite_mean<'a>(values: impl Iterator<Item = &'a f64>) -> f64 {
    let (sum, count) =
        values.filter(|v| v.is_finite()).fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if count == 0 { f64::NAN } else { sum / count as f64 }
}

// NaN in either array removes the box from both means.
fn ratio_of_means(confidence: ArrayViewD<f64>, f_boxes: Option<ArrayViewD<f64>>) -> f64 {
    match f_boxes {
        None => finite_mean(confidence.iter()),
        Some(f) => {
            let pairs: Vec<(f64, f64)> = confidence
                .iter()
                .zip(f.iter())
                .filter(|(c, v)| c.is_finite() && v.is_finite())
                .map(|(c, v)| (*c, v.abs()))
                .collect();
            finite_mean(pairs.iter().map(|(c, _)| c)) / finite_mean(pairs.iter().map(|(_, v)| v))
        }
    }
}

/// Mean model confidence, one value per tracer (axis 0) or a single value.
///
/// With `f_boxes` the mean is divided by the mean `|f|` over the same
/// boxes.
///
/// Panics
/// ------
/// - If `f_boxes` and `confidence` differ in shape.
pub fn average_model_confidence(
    confidence: ArrayViewD<f64>, f_boxes: Option<ArrayViewD<f64>>, per_tracer: bool,
) -> Array1<f64> {
    if let Some(f) = &f_boxes {
        assert_eq!(f.shape(), confidence.shape(), "f_boxes must match the confidence shape");
    }
    if per_tracer && confidence.ndim() > 0 {
        confidence
            .axis_iter(Axis(0))
            .enumerate()
            .map(|(i, conf)| ratio_of_means(conf, f_boxes.as_ref().map(|f| f.index_axis(Axis(0), i))))
            .collect()
    } else {
        Array1::from_elem(1, ratio_of_means(confidence, f_boxes))
    }
}

/// Drop of the overall average model confidence when `number_of_measurements`
/// observations are added at one candidate box, for every candidate.
///
/// `candidates` holds the Jacobian rows of the candidate boxes with the
/// parameters on the last axis; `weights` holds the inverse variance of an
/// added observation per candidate box. A candidate adds `n·w·g gᵀ` to the
/// information, and `covariance_with(update)` turns that update into a
/// parameter covariance (`None` gives the current one). Updated confidences
/// use `degrees_of_freedom + number_of_measurements`.
///
/// Candidates with a non-finite or non-positive weight, or a non-finite
/// Jacobian row, are NaN.
///
/// Errors
/// ------
/// - [`AccuracyError::DimensionMismatch`] if `weights` does not match the
///   leading axes of `candidates`.
/// - Same as [`model_confidence`] and `covariance_with`.
pub fn average_model_confidence_increase<C>(
    candidates: ArrayViewD<f64>, weights: ArrayViewD<f64>, df_model: ArrayViewD<f64>,
    f_model: Option<ArrayViewD<f64>>, alpha: f64, degrees_of_freedom: usize,
    number_of_measurements: usize, mode: ExecutionMode, covariance_with: C,
) -> AccuracyResult<ArrayD<f64>>
where
    C: Fn(Option<&Array2<f64>>) -> AccuracyResult<Array2<f64>> + Sync,
{
    let Some((&p, leading)) = candidates.shape().split_last() else {
        return Err(AccuracyError::DimensionMismatch { expected: 1, actual: 0 });
    };
    if weights.shape() != leading {
        return Err(AccuracyError::DimensionMismatch {
            expected: leading.iter().product(),
            actual: weights.len(),
        });
    }
    let average = |covariance: &Array2<f64>, dof: usize| -> AccuracyResult<f64> {
        let confidence = model_confidence(covariance, df_model.view(), alpha, dof, ExecutionMode::Serial)?;
        let f = f_model.as_ref().map(|f| f.view());
        Ok(average_model_confidence(confidence.view(), f, false)[0])
    };
    let current = average(&covariance_with(None)?, degrees_of_freedom)?;

    let rows: usize = leading.iter().product();
    let gradients = candidates
        .to_shape((rows, p))
        .map_err(|_| AccuracyError::DimensionMismatch { expected: p, actual: p })?;
    let weights: Vec<f64> = weights.iter().copied().collect();
    let n = number_of_measurements as f64;

    let values = try_map_indexed(mode, rows, |i| -> AccuracyResult<f64> {
        let (w, g) = (weights[i], gradients.row(i));
        if !(w.is_finite() && w > 0.0) || g.iter().any(|v| !v.is_finite()) {
            return Ok(f64::NAN);
        }
        let column = g.to_owned().insert_axis(Axis(1));
        let update = column.dot(&column.t()) * (n * w);
        let covariance = covariance_with(Some(&update))?;
        Ok(current - average(&covariance, degrees_of_freedom + number_of_measurements)?)
    })?;
    ArrayD::from_shape_vec(IxDyn(leading), values)
        .map_err(|_| AccuracyError::DimensionMismatch { expected: rows, actual: rows })
}
