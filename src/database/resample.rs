//! Time-axis averaging of box series.
//!
//! Box outputs are stored at a canonical resolution and coarsened on request.
//! Output bin `j` of `new_len` covers the input interval
//! `[j·old/new, (j+1)·old/new)`; input bins contribute with the length of
//! their overlap with that interval, so ratios that do not divide evenly are
//! handled exactly.
use crate::database::errors::{DataBaseError, DataBaseResult};
use ndarray::{ArrayD, ArrayViewD, Axis};

/// Average `data` along `axis` down to `new_len` bins.
///
/// Errors
/// ------
/// - [`DataBaseError::InvalidTimeDim`] if `new_len` is zero or larger than
///   the current axis length.
///
/// Panics
/// ------
/// - If `axis >= data.ndim()`.
pub fn change_time_dim(data: ArrayViewD<f64>, axis: usize, new_len: usize) -> DataBaseResult<ArrayD<f64>> {
    let old_len = data.len_of(Axis(axis));
    if new_len == 0 || new_len > old_len {
        return Err(DataBaseError::InvalidTimeDim { requested: new_len, available: old_len });
    }
    if new_len == old_len {
        return Ok(data.to_owned());
    }

    let mut shape = data.shape().to_vec();
    shape[axis] = new_len;
    let mut out = ArrayD::<f64>::zeros(shape);
    let ratio = old_len as f64 / new_len as f64;
    for j in 0..new_len {
        let start = j as f64 * ratio;
        let end = (j + 1) as f64 * ratio;
        let mut lane = out.index_axis_mut(Axis(axis), j);
        let first = start.floor() as usize;
        let last = (end.ceil() as usize).min(old_len);
        for i in first..last {
            let weight = end.min((i + 1) as f64) - start.max(i as f64);
            if weight > 0.0 {
                lane.scaled_add(weight / ratio, &data.index_axis(Axis(axis), i));
            }
        }
    }
    Ok(out)
}
