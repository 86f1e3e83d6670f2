//! Adapting cached Jacobians to the requested parameter count.
//!
//! A cached Jacobian may carry more partial derivatives than requested (the
//! model appended derivatives for extra parameters) or fewer (it was computed
//! for a shorter parameter vector). Extra columns are dropped from the end;
//! missing columns force a recomputation.
use ndarray::{ArrayD, ArrayViewD, Axis, Slice};

/// What to do with a cached Jacobian of width `cached` when `requested`
/// columns are needed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnReconciliation {
    Keep,
    Truncate { cached: usize, requested: usize },
    Recompute { cached: usize, requested: usize },
}

pub fn reconcile_columns(cached: usize, requested: usize) -> ColumnReconciliation {
    use std::cmp::Ordering;
    match cached.cmp(&requested) {
        Ordering::Equal => ColumnReconciliation::Keep,
        Ordering::Greater => ColumnReconciliation::Truncate { cached, requested },
        Ordering::Less => ColumnReconciliation::Recompute { cached, requested },
    }
}

/// First `columns` entries along the last axis.
///
/// Panics
/// ------
/// - If `array` is zero-dimensional or has fewer than `columns` entries on
///   its last axis.
pub fn truncate_last_axis(array: ArrayViewD<f64>, columns: usize) -> ArrayD<f64> {
    let last = array.ndim() - 1;
    assert!(array.len_of(Axis(last)) >= columns, "cannot truncate to more columns than stored");
    array.slice_axis(Axis(last), Slice::from(0..columns)).to_owned()
}
