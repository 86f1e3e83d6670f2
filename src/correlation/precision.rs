//! Accumulation precision for the projection reductions.
//!
//! Projections sum up to millions of squared residuals. With
//! [`Precision::Extended`] the sums are carried in double-double arithmetic
//! (an unevaluated `hi + lo` pair, roughly 106 significant bits) and rounded
//! to `f64` once at the end.
use ndarray::{Array1, Array2, ArrayView2, Axis};
use std::str::FromStr;

/// Accumulator width used by reductions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Precision {
    /// Plain `f64` summation (BLAS-backed where available).
    #[default]
    Standard,
    /// Compensated double-double summation.
    Extended,
}

impl FromStr for Precision {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "standard" | "double" | "f64" => Ok(Precision::Standard),
            "extended" | "double-double" | "dd" => Ok(Precision::Extended),
            _ => Err(format!("Unknown precision: '{s}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub(crate) struct DoubleDouble {
    hi: f64,
    lo: f64,
}

/// Error-free `a + b = s + e` (Knuth).
#[inline]
fn two_sum(a: f64, b: f64) -> (f64, f64) {
    let s = a + b;
    let bb = s - a;
    (s, (a - (s - bb)) + (b - bb))
}

#[inline]
fn quick_two_sum(a: f64, b: f64) -> (f64, f64) {
    let s = a + b;
    (s, b - (s - a))
}

impl DoubleDouble {
    #[inline]
    pub(crate) fn add(&mut self, x: f64) {
        let (s, e) = two_sum(self.hi, x);
        let (hi, lo) = quick_two_sum(s, e + self.lo);
        self.hi = hi;
        self.lo = lo;
    }

    /// Add the exact product `a·b` (via fused multiply-add).
    #[inline]
    pub(crate) fn add_product(&mut self, a: f64, b: f64) {
        let p = a * b;
        let err = a.mul_add(b, -p);
        self.add(p);
        self.add(err);
    }

    pub(crate) fn value(self) -> f64 {
        self.hi + self.lo
    }
}

/// `XᵀX` for an `r × k` block.
pub(crate) fn gram(x: ArrayView2<f64>, precision: Precision) -> Array2<f64> {
    match precision {
        Precision::Standard => x.t().dot(&x),
        Precision::Extended => {
            let k = x.ncols();
            let mut out = Array2::zeros((k, k));
            for i in 0..k {
                for j in i..k {
                    let mut acc = DoubleDouble::default();
                    for (&u, &v) in x.column(i).iter().zip(x.column(j).iter()) {
                        acc.add_product(u, v);
                    }
                    out[[i, j]] = acc.value();
                    out[[j, i]] = out[[i, j]];
                }
            }
            out
        }
    }
}

/// Column sums of an `r × k` block.
pub(crate) fn column_sums(x: ArrayView2<f64>, precision: Precision) -> Array1<f64> {
    match precision {
        Precision::Standard => x.sum_axis(Axis(0)),
        Precision::Extended => x
            .columns()
            .into_iter()
            .map(|col| {
                let mut acc = DoubleDouble::default();
                col.iter().for_each(|&v| acc.add(v));
                acc.value()
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::{array, Array2};

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover:
    // - Double-double accumulation recovering digits that plain f64 loses.
    // - Agreement of both precisions on well-conditioned data.
    // - `FromStr` parsing.
    // -------------------------------------------------------------------------

    #[test]
    // Purpose
    // -------
    // Extended sums survive catastrophic cancellation.
    //
    // Given
    // -----
    // - Column `[1e16, 1, -1e16, 1]` whose exact sum is 2.
    //
    // Expect
    // ------
    // - Extended returns exactly 2; standard does not.
    fn extended_column_sums_are_compensated() {
        // Arrange
        let x = array![[1e16], [1.0], [-1e16], [1.0]];

        // Act
        let extended = column_sums(x.view(), Precision::Extended);
        let standard = column_sums(x.view(), Precision::Standard);

        // Assert
        assert_eq!(extended[0], 2.0);
        assert_ne!(standard[0], 2.0);
    }

    #[test]
    // Purpose
    // -------
    // Both precisions agree on ordinary data and return symmetric Gram matrices.
    //
    // Given
    // -----
    // - A 5×3 block with mixed signs.
    //
    // Expect
    // ------
    // - Entry-wise agreement to 1e-14 relative; symmetry of the extended result.
    fn gram_precisions_agree_on_benign_data() {
        // Arrange
        let x = Array2::from_shape_fn((5, 3), |(i, j)| (i as f64 + 1.0) * (j as f64 - 0.7));

        // Act
        let standard = gram(x.view(), Precision::Standard);
        let extended = gram(x.view(), Precision::Extended);

        // Assert
        for ((i, j), &v) in standard.indexed_iter() {
            assert_relative_eq!(v, extended[[i, j]], max_relative = 1e-14);
            assert_eq!(extended[[i, j]], extended[[j, i]]);
        }
    }

    #[test]
    fn precision_from_str_is_case_insensitive() {
        assert_eq!("Extended".parse::<Precision>(), Ok(Precision::Extended));
        assert_eq!("STANDARD".parse::<Precision>(), Ok(Precision::Standard));
        assert!("quad".parse::<Precision>().is_err());
    }
}
