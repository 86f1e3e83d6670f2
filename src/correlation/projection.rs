//! Projection of stacked two-group data onto the block structure.
//!
//! For values `X` (`(n + m) × k`) split after row `n` into `X₁` and `X₂`, the
//! projection consists of
//!
//! - the per-group squared products `X₁ᵀX₁` and `X₂ᵀX₂` (each `k × k`), and
//! - the per-group sums `s = [1ᵀX₁; 1ᵀX₂]` (`2 × k`).
//!
//! These are all that the block-correlation inverse needs from the data, so
//! a projection can be computed once and combined with many `(a, b, c)`.
use crate::correlation::errors::{CorrelationError, CorrelationResult};
use crate::correlation::precision::{column_sums, gram, Precision};
use ndarray::{s, Array2, ArrayView1, ArrayView2, Axis};

/// Sufficient statistics of `X` for the block-correlation inverse.
#[derive(Debug, Clone, PartialEq)]
pub struct Projection {
    /// `[X₁ᵀX₁, X₂ᵀX₂]`.
    pub squared: [Array2<f64>; 2],
    /// Row `g` holds the column sums of group `g`.
    pub summed: Array2<f64>,
    /// Group sizes `(n, m)`.
    pub groups: (usize, usize),
}

impl Projection {
    /// Number of projected columns `k`.
    pub fn width(&self) -> usize {
        self.summed.ncols()
    }

    /// Sum of both squared blocks, `XᵀX`.
    pub fn total_squared(&self) -> Array2<f64> {
        &self.squared[0] + &self.squared[1]
    }
}

fn check_split(len: usize, split_index: usize) -> CorrelationResult<()> {
    if split_index > len {
        return Err(CorrelationError::SplitOutOfRange { split: split_index, len });
    }
    Ok(())
}

/// Per-group squared products only.
pub fn project_squared(
    values: ArrayView2<f64>, split_index: usize, precision: Precision,
) -> CorrelationResult<[Array2<f64>; 2]> {
    check_split(values.nrows(), split_index)?;
    let (first, second) = values.split_at(Axis(0), split_index);
    Ok([gram(first, precision), gram(second, precision)])
}

/// Per-group column sums only (`2 × k`).
pub fn project_summed(
    values: ArrayView2<f64>, split_index: usize, precision: Precision,
) -> CorrelationResult<Array2<f64>> {
    check_split(values.nrows(), split_index)?;
    let mut summed = Array2::zeros((2, values.ncols()));
    summed.row_mut(0).assign(&column_sums(values.slice(s![..split_index, ..]), precision));
    summed.row_mut(1).assign(&column_sums(values.slice(s![split_index.., ..]), precision));
    Ok(summed)
}

/// Full projection of a `(n + m) × k` block.
///
/// Errors
/// ------
/// - [`CorrelationError::SplitOutOfRange`] if `split_index > values.nrows()`.
pub fn project(
    values: ArrayView2<f64>, split_index: usize, precision: Precision,
) -> CorrelationResult<Projection> {
    Ok(Projection {
        squared: project_squared(values, split_index, precision)?,
        summed: project_summed(values, split_index, precision)?,
        groups: (split_index, values.nrows() - split_index),
    })
}

/// Projection of a single vector (`k = 1`).
pub fn project_vector(
    values: ArrayView1<f64>, split_index: usize, precision: Precision,
) -> CorrelationResult<Projection> {
    project(values.insert_axis(Axis(1)), split_index, precision)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover:
    // - Squared/summed components on a small hand-checked example.
    // - Split index validation.
    // -------------------------------------------------------------------------

    #[test]
    // Purpose
    // -------
    // Check both components on a vector split 2 + 3.
    //
    // Given
    // -----
    // - `x = [1, 2, 3, 4, 5]`, split at 2.
    //
    // Expect
    // ------
    // - squared = [[5]], [[50]]; summed = [[3], [12]]; groups = (2, 3).
    fn project_vector_components() {
        // Arrange
        let x = array![1.0, 2.0, 3.0, 4.0, 5.0];

        // Act
        let p = project_vector(x.view(), 2, Precision::Standard).unwrap();

        // Assert
        assert_eq!(p.squared[0], array![[5.0]]);
        assert_eq!(p.squared[1], array![[50.0]]);
        assert_eq!(p.summed, array![[3.0], [12.0]]);
        assert_eq!(p.groups, (2, 3));
        assert_eq!(p.total_squared(), array![[55.0]]);
    }

    #[test]
    // Purpose
    // -------
    // Matrix projections produce k×k cross products.
    //
    // Given
    // -----
    // - A 3×2 block split at 1.
    //
    // Expect
    // ------
    // - First group Gram = outer product of its single row.
    fn project_matrix_cross_products() {
        // Arrange
        let x = array![[1.0, 2.0], [3.0, 4.0], [5.0, 6.0]];

        // Act
        let p = project(x.view(), 1, Precision::Extended).unwrap();

        // Assert
        assert_eq!(p.squared[0], array![[1.0, 2.0], [2.0, 4.0]]);
        assert_eq!(p.squared[1], array![[34.0, 42.0], [42.0, 52.0]]);
        assert_eq!(p.summed, array![[1.0, 2.0], [8.0, 10.0]]);
        assert_eq!(p.width(), 2);
    }

    #[test]
    fn split_beyond_length_is_rejected() {
        let x = array![1.0, 2.0];
        assert_eq!(
            project_vector(x.view(), 3, Precision::Standard),
            Err(CorrelationError::SplitOutOfRange { split: 3, len: 2 })
        );
    }
}
