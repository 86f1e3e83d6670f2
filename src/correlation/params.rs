//! The three parameters of the two-group block correlation structure.
use crate::correlation::errors::{CorrelationError, CorrelationResult};

/// `(a, b, c)`: within-group correlation of group 1, of group 2, and the
/// cross-group correlation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CorrelationParameters {
    pub a: f64,
    pub b: f64,
    pub c: f64,
}

impl CorrelationParameters {
    /// Validate and build.
    ///
    /// Errors
    /// ------
    /// - [`CorrelationError::NonFiniteParameter`] for NaN/±inf.
    /// - [`CorrelationError::WithinGroupTooLarge`] if `a >= 1` or `b >= 1`.
    pub fn new(a: f64, b: f64, c: f64) -> CorrelationResult<Self> {
        for (index, value) in [a, b, c].into_iter().enumerate() {
            if !value.is_finite() {
                return Err(CorrelationError::NonFiniteParameter { index, value });
            }
        }
        if a >= 1.0 {
            return Err(CorrelationError::WithinGroupTooLarge { name: "a", value: a });
        }
        if b >= 1.0 {
            return Err(CorrelationError::WithinGroupTooLarge { name: "b", value: b });
        }
        Ok(CorrelationParameters { a, b, c })
    }

    pub fn from_slice(values: &[f64]) -> CorrelationResult<Self> {
        match *values {
            [a, b, c] => Self::new(a, b, c),
            _ => Err(CorrelationError::InvalidParameterCount { actual: values.len() }),
        }
    }

    pub fn to_array(self) -> [f64; 3] {
        [self.a, self.b, self.c]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover:
    // - Acceptance of ordinary parameters and rejection of a/b >= 1,
    //   non-finite values, and wrong lengths.
    // -------------------------------------------------------------------------

    #[test]
    // Purpose
    // -------
    // Valid slices build parameters in order.
    //
    // Given
    // -----
    // - `[0.1, 0.2, 0.05]`.
    //
    // Expect
    // ------
    // - `a = 0.1`, `b = 0.2`, `c = 0.05`.
    fn from_slice_accepts_three_values() {
        let p = CorrelationParameters::from_slice(&[0.1, 0.2, 0.05]).unwrap();
        assert_eq!(p.to_array(), [0.1, 0.2, 0.05]);
    }

    #[test]
    // Purpose
    // -------
    // Invalid inputs are rejected with the matching variant.
    //
    // Given
    // -----
    // - Two values; `a = 1`; `c = NaN`.
    //
    // Expect
    // ------
    // - `InvalidParameterCount`, `WithinGroupTooLarge`, `NonFiniteParameter`.
    fn invalid_parameters_are_rejected() {
        assert_eq!(
            CorrelationParameters::from_slice(&[0.1, 0.2]),
            Err(CorrelationError::InvalidParameterCount { actual: 2 })
        );
        assert!(matches!(
            CorrelationParameters::new(1.0, 0.2, 0.0),
            Err(CorrelationError::WithinGroupTooLarge { name: "a", .. })
        ));
        assert!(matches!(
            CorrelationParameters::new(0.1, 0.2, f64::NAN),
            Err(CorrelationError::NonFiniteParameter { index: 2, .. })
        ));
    }
}
