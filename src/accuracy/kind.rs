//! Cost-function kinds and covariance approximations.
use crate::accuracy::errors::AccuracyError;
use crate::database::{CorrelationSpec, DataKind};
use std::fmt;
use std::str::FromStr;

const ALLOWED_COST_FUNCTION_KINDS: &str =
    "'OLS', 'WLS', 'LWLS', 'GLS', 'GLS.<min_values>.<max_year_diff>'";

/// Weighting of the residuals in a cost function.
///
/// Parsing:
/// `"OLS"`, `"WLS"`, `"LWLS"`, `"GLS"` and
/// `"GLS.<min_values>.<max_year_diff>"`, case-insensitive. A negative
/// `max_year_diff` means no limit. Unknown names return
/// [`AccuracyError::UnknownCostFunctionKind`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CostFunctionKind {
    /// Residuals weighted by the inverse average variance.
    Ols,
    /// Residuals weighted by their inverse variances.
    Wls,
    /// Weighted residuals of log-transformed values.
    Lwls,
    /// Normalized residuals correlated by the estimated correlation matrix
    /// of the sites, built from pairs with at least `min_values` samples
    /// and at most `max_year_diff` years apart.
    Gls { min_values: usize, max_year_diff: f64 },
    /// Normalized residuals correlated by the two-group block matrix whose
    /// `(a, b, c)` are stored with each parameter set.
    BlockGls,
}

impl CostFunctionKind {
    /// Correlation matrix parameters of `Gls`; `None` for uncorrelated kinds.
    pub fn correlation_spec(&self) -> Option<CorrelationSpec> {
        match *self {
            CostFunctionKind::Gls { min_values, max_year_diff } => {
                Some(CorrelationSpec::new(min_values).with_max_year_diff(max_year_diff))
            }
            _ => None,
        }
    }
}

impl FromStr for CostFunctionKind {
    type Err = AccuracyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let unknown = || AccuracyError::UnknownCostFunctionKind {
            value: s.to_string(),
            allowed: ALLOWED_COST_FUNCTION_KINDS,
        };
        let upper = s.trim().to_uppercase();
        match upper.as_str() {
            "OLS" => return Ok(CostFunctionKind::Ols),
            "WLS" => return Ok(CostFunctionKind::Wls),
            "LWLS" => return Ok(CostFunctionKind::Lwls),
            "GLS" => return Ok(CostFunctionKind::BlockGls),
            _ => {}
        }
        let mut parts = upper.split('.');
        match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some("GLS"), Some(min_values), Some(max_year_diff), None) => {
                let min_values = min_values.parse::<usize>().map_err(|_| unknown())?;
                let max_year_diff = max_year_diff.parse::<i64>().map_err(|_| unknown())?;
                let max_year_diff =
                    if max_year_diff < 0 { f64::INFINITY } else { max_year_diff as f64 };
                Ok(CostFunctionKind::Gls { min_values, max_year_diff })
            }
            _ => Err(unknown()),
        }
    }
}

impl fmt::Display for CostFunctionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CostFunctionKind::Ols => write!(f, "OLS"),
            CostFunctionKind::Wls => write!(f, "WLS"),
            CostFunctionKind::Lwls => write!(f, "LWLS"),
            CostFunctionKind::BlockGls => write!(f, "GLS"),
            CostFunctionKind::Gls { min_values, max_year_diff } if max_year_diff.is_infinite() => {
                write!(f, "GLS.{min_values}.-1")
            }
            CostFunctionKind::Gls { min_values, max_year_diff } => {
                write!(f, "GLS.{min_values}.{}", *max_year_diff as i64)
            }
        }
    }
}

/// A data kind paired with a cost-function kind, written `"<DATA>_<CF>"`,
/// e.g. `"WOD.1_GLS.40.-1"`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AccuracyKind {
    pub data_kind: DataKind,
    pub cost_function: CostFunctionKind,
}

impl FromStr for AccuracyKind {
    type Err = AccuracyError;

    /// Errors
    /// ------
    /// - [`AccuracyError::DataBase`] for an unknown data kind.
    /// - [`AccuracyError::UnknownCostFunctionKind`] for an unknown cost
    ///   function or a string without exactly one `_`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split('_');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(data_kind), Some(cost_function), None) => Ok(AccuracyKind {
                data_kind: data_kind.parse()?,
                cost_function: cost_function.parse()?,
            }),
            _ => Err(AccuracyError::UnknownCostFunctionKind {
                value: s.to_string(),
                allowed: ALLOWED_COST_FUNCTION_KINDS,
            }),
        }
    }
}

impl fmt::Display for AccuracyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.data_kind, self.cost_function)
    }
}

/// Approximation of the parameter covariance.
///
/// - `F`: inverse information matrix.
/// - `H`: inverse Hessian of the cost function.
/// - `FH`: sandwich `H⁻¹ F H⁻¹`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MatrixType {
    #[default]
    FH,
    F,
    H,
}

impl FromStr for MatrixType {
    type Err = AccuracyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "F_H" => Ok(MatrixType::FH),
            "F" => Ok(MatrixType::F),
            "H" => Ok(MatrixType::H),
            _ => Err(AccuracyError::UnknownMatrixType { value: s.to_string() }),
        }
    }
}

impl fmt::Display for MatrixType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatrixType::FH => write!(f, "F_H"),
            MatrixType::F => write!(f, "F"),
            MatrixType::H => write!(f, "H"),
        }
    }
}
