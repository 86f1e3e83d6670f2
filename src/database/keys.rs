//! Typed keys of the parameter-independent memory caches.
use crate::database::measurements::CorrelationSpec;

/// Measurement-derived quantities, cached once per database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MeasurementKey {
    M,
    Results,
    Deviations,
    InverseDeviations,
    Variances,
    InverseVariances,
    AverageVariance,
    InverseAverageVariance,
    DeviationsBoxes { time_dim: usize },
    InverseDeviationsBoxes { time_dim: usize },
    ResultsBoxes,
    MeanDeviationsBoxes,
}

/// Correlation matrices of point databases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatrixKey {
    Correlation(CorrelationSpec),
    Cholesky(CorrelationSpec),
}
