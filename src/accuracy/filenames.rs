//! On-disk names of accuracy results.
//!
//! Names are shared with existing result stores and must be reproduced byte
//! for byte; floats and booleans render as Python does (`0.99`, `True`).
use crate::accuracy::kind::MatrixType;
use crate::cache::{CacheResult, FilenameTemplate, TemplateValue};

pub const CACHE_DIRNAME: &str = "accuracy";

pub const INFORMATION_MATRIX_FILENAME: &str = "information_matrix_-_type_{matrix_type}.txt";
pub const CORRELATION_MATRIX_FILENAME: &str = "correlation_matrix_-_type_{matrix_type}.txt";
pub const COVARIANCE_MATRIX_FILENAME: &str =
    "covariance_matrix_-_type_{matrix_type}_-_include_variance_factor_{include_variance_factor}.txt";
pub const PARAMETER_CONFIDENCE_FILENAME: &str = "parameter_confidence_-_type_{matrix_type}_-_\
include_variance_factor_{include_variance_factor}_-_alpha_{alpha}_-_relative_{relative}.txt";
pub const MODEL_CONFIDENCE_FILENAME: &str = "model_confidence_-_type_{matrix_type}_-_\
include_variance_factor_{include_variance_factor}_-_alpha_{alpha}_-_\
time_dim_confidence_{time_dim_confidence}_-_time_dim_model_{time_dim_model}.npy";
pub const AVERAGE_MODEL_CONFIDENCE_FILENAME: &str = "average_model_confidence_-_type_{matrix_type}_-_\
include_variance_factor_{include_variance_factor}_-_alpha_{alpha}_-_time_dim_model_{time_dim_model}_-_\
per_tracer_{per_tracer}_-_relative_{relative}.txt";
pub const CONFIDENCE_INCREASE_FILENAME: &str = "confidence_increase_-_{confidence_type}_-_\
include_variance_factor_{include_variance_factor}_-_alpha_{alpha}_-_\
number_of_measurements_{number_of_measurements}_-_time_dim_model_{time_dim_model}_-_relative_{relative}.npy";

/// Settings shared by every confidence filename.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConfidenceSettings {
    pub matrix_type: MatrixType,
    pub include_variance_factor: bool,
    pub alpha: f64,
}

impl ConfidenceSettings {
    fn fields(&self) -> Vec<(&'static str, TemplateValue)> {
        vec![
            ("matrix_type", TemplateValue::from(self.matrix_type.to_string())),
            ("include_variance_factor", TemplateValue::from(self.include_variance_factor)),
            ("alpha", TemplateValue::from(self.alpha)),
        ]
    }
}

fn render(template: &str, fields: &[(&str, TemplateValue)]) -> CacheResult<String> {
    FilenameTemplate::new(template).render(fields)
}

pub fn information_matrix_filename(matrix_type: MatrixType) -> CacheResult<String> {
    render(INFORMATION_MATRIX_FILENAME, &[("matrix_type", matrix_type.to_string().into())])
}

pub fn correlation_matrix_filename(matrix_type: MatrixType) -> CacheResult<String> {
    render(CORRELATION_MATRIX_FILENAME, &[("matrix_type", matrix_type.to_string().into())])
}

pub fn covariance_matrix_filename(
    matrix_type: MatrixType, include_variance_factor: bool,
) -> CacheResult<String> {
    render(
        COVARIANCE_MATRIX_FILENAME,
        &[
            ("matrix_type", matrix_type.to_string().into()),
            ("include_variance_factor", include_variance_factor.into()),
        ],
    )
}

pub fn parameter_confidence_filename(
    settings: &ConfidenceSettings, relative: bool,
) -> CacheResult<String> {
    let mut fields = settings.fields();
    fields.push(("relative", relative.into()));
    render(PARAMETER_CONFIDENCE_FILENAME, &fields)
}

pub fn model_confidence_filename(
    settings: &ConfidenceSettings, time_dim_confidence: usize, time_dim_model: usize,
) -> CacheResult<String> {
    let mut fields = settings.fields();
    fields.push(("time_dim_confidence", time_dim_confidence.into()));
    fields.push(("time_dim_model", time_dim_model.into()));
    render(MODEL_CONFIDENCE_FILENAME, &fields)
}

pub fn average_model_confidence_filename(
    settings: &ConfidenceSettings, time_dim_model: usize, per_tracer: bool, relative: bool,
) -> CacheResult<String> {
    let mut fields = settings.fields();
    fields.push(("time_dim_model", time_dim_model.into()));
    fields.push(("per_tracer", per_tracer.into()));
    fields.push(("relative", relative.into()));
    render(AVERAGE_MODEL_CONFIDENCE_FILENAME, &fields)
}

pub fn confidence_increase_filename(
    confidence_type: &str, include_variance_factor: bool, alpha: f64, number_of_measurements: usize,
    time_dim_model: usize, relative: bool,
) -> CacheResult<String> {
    render(
        CONFIDENCE_INCREASE_FILENAME,
        &[
            ("confidence_type", confidence_type.into()),
            ("include_variance_factor", include_variance_factor.into()),
            ("alpha", alpha.into()),
            ("number_of_measurements", number_of_measurements.into()),
            ("time_dim_model", time_dim_model.into()),
            ("relative", relative.into()),
        ],
    )
}
