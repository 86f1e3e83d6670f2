//! Argument conversion for the Python bindings.
#[cfg(feature = "python-bindings")]
use ndarray::{Array1, Array2};

#[cfg(feature = "python-bindings")]
use numpy::{PyReadonlyArray1, PyReadonlyArray2};

#[cfg(feature = "python-bindings")]
use pyo3::{exceptions::PyValueError, prelude::*, types::PyAny};

#[cfg(feature = "python-bindings")]
use crate::correlation::Precision;

/// Copy a 1-D float array or a sequence of floats into an `Array1`.
#[cfg(feature = "python-bindings")]
pub fn extract_vector(raw: &Bound<'_, PyAny>) -> PyResult<Array1<f64>> {
    if let Ok(array) = raw.extract::<PyReadonlyArray1<f64>>() {
        return Ok(array.as_array().to_owned());
    }
    let values: Vec<f64> = raw.extract().map_err(|_| {
        pyo3::exceptions::PyTypeError::new_err("expected a 1-D numpy.ndarray or sequence of float64")
    })?;
    Ok(Array1::from(values))
}

/// Copy a 2-D float array into an `Array2`, or a 1-D input as one column.
#[cfg(feature = "python-bindings")]
pub fn extract_matrix(raw: &Bound<'_, PyAny>) -> PyResult<Array2<f64>> {
    if let Ok(array) = raw.extract::<PyReadonlyArray2<f64>>() {
        return Ok(array.as_array().to_owned());
    }
    let column = extract_vector(raw)?;
    let rows = column.len();
    Ok(column.into_shape_with_order((rows, 1)).map_err(|e| PyValueError::new_err(e.to_string()))?)
}

#[cfg(feature = "python-bindings")]
pub fn extract_precision(precision: Option<&str>) -> PyResult<Precision> {
    precision.map_or(Ok(Precision::default()), |p| p.parse().map_err(PyValueError::new_err))
}
