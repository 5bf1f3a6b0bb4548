//! Python bindings

use crate::core::calibrate::{ChannelLayout, Coefficient, LinearDecode};
use crate::core::reorder::{ScanReorderer, TileOffsets};
use crate::core::spectrum::{self, BandProfile};
use crate::types::{ArrayData, SwathError};
use numpy::{IntoPyArray, PyArray1, PyArray2, PyReadonlyArray1};
use pyo3::exceptions::{PyRuntimeError, PyValueError};
use pyo3::prelude::*;

impl From<SwathError> for PyErr {
    fn from(e: SwathError) -> Self {
        match e {
            SwathError::InvalidRange(_)
            | SwathError::DimensionMismatch(_)
            | SwathError::CalibrationConfig(_) => PyErr::new::<PyValueError, _>(format!("{}", e)),
            _ => PyErr::new::<PyRuntimeError, _>(format!("{}", e)),
        }
    }
}

fn tile_table(name: &str) -> PyResult<TileOffsets> {
    match name.to_lowercase().as_str() {
        "cris_fsr" => Ok(TileOffsets::CRIS_FSR),
        "row_major" => Ok(TileOffsets::ROW_MAJOR),
        _ => Err(PyErr::new::<PyValueError, _>(format!(
            "Unknown tile table: {}",
            name
        ))),
    }
}

/// Reorder a native-order buffer into a (lines, elems) image
#[pyfunction]
#[pyo3(signature = (values, num_elems, num_lines, table = "cris_fsr"))]
fn reorder<'py>(
    py: Python<'py>,
    values: PyReadonlyArray1<'py, f32>,
    num_elems: usize,
    num_lines: usize,
    table: &str,
) -> PyResult<&'py PyArray2<f32>> {
    let reorderer = ScanReorderer::new(tile_table(table)?);
    let image = reorderer.reorder_image(values.as_slice()?, num_elems, num_lines)?;
    Ok(image.into_pyarray(py))
}

/// Masked linear decode: NaN for fill or out-of-range, else scale * (v - offset)
#[pyfunction]
#[pyo3(signature = (values, scale, offset, missing = None, valid_min = None, valid_max = None))]
fn linear_decode<'py>(
    py: Python<'py>,
    values: PyReadonlyArray1<'py, f64>,
    scale: f64,
    offset: f64,
    missing: Option<f64>,
    valid_min: Option<f64>,
    valid_max: Option<f64>,
) -> PyResult<&'py PyArray1<f32>> {
    let mut decode = LinearDecode::new(Coefficient::Scalar(scale), Coefficient::Scalar(offset));
    decode.missing = missing.map(Coefficient::Scalar);
    decode.valid_low = valid_min.map(Coefficient::Scalar);
    decode.valid_high = valid_max.map(Coefficient::Scalar);

    let raw = ArrayData::Float64(values.as_slice()?.to_vec());
    let decoded = decode.decode(&raw, &ChannelLayout::broadcast());
    Ok(decoded.into_pyarray(py))
}

/// Brightness temperature (K) of radiances at one wavenumber (cm^-1)
#[pyfunction]
fn brightness_temperature<'py>(
    py: Python<'py>,
    radiance: PyReadonlyArray1<'py, f64>,
    wavenumber: f64,
) -> PyResult<&'py PyArray1<f64>> {
    let out: Vec<f64> = radiance
        .as_slice()?
        .iter()
        .map(|&r| spectrum::brightness_temperature(r, wavenumber))
        .collect();
    Ok(out.into_pyarray(py))
}

/// Black-body radiance of temperatures (K) at one wavenumber (cm^-1)
#[pyfunction]
fn planck_radiance<'py>(
    py: Python<'py>,
    temperature: PyReadonlyArray1<'py, f64>,
    wavenumber: f64,
) -> PyResult<&'py PyArray1<f64>> {
    let out: Vec<f64> = temperature
        .as_slice()?
        .iter()
        .map(|&t| spectrum::planck_radiance(t, wavenumber))
        .collect();
    Ok(out.into_pyarray(py))
}

/// Channel wavenumbers of a CrIS FSR band, selected by array name suffix
#[pyfunction]
fn band_wavenumbers<'py>(py: Python<'py>, array_name: &str) -> PyResult<&'py PyArray1<f32>> {
    let bands = BandProfile::cris_fsr();
    let band = BandProfile::select(&bands, array_name).ok_or_else(|| {
        PyErr::new::<PyValueError, _>(format!("No band profile matches {}", array_name))
    })?;
    Ok(band.frequencies().into_pyarray(py))
}

/// Python module definition
#[pymodule]
fn _core(_py: Python, m: &PyModule) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(reorder, m)?)?;
    m.add_function(wrap_pyfunction!(linear_decode, m)?)?;
    m.add_function(wrap_pyfunction!(brightness_temperature, m)?)?;
    m.add_function(wrap_pyfunction!(planck_radiance, m)?)?;
    m.add_function(wrap_pyfunction!(band_wavenumbers, m)?)?;
    Ok(())
}
