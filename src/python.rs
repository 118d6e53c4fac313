//! Python bindings

use crate::config::RunConfig;
use crate::core::compare::{ComparisonReport, EpochPair};
use crate::core::cube::{FrameData, InsarCube, InsarField, SelectionMode};
use crate::io::insar::InsarCubeReader;
use crate::io::report::ReportWriter;
use crate::types::{DisplacementSeries, LevsarError};
use chrono::NaiveDate;
use ndarray::Array2;
use numpy::{
    IntoPyArray, PyArray1, PyArray2, PyReadonlyArray1, PyReadonlyArray2, PyReadonlyArray3,
};
use pyo3::exceptions::{PyIOError, PyRuntimeError, PyValueError};
use pyo3::prelude::*;

/// Python module definition
#[pymodule]
fn _core(_py: Python, m: &PyModule) -> PyResult<()> {
    m.add_class::<PyLevelingSurvey>()?;
    m.add_class::<PyInsarCube>()?;
    m.add_class::<PyComparisonReport>()?;
    m.add_function(wrap_pyfunction!(read_leveling_data, m)?)?;
    m.add_function(wrap_pyfunction!(compare_field, m)?)?;
    m.add_function(wrap_pyfunction!(compare_cube, m)?)?;
    Ok(())
}

fn to_py_err(err: LevsarError) -> PyErr {
    match err {
        LevsarError::Io(_) => PyIOError::new_err(err.to_string()),
        LevsarError::Config(_) | LevsarError::ShapeMismatch(_) => {
            PyValueError::new_err(err.to_string())
        }
        _ => PyRuntimeError::new_err(err.to_string()),
    }
}

fn load_config(config_file: Option<String>) -> PyResult<RunConfig> {
    match config_file {
        Some(path) => RunConfig::from_json_file(path).map_err(to_py_err),
        None => Ok(RunConfig::default()),
    }
}

fn parse_date(text: &str) -> PyResult<NaiveDate> {
    NaiveDate::parse_from_str(text.trim(), "%Y-%m-%d")
        .map_err(|e| PyValueError::new_err(format!("Invalid date '{}': {}", text, e)))
}

/// Read, correct and datum-reference a standard survey sheet
#[pyfunction]
#[pyo3(signature = (data_file, corrections_file, coordinate_file, config_file=None))]
fn read_leveling_data(
    data_file: String,
    corrections_file: String,
    coordinate_file: String,
    config_file: Option<String>,
) -> PyResult<PyLevelingSurvey> {
    let config = load_config(config_file)?;
    let reader = config.leveling_reader().map_err(to_py_err)?;
    let survey = reader
        .read_survey_files(data_file, corrections_file, coordinate_file, config.delimiter)
        .map_err(to_py_err)?;
    let series = config
        .datum_referencer()
        .reference_all(&survey)
        .map_err(to_py_err)?;
    Ok(PyLevelingSurvey { inner: series })
}

/// Compare a survey with a flat single-interval InSAR field
#[pyfunction]
#[pyo3(signature = (survey, lon, lat, los, insar_start, insar_end, leveling_epochs, remove_ramp=false, flip_sign=false, config_file=None))]
#[allow(clippy::too_many_arguments)]
fn compare_field(
    survey: PyRef<PyLevelingSurvey>,
    lon: PyReadonlyArray1<f64>,
    lat: PyReadonlyArray1<f64>,
    los: PyReadonlyArray1<f64>,
    insar_start: &str,
    insar_end: &str,
    leveling_epochs: (usize, usize),
    remove_ramp: bool,
    flip_sign: bool,
    config_file: Option<String>,
) -> PyResult<PyComparisonReport> {
    let config = load_config(config_file)?;
    let mut field = InsarField::new(
        lon.as_array().to_vec(),
        lat.as_array().to_vec(),
        los.as_array().to_vec(),
        parse_date(insar_start)?,
        parse_date(insar_end)?,
    )
    .map_err(to_py_err)?
    .remove_nans();
    if flip_sign {
        field = field.flip_los_sign();
    }
    if remove_ramp {
        field = field.remove_ramp().map_err(to_py_err)?;
    }

    let report = config
        .comparator()
        .compare(
            &survey.inner,
            &field,
            EpochPair::new(leveling_epochs.0, leveling_epochs.1),
        )
        .map_err(to_py_err)?;
    Ok(PyComparisonReport { inner: report })
}

/// Compare a survey with the interval between two cube epochs
#[pyfunction]
#[pyo3(signature = (survey, cube, leveling_epochs, insar_epochs, config_file=None))]
fn compare_cube(
    survey: PyRef<PyLevelingSurvey>,
    cube: PyRef<PyInsarCube>,
    leveling_epochs: (usize, usize),
    insar_epochs: (usize, usize),
    config_file: Option<String>,
) -> PyResult<PyComparisonReport> {
    let config = load_config(config_file)?;
    let report = config
        .comparator()
        .compare_cube(
            &survey.inner,
            &cube.inner,
            EpochPair::new(leveling_epochs.0, leveling_epochs.1),
            EpochPair::new(insar_epochs.0, insar_epochs.1),
        )
        .map_err(to_py_err)?;
    Ok(PyComparisonReport { inner: report })
}

/// Python wrapper for a datum-referenced survey
#[pyclass(name = "LevelingSurvey")]
struct PyLevelingSurvey {
    inner: Vec<DisplacementSeries>,
}

#[pymethods]
impl PyLevelingSurvey {
    #[getter]
    fn names(&self) -> Vec<String> {
        self.inner.iter().map(|s| s.name.clone()).collect()
    }

    #[getter]
    fn lons(&self) -> Vec<f64> {
        self.inner.iter().map(|s| s.location.lon).collect()
    }

    #[getter]
    fn lats(&self) -> Vec<f64> {
        self.inner.iter().map(|s| s.location.lat).collect()
    }

    #[getter]
    fn epochs(&self) -> Vec<String> {
        self.inner
            .first()
            .map(|s| s.epochs.iter().map(|e| e.to_string()).collect())
            .unwrap_or_default()
    }

    /// Displacements in meters as a (benchmark, epoch) array, NaN where missing
    fn displacements<'py>(&self, py: Python<'py>) -> PyResult<&'py PyArray2<f64>> {
        let n_epochs = self.inner.first().map_or(0, |s| s.len());
        let values: Vec<f64> = self
            .inner
            .iter()
            .flat_map(|s| s.displacements.iter().map(|v| v.unwrap_or(f64::NAN)))
            .collect();
        let grid = Array2::from_shape_vec((self.inner.len(), n_epochs), values)
            .map_err(|e| PyValueError::new_err(format!("Ragged survey: {}", e)))?;
        Ok(grid.into_pyarray(py))
    }

    fn __len__(&self) -> usize {
        self.inner.len()
    }

    fn __repr__(&self) -> String {
        format!(
            "LevelingSurvey(benchmarks={}, epochs={})",
            self.inner.len(),
            self.inner.first().map_or(0, |s| s.len())
        )
    }
}

/// Python wrapper for InsarCube
#[pyclass(name = "InsarCube")]
struct PyInsarCube {
    inner: InsarCube,
}

#[pymethods]
impl PyInsarCube {
    /// `to_mm` converts `displacement` to millimeters
    #[new]
    #[pyo3(signature = (day0, offsets, lon, lat, displacement, to_mm=1.0))]
    fn new(
        day0: &str,
        offsets: PyReadonlyArray1<f64>,
        lon: PyReadonlyArray2<f64>,
        lat: PyReadonlyArray2<f64>,
        displacement: PyReadonlyArray3<f64>,
        to_mm: f64,
    ) -> PyResult<Self> {
        if !to_mm.is_finite() || to_mm == 0.0 {
            return Err(PyValueError::new_err(format!("Invalid unit factor {}", to_mm)));
        }
        let offsets = offsets.as_array().to_vec();
        let cube = InsarCube::from_day_offsets(
            parse_date(day0)?,
            &offsets,
            lon.as_array().to_owned(),
            lat.as_array().to_owned(),
            displacement.as_array().mapv(|v| v * to_mm),
        )
        .map_err(to_py_err)?;
        Ok(PyInsarCube { inner: cube })
    }

    /// Open a cube and its coordinate rasters with GDAL
    #[staticmethod]
    #[pyo3(signature = (cube_file, lon_file, lat_file, config_file=None))]
    fn open(
        cube_file: String,
        lon_file: String,
        lat_file: String,
        config_file: Option<String>,
    ) -> PyResult<Self> {
        let config = load_config(config_file)?;
        let cube = InsarCubeReader::read(cube_file, lon_file, lat_file, &config.cube)
            .map_err(to_py_err)?;
        Ok(PyInsarCube { inner: cube })
    }

    #[getter]
    fn epochs(&self) -> Vec<String> {
        self.inner.epochs().iter().map(|e| e.to_string()).collect()
    }

    #[getter]
    fn shape(&self) -> (usize, usize, usize) {
        let (rows, cols) = self.inner.shape();
        (self.inner.n_epochs(), rows, cols)
    }

    /// Frames for the selected epochs; `None` marks a frame that cannot be computed
    #[pyo3(signature = (indices, incremental=false))]
    fn select<'py>(
        &self,
        py: Python<'py>,
        indices: Vec<usize>,
        incremental: bool,
    ) -> PyResult<Vec<Option<&'py PyArray2<f64>>>> {
        let mode = if incremental {
            SelectionMode::Incremental
        } else {
            SelectionMode::Cumulative
        };
        let frames = self.inner.select(&indices, mode).map_err(to_py_err)?;
        Ok(frames
            .into_iter()
            .map(|frame| match frame.data {
                FrameData::Computed(grid) => Some(grid.into_pyarray(py)),
                FrameData::NotComputable => None,
            })
            .collect())
    }

    fn __repr__(&self) -> String {
        let (rows, cols) = self.inner.shape();
        format!(
            "InsarCube(epochs={}, rows={}, cols={})",
            self.inner.n_epochs(),
            rows,
            cols
        )
    }
}

/// Python wrapper for ComparisonReport
#[pyclass(name = "ComparisonReport")]
struct PyComparisonReport {
    inner: ComparisonReport,
}

#[pymethods]
impl PyComparisonReport {
    #[getter]
    fn misfit_mm(&self) -> Option<f64> {
        self.inner.misfit_mm
    }

    #[getter]
    fn r_squared(&self) -> Option<f64> {
        self.inner.r_squared
    }

    #[getter]
    fn reference_name(&self) -> String {
        self.inner.reference_name.clone()
    }

    #[getter]
    fn reference_insar_mm(&self) -> Option<f64> {
        self.inner.reference_insar_mm
    }

    #[getter]
    fn used(&self) -> usize {
        self.inner.used()
    }

    #[getter]
    fn total_benchmarks(&self) -> usize {
        self.inner.total_benchmarks
    }

    #[getter]
    fn names(&self) -> Vec<String> {
        self.inner.samples.iter().map(|s| s.name.clone()).collect()
    }

    #[getter]
    fn leveling_mm<'py>(&self, py: Python<'py>) -> &'py PyArray1<f64> {
        self.inner.leveling_values().into_pyarray(py)
    }

    #[getter]
    fn insar_mm<'py>(&self, py: Python<'py>) -> &'py PyArray1<f64> {
        self.inner.insar_values().into_pyarray(py)
    }

    fn summary(&self) -> String {
        ReportWriter::format_summary(&self.inner)
    }

    fn write_table(&self, path: String) -> PyResult<()> {
        ReportWriter::write_table(&self.inner, path).map_err(to_py_err)
    }

    fn write_json(&self, path: String) -> PyResult<()> {
        ReportWriter::write_json(&self.inner, path).map_err(to_py_err)
    }

    fn __str__(&self) -> String {
        self.summary()
    }
}
