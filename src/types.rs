use chrono::NaiveDate;
use ndarray::{Array2, Array3};
use serde::{Deserialize, Serialize};

/// Leveling elevation or displacement value in meters (`None` = missing)
pub type LevelValue = Option<f64>;

/// 2D displacement raster (row x col), NaN marks no data
pub type DisplacementGrid = Array2<f64>;

/// 3D displacement cube (epoch x row x col)
pub type DisplacementStack = Array3<f64>;

/// 2D coordinate raster in degrees
pub type CoordinateGrid = Array2<f64>;

/// Geographic location in degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lon: f64,
    pub lat: f64,
}

impl GeoPoint {
    pub fn new(lon: f64, lat: f64) -> Self {
        Self { lon, lat }
    }
}

impl std::fmt::Display for GeoPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.6}, {:.6})", self.lon, self.lat)
    }
}

/// Absolute leveling elevations for one benchmark
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkSeries {
    pub name: String,
    pub location: GeoPoint,
    pub epochs: Vec<NaiveDate>,
    pub elevations: Vec<LevelValue>,  // meters
    /// Location of the survey's datum benchmark
    pub reference: GeoPoint,
}

impl BenchmarkSeries {
    /// Build a series, checking that epochs and elevations line up
    pub fn new(
        name: impl Into<String>,
        location: GeoPoint,
        epochs: Vec<NaiveDate>,
        elevations: Vec<LevelValue>,
        reference: GeoPoint,
    ) -> LevsarResult<Self> {
        let name = name.into();
        if epochs.len() != elevations.len() {
            return Err(LevsarError::Ingestion(format!(
                "Benchmark {} has {} epochs but {} elevations",
                name,
                epochs.len(),
                elevations.len()
            )));
        }
        check_epoch_order(&name, &epochs)?;

        Ok(Self {
            name,
            location,
            epochs,
            elevations,
            reference,
        })
    }

    pub fn len(&self) -> usize {
        self.epochs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.epochs.is_empty()
    }

    /// Number of epochs carrying an elevation
    pub fn observed_count(&self) -> usize {
        self.elevations.iter().filter(|v| v.is_some()).count()
    }
}

/// Displacement since the reference epoch for one benchmark
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplacementSeries {
    pub name: String,
    pub location: GeoPoint,
    pub epochs: Vec<NaiveDate>,
    pub displacements: Vec<LevelValue>,  // meters
    pub reference: GeoPoint,
}

impl DisplacementSeries {
    pub fn len(&self) -> usize {
        self.epochs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.epochs.is_empty()
    }

    /// Displacement from epoch `i` to epoch `j` in meters
    pub fn between(&self, i: usize, j: usize) -> LevsarResult<LevelValue> {
        self.check_index(i)?;
        self.check_index(j)?;
        Ok(match (self.displacements[i], self.displacements[j]) {
            (Some(start), Some(end)) => Some(end - start),
            _ => None,
        })
    }

    /// Calendar dates of an epoch pair
    pub fn epoch_pair(&self, i: usize, j: usize) -> LevsarResult<(NaiveDate, NaiveDate)> {
        self.check_index(i)?;
        self.check_index(j)?;
        Ok((self.epochs[i], self.epochs[j]))
    }

    fn check_index(&self, idx: usize) -> LevsarResult<()> {
        if idx >= self.epochs.len() {
            return Err(LevsarError::Processing(format!(
                "Epoch index {} out of range for benchmark {} ({} epochs)",
                idx,
                self.name,
                self.epochs.len()
            )));
        }
        Ok(())
    }
}

/// Epochs must be strictly increasing
pub fn check_epoch_order(name: &str, epochs: &[NaiveDate]) -> LevsarResult<()> {
    for (i, pair) in epochs.windows(2).enumerate() {
        if pair[1] <= pair[0] {
            return Err(LevsarError::Ingestion(format!(
                "Epochs for {} are not strictly increasing at position {}: {} then {}",
                name,
                i + 1,
                pair[0],
                pair[1]
            )));
        }
    }
    Ok(())
}

/// Error types for leveling/InSAR reconciliation
#[derive(Debug, thiserror::Error)]
pub enum LevsarError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Ingestion error: {0}")]
    Ingestion(String),

    #[error("Shape mismatch: {0}")]
    ShapeMismatch(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Processing error: {0}")]
    Processing(String),

    #[error("GDAL error: {0}")]
    Gdal(#[from] gdal::errors::GdalError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for reconciliation operations
pub type LevsarResult<T> = Result<T, LevsarError>;
