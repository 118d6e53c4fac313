use crate::core::cube::{CubeParams, InsarCube};
use crate::types::{CoordinateGrid, DisplacementStack, LevsarError, LevsarResult};
use gdal::{Dataset, Metadata};
use ndarray::{Array2, Array3, Axis};
use std::path::Path;

/// Reader for time-series displacement grids (NetCDF / GMT grd via GDAL)
pub struct InsarCubeReader;

impl InsarCubeReader {
    /// Read a displacement cube with its longitude and latitude rasters.
    ///
    /// Each band of `cube_path` is one epoch. Time offsets (days since
    /// `params.day0`) come from the `NETCDF_DIM_<time_dimension>_VALUES`
    /// metadata item.
    pub fn read<P: AsRef<Path>>(
        cube_path: P,
        lon_path: P,
        lat_path: P,
        params: &CubeParams,
    ) -> LevsarResult<InsarCube> {
        log::info!("Reading TS grid file: {}", cube_path.as_ref().display());
        let dataset = Dataset::open(cube_path.as_ref())?;

        let key = format!("NETCDF_DIM_{}_VALUES", params.time_dimension);
        let offsets = match dataset.metadata_item(&key, "") {
            Some(values) => parse_dimension_values(&values)?,
            None => {
                return Err(LevsarError::Ingestion(format!(
                    "{} has no '{}' metadata item",
                    cube_path.as_ref().display(),
                    key
                )))
            }
        };
        log::debug!("Time offsets: {:?}", offsets);

        let displacement = Self::read_stack(&dataset, params.to_mm)?;
        log::debug!("Displacement cube shape: {:?}", displacement.dim());

        let lon = Self::read_grid(lon_path)?;
        let lat = Self::read_grid(lat_path)?;
        log::debug!("Coordinate raster shape: {:?}", lon.dim());

        InsarCube::from_day_offsets(params.day0, &offsets, lon, lat, displacement)
    }

    /// Read the first band of a raster as a 2D grid (no-data -> NaN)
    pub fn read_grid<P: AsRef<Path>>(path: P) -> LevsarResult<CoordinateGrid> {
        log::debug!("Reading grid: {}", path.as_ref().display());
        let dataset = Dataset::open(path.as_ref())?;
        Self::read_band(&dataset, 1, 1.0)
    }

    fn read_stack(dataset: &Dataset, scale: f64) -> LevsarResult<DisplacementStack> {
        let (width, height) = dataset.raster_size();
        let band_count = dataset.raster_count();
        if band_count < 1 {
            return Err(LevsarError::Ingestion(
                "Displacement cube has no bands".to_string(),
            ));
        }

        let mut stack = Array3::from_elem((band_count as usize, height, width), f64::NAN);
        for (i, mut slice) in stack.axis_iter_mut(Axis(0)).enumerate() {
            let band = Self::read_band(dataset, i as isize + 1, scale)?;
            slice.assign(&band);
        }
        Ok(stack)
    }

    fn read_band(dataset: &Dataset, index: isize, scale: f64) -> LevsarResult<Array2<f64>> {
        let (width, height) = dataset.raster_size();
        let band = dataset.rasterband(index)?;
        let no_data = band.no_data_value();
        let buffer = band.read_as::<f64>((0, 0), (width, height), (width, height), None)?;

        let values = scale_values(buffer.data, no_data, scale);
        Array2::from_shape_vec((height, width), values).map_err(|e| {
            LevsarError::ShapeMismatch(format!("Failed to reshape band {}: {}", index, e))
        })
    }
}

/// Convert raw band values to millimeters; no-data cells become NaN
fn scale_values(values: Vec<f64>, no_data: Option<f64>, to_mm: f64) -> Vec<f64> {
    values
        .into_iter()
        .map(|v| match no_data {
            Some(nd) if v == nd => f64::NAN,
            _ => v * to_mm,
        })
        .collect()
}

/// Parse a GDAL NetCDF dimension list such as `{0,12,24}`
pub fn parse_dimension_values(values: &str) -> LevsarResult<Vec<f64>> {
    values
        .trim()
        .trim_start_matches('{')
        .trim_end_matches('}')
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<f64>().map_err(|_| {
                LevsarError::Ingestion(format!("Invalid time offset '{}' in '{}'", s, values))
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_dimension_values() {
        assert_eq!(
            parse_dimension_values("{0,12, 36.5}").unwrap(),
            vec![0.0, 12.0, 36.5]
        );
        assert!(parse_dimension_values("{}").unwrap().is_empty());
        assert!(parse_dimension_values("{0,x}").is_err());
    }

    #[test]
    fn test_band_values_scaled_to_mm() {
        let scaled = scale_values(vec![0.012, -9999.0, -0.004], Some(-9999.0), 1000.0);
        assert!((scaled[0] - 12.0).abs() < 1e-9);
        assert!(scaled[1].is_nan());
        assert!((scaled[2] + 4.0).abs() < 1e-9);
        assert_eq!(scale_values(vec![2.5], None, 1.0), vec![2.5]);
    }
}
