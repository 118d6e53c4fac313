use crate::types::{
    CoordinateGrid, DisplacementGrid, DisplacementStack, LevsarError, LevsarResult,
};
use chrono::{Days, NaiveDate};
use ndarray::Axis;
use serde::{Deserialize, Serialize};

/// InSAR cube extraction parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CubeParams {
    /// Date that time offset zero refers to
    pub day0: NaiveDate,
    /// Name of the time dimension in the gridded file
    pub time_dimension: String,
    /// Factor converting cube values to millimeters
    pub to_mm: f64,
}

impl Default for CubeParams {
    fn default() -> Self {
        Self {
            day0: NaiveDate::from_ymd_opt(2009, 4, 24).unwrap_or_default(),
            time_dimension: "t".to_string(),
            to_mm: 1.0,
        }
    }
}

/// How selected cube epochs are turned into frames
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SelectionMode {
    /// Displacement since the cube's first epoch
    Cumulative,
    /// Displacement since the previous selected epoch
    Incremental,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FrameData {
    Computed(DisplacementGrid),
    /// First incremental frame: there is no earlier selected epoch
    NotComputable,
}

/// One selected epoch of a cube
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub index: usize,
    pub epoch: NaiveDate,
    pub data: FrameData,
}

impl Frame {
    pub fn is_computable(&self) -> bool {
        matches!(self.data, FrameData::Computed(_))
    }

    pub fn grid(&self) -> Option<&DisplacementGrid> {
        match &self.data {
            FrameData::Computed(grid) => Some(grid),
            FrameData::NotComputable => None,
        }
    }
}

/// Time series displacement cube on a geocoded pixel grid
#[derive(Debug, Clone)]
pub struct InsarCube {
    epochs: Vec<NaiveDate>,
    lon: CoordinateGrid,
    lat: CoordinateGrid,
    displacement: DisplacementStack,
}

impl InsarCube {
    /// Build a cube, checking the time axis and the coordinate raster shapes.
    /// Displacement values are in millimeters.
    pub fn new(
        epochs: Vec<NaiveDate>,
        lon: CoordinateGrid,
        lat: CoordinateGrid,
        displacement: DisplacementStack,
    ) -> LevsarResult<Self> {
        let (n_time, rows, cols) = displacement.dim();

        if n_time != epochs.len() {
            return Err(LevsarError::ShapeMismatch(format!(
                "Cube has {} time slices but {} epochs",
                n_time,
                epochs.len()
            )));
        }
        if lon.dim() != lat.dim() {
            return Err(LevsarError::ShapeMismatch(format!(
                "Longitude raster is {:?} but latitude raster is {:?}",
                lon.dim(),
                lat.dim()
            )));
        }
        if lon.dim() != (rows, cols) {
            return Err(LevsarError::ShapeMismatch(format!(
                "Coordinate rasters are {:?} but displacement slices are {:?}",
                lon.dim(),
                (rows, cols)
            )));
        }

        log::debug!("InSAR cube: {} epochs of {} x {} pixels", n_time, rows, cols);
        Ok(Self {
            epochs,
            lon,
            lat,
            displacement,
        })
    }

    /// Build a cube whose time axis is given in days since `day0`
    pub fn from_day_offsets(
        day0: NaiveDate,
        offsets: &[f64],
        lon: CoordinateGrid,
        lat: CoordinateGrid,
        displacement: DisplacementStack,
    ) -> LevsarResult<Self> {
        log::debug!("Day0 of this time series is {}", day0);
        let epochs = offsets
            .iter()
            .map(|&offset| epoch_from_offset(day0, offset))
            .collect::<LevsarResult<Vec<_>>>()?;
        Self::new(epochs, lon, lat, displacement)
    }

    pub fn epochs(&self) -> &[NaiveDate] {
        &self.epochs
    }

    pub fn lon(&self) -> &CoordinateGrid {
        &self.lon
    }

    pub fn lat(&self) -> &CoordinateGrid {
        &self.lat
    }

    pub fn displacement(&self) -> &DisplacementStack {
        &self.displacement
    }

    pub fn n_epochs(&self) -> usize {
        self.epochs.len()
    }

    /// Spatial shape (rows, cols)
    pub fn shape(&self) -> (usize, usize) {
        self.lon.dim()
    }

    /// Frames for the selected epochs.
    ///
    /// Cumulative frames are relative to the cube's first epoch. Incremental
    /// frames are relative to the previous selected epoch, so the first one is
    /// [`FrameData::NotComputable`].
    pub fn select(&self, selected: &[usize], mode: SelectionMode) -> LevsarResult<Vec<Frame>> {
        self.check_selection(selected)?;

        let frames = selected
            .iter()
            .enumerate()
            .map(|(n, &k)| {
                let base = match mode {
                    SelectionMode::Cumulative => Some(0),
                    SelectionMode::Incremental if n == 0 => None,
                    SelectionMode::Incremental => Some(selected[n - 1]),
                };
                let data = match base {
                    Some(b) => FrameData::Computed(self.difference(b, k)),
                    None => FrameData::NotComputable,
                };
                Frame {
                    index: k,
                    epoch: self.epochs[k],
                    data,
                }
            })
            .collect();

        Ok(frames)
    }

    /// Displacement from epoch `start` to epoch `end` as a flat point field
    pub fn displacement_between(&self, start: usize, end: usize) -> LevsarResult<InsarField> {
        for idx in [start, end] {
            if idx >= self.n_epochs() {
                return Err(LevsarError::Processing(format!(
                    "Cube epoch {} out of range ({} epochs)",
                    idx,
                    self.n_epochs()
                )));
            }
        }

        let diff = self.difference(start, end);
        InsarField::new(
            self.lon.iter().copied().collect(),
            self.lat.iter().copied().collect(),
            diff.iter().copied().collect(),
            self.epochs[start],
            self.epochs[end],
        )
    }

    fn difference(&self, start: usize, end: usize) -> DisplacementGrid {
        &self.displacement.index_axis(Axis(0), end) - &self.displacement.index_axis(Axis(0), start)
    }

    fn check_selection(&self, selected: &[usize]) -> LevsarResult<()> {
        if let Some(&bad) = selected.iter().find(|&&k| k >= self.n_epochs()) {
            return Err(LevsarError::Processing(format!(
                "Selected epoch {} out of range ({} epochs)",
                bad,
                self.n_epochs()
            )));
        }
        if selected.windows(2).any(|w| w[1] <= w[0]) {
            return Err(LevsarError::Processing(format!(
                "Selected epochs must be strictly increasing: {:?}",
                selected
            )));
        }
        Ok(())
    }
}

/// Calendar date of a time offset; fractional days are truncated toward zero
pub fn epoch_from_offset(day0: NaiveDate, offset: f64) -> LevsarResult<NaiveDate> {
    if !offset.is_finite() {
        return Err(LevsarError::Ingestion(format!(
            "Invalid time offset {}",
            offset
        )));
    }
    let days = offset.trunc();
    let shifted = if days >= 0.0 {
        day0.checked_add_days(Days::new(days as u64))
    } else {
        day0.checked_sub_days(Days::new((-days) as u64))
    };
    shifted.ok_or_else(|| {
        LevsarError::Ingestion(format!("Time offset {} days overflows the calendar", offset))
    })
}

/// Single-interval InSAR displacement at scattered points
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InsarField {
    pub lon: Vec<f64>,
    pub lat: Vec<f64>,
    /// Line-of-sight displacement in mm
    pub los: Vec<f64>,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl InsarField {
    pub fn new(
        lon: Vec<f64>,
        lat: Vec<f64>,
        los: Vec<f64>,
        start: NaiveDate,
        end: NaiveDate,
    ) -> LevsarResult<Self> {
        if lon.len() != lat.len() || lon.len() != los.len() {
            return Err(LevsarError::ShapeMismatch(format!(
                "Field has {} longitudes, {} latitudes and {} values",
                lon.len(),
                lat.len(),
                los.len()
            )));
        }
        Ok(Self {
            lon,
            lat,
            los,
            start,
            end,
        })
    }

    pub fn len(&self) -> usize {
        self.los.len()
    }

    pub fn is_empty(&self) -> bool {
        self.los.is_empty()
    }

    /// Drop points with a non-finite value or coordinate
    pub fn remove_nans(&self) -> InsarField {
        let keep: Vec<usize> = (0..self.len())
            .filter(|&i| self.los[i].is_finite() && self.lon[i].is_finite() && self.lat[i].is_finite())
            .collect();
        log::debug!("Keeping {} of {} InSAR points", keep.len(), self.len());

        InsarField {
            lon: keep.iter().map(|&i| self.lon[i]).collect(),
            lat: keep.iter().map(|&i| self.lat[i]).collect(),
            los: keep.iter().map(|&i| self.los[i]).collect(),
            start: self.start,
            end: self.end,
        }
    }

    /// Negate every value (toward-satellite <-> away-from-satellite)
    pub fn flip_los_sign(&self) -> InsarField {
        InsarField {
            los: self.los.iter().map(|v| -v).collect(),
            ..self.clone()
        }
    }

    /// Subtract the least-squares plane `a*lon + b*lat + c`
    pub fn remove_ramp(&self) -> LevsarResult<InsarField> {
        let finite: Vec<usize> = (0..self.len())
            .filter(|&i| self.los[i].is_finite() && self.lon[i].is_finite() && self.lat[i].is_finite())
            .collect();
        if finite.len() < 3 {
            return Err(LevsarError::Processing(format!(
                "Ramp removal needs at least 3 finite points, found {}",
                finite.len()
            )));
        }

        // Centered coordinates keep the normal equations well conditioned
        let n = finite.len() as f64;
        let lon0 = finite.iter().map(|&i| self.lon[i]).sum::<f64>() / n;
        let lat0 = finite.iter().map(|&i| self.lat[i]).sum::<f64>() / n;

        let mut ata = [[0.0f64; 3]; 3];
        let mut aty = [0.0f64; 3];
        for &i in &finite {
            let row = [self.lon[i] - lon0, self.lat[i] - lat0, 1.0];
            for r in 0..3 {
                for c in 0..3 {
                    ata[r][c] += row[r] * row[c];
                }
                aty[r] += row[r] * self.los[i];
            }
        }

        let [a, b, c] = solve3(ata, aty).ok_or_else(|| {
            LevsarError::Processing("Ramp fit is singular (collinear points)".to_string())
        })?;
        log::debug!("Removing ramp: {:.4} * lon + {:.4} * lat + {:.4}", a, b, c);

        let los = (0..self.len())
            .map(|i| self.los[i] - (a * (self.lon[i] - lon0) + b * (self.lat[i] - lat0) + c))
            .collect();
        Ok(InsarField {
            los,
            ..self.clone()
        })
    }
}

/// Gaussian elimination with partial pivoting
fn solve3(mut m: [[f64; 3]; 3], mut v: [f64; 3]) -> Option<[f64; 3]> {
    let scale = m
        .iter()
        .flat_map(|row| row.iter())
        .fold(0.0f64, |acc, x| acc.max(x.abs()));
    if scale == 0.0 {
        return None;
    }

    for col in 0..3 {
        let pivot = (col..3).max_by(|&a, &b| m[a][col].abs().total_cmp(&m[b][col].abs()))?;
        if m[pivot][col].abs() < 1e-12 * scale {
            return None;
        }
        m.swap(col, pivot);
        v.swap(col, pivot);

        for row in col + 1..3 {
            let factor = m[row][col] / m[col][col];
            for k in col..3 {
                m[row][k] -= factor * m[col][k];
            }
            v[row] -= factor * v[col];
        }
    }

    let mut x = [0.0f64; 3];
    for row in (0..3).rev() {
        let tail: f64 = (row + 1..3).map(|k| m[row][k] * x[k]).sum();
        x[row] = (v[row] - tail) / m[row][row];
    }
    Some(x)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array2, Array3};

    fn small_cube() -> InsarCube {
        let lon = Array2::from_shape_fn((2, 3), |(_, c)| -115.6 + 0.01 * c as f64);
        let lat = Array2::from_shape_fn((2, 3), |(r, _)| 33.0 + 0.01 * r as f64);
        let ts = Array3::from_shape_fn((3, 2, 3), |(t, r, c)| (t * 10 + r + c) as f64);
        InsarCube::from_day_offsets(
            NaiveDate::from_ymd_opt(2009, 4, 24).unwrap(),
            &[0.0, 12.0, 36.9],
            lon,
            lat,
            ts,
        )
        .unwrap()
    }

    #[test]
    fn test_epochs_from_offsets() {
        let cube = small_cube();
        assert_eq!(cube.epochs()[1], NaiveDate::from_ymd_opt(2009, 5, 6).unwrap());
        assert_eq!(cube.epochs()[2], NaiveDate::from_ymd_opt(2009, 5, 30).unwrap());
    }

    #[test]
    fn test_negative_offset() {
        let day0 = NaiveDate::from_ymd_opt(2009, 4, 24).unwrap();
        assert_eq!(
            epoch_from_offset(day0, -1.5).unwrap(),
            NaiveDate::from_ymd_opt(2009, 4, 23).unwrap()
        );
        assert!(epoch_from_offset(day0, f64::NAN).is_err());
    }

    #[test]
    fn test_shape_mismatch() {
        let lon = Array2::zeros((2, 3));
        let lat = Array2::zeros((3, 2));
        let ts = Array3::zeros((1, 2, 3));
        let day0 = NaiveDate::from_ymd_opt(2009, 4, 24).unwrap();
        let result = InsarCube::from_day_offsets(day0, &[0.0], lon, lat, ts);
        assert!(matches!(result, Err(LevsarError::ShapeMismatch(_))));

        let result = InsarCube::from_day_offsets(
            day0,
            &[0.0, 1.0],
            Array2::zeros((2, 3)),
            Array2::zeros((2, 3)),
            Array3::zeros((1, 2, 3)),
        );
        assert!(matches!(result, Err(LevsarError::ShapeMismatch(_))));
    }

    #[test]
    fn test_incremental_selection() {
        let cube = small_cube();
        let frames = cube.select(&[0, 2], SelectionMode::Incremental).unwrap();
        assert!(!frames[0].is_computable());
        assert!(frames[0].grid().is_none());
        let grid = frames[1].grid().unwrap();
        assert!(grid.iter().all(|&v| v == 20.0));
    }

    #[test]
    fn test_cumulative_selection() {
        let cube = small_cube();
        let frames = cube.select(&[0, 1], SelectionMode::Cumulative).unwrap();
        assert!(frames[0].grid().unwrap().iter().all(|&v| v == 0.0));
        assert!(frames[1].grid().unwrap().iter().all(|&v| v == 10.0));
    }

    #[test]
    fn test_bad_selection() {
        let cube = small_cube();
        assert!(cube.select(&[1, 1], SelectionMode::Cumulative).is_err());
        assert!(cube.select(&[0, 3], SelectionMode::Cumulative).is_err());
    }

    #[test]
    fn test_field_from_cube() {
        let cube = small_cube();
        let field = cube.displacement_between(1, 2).unwrap();
        assert_eq!(field.len(), 6);
        assert!(field.los.iter().all(|&v| v == 10.0));
        assert_eq!(field.lon[1], cube.lon()[[0, 1]]);
        assert_eq!(field.lat[3], cube.lat()[[1, 0]]);
    }

    #[test]
    fn test_remove_nans_and_flip() {
        let d = NaiveDate::from_ymd_opt(2010, 1, 1).unwrap();
        let field = InsarField::new(
            vec![0.0, 1.0, f64::NAN],
            vec![0.0, 1.0, 2.0],
            vec![1.0, f64::NAN, 3.0],
            d,
            d,
        )
        .unwrap();
        let clean = field.remove_nans();
        assert_eq!(clean.len(), 1);
        assert_eq!(clean.flip_los_sign().los, vec![-1.0]);
    }

    #[test]
    fn test_remove_ramp() {
        let d = NaiveDate::from_ymd_opt(2010, 1, 1).unwrap();
        let mut lon = Vec::new();
        let mut lat = Vec::new();
        let mut los = Vec::new();
        for i in 0..5 {
            for j in 0..4 {
                let x = -115.6 + 0.01 * i as f64;
                let y = 33.0 + 0.01 * j as f64;
                lon.push(x);
                lat.push(y);
                los.push(300.0 * x - 120.0 * y + 7.0);
            }
        }
        let field = InsarField::new(lon, lat, los, d, d).unwrap();
        let flat = field.remove_ramp().unwrap();
        assert!(flat.los.iter().all(|v| v.abs() < 1e-6));
    }

    #[test]
    fn test_remove_ramp_needs_points() {
        let d = NaiveDate::from_ymd_opt(2010, 1, 1).unwrap();
        let field = InsarField::new(vec![0.0, 1.0], vec![0.0, 1.0], vec![1.0, 2.0], d, d).unwrap();
        assert!(field.remove_ramp().is_err());
    }
}
