use crate::core::cube::InsarField;
use crate::core::stats::haversine_m;
use crate::types::{LevsarError, LevsarResult};
use serde::{Deserialize, Serialize};

const METERS_PER_DEGREE: f64 = 111_195.0;

/// Co-registration parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchParams {
    /// Largest benchmark-to-pixel distance accepted as a match (meters)
    pub tolerance_m: f64,
    /// Radius of the averaging neighborhood around a benchmark (meters)
    pub neighborhood_m: f64,
}

impl Default for MatchParams {
    fn default() -> Self {
        Self {
            tolerance_m: 200.0,
            neighborhood_m: 100.0,
        }
    }
}

/// Pixels of a field matched to one benchmark
#[derive(Debug, Clone, PartialEq)]
pub struct PixelMatch {
    /// Nearest pixel
    pub index: usize,
    pub distance_m: f64,
    /// Pixels averaged for this benchmark, ascending, always holding `index`
    pub neighborhood: Vec<usize>,
}

/// Maps benchmark coordinates onto InSAR pixels.
///
/// A benchmark with no pixel within tolerance yields `None`.
pub trait SpatialMatcher {
    fn match_benchmarks(
        &self,
        field: &InsarField,
        lons: &[f64],
        lats: &[f64],
    ) -> LevsarResult<Vec<Option<PixelMatch>>>;
}

/// Nearest finite pixel by great-circle distance
pub struct NearestPixelMatcher {
    params: MatchParams,
}

impl NearestPixelMatcher {
    pub fn new() -> Self {
        Self {
            params: MatchParams::default(),
        }
    }

    pub fn with_params(params: MatchParams) -> Self {
        Self { params }
    }

    fn match_one(&self, field: &InsarField, lon: f64, lat: f64) -> Option<PixelMatch> {
        if !lon.is_finite() || !lat.is_finite() {
            return None;
        }

        let radius = self.params.tolerance_m.max(self.params.neighborhood_m);
        let dlat = radius / METERS_PER_DEGREE;
        let dlon = dlat / lat.to_radians().cos().abs().max(1e-6);

        let mut nearest: Option<(usize, f64)> = None;
        let mut neighborhood = Vec::new();

        for i in 0..field.len() {
            let (plon, plat) = (field.lon[i], field.lat[i]);
            if !field.los[i].is_finite() || !plon.is_finite() || !plat.is_finite() {
                continue;
            }
            // cheap box test before the trigonometry
            if (plat - lat).abs() > dlat || (plon - lon).abs() > dlon {
                continue;
            }

            let d = haversine_m(lon, lat, plon, plat);
            if d <= self.params.neighborhood_m {
                neighborhood.push(i);
            }
            if d <= self.params.tolerance_m && nearest.map_or(true, |(_, best)| d < best) {
                nearest = Some((i, d));
            }
        }

        let (index, distance_m) = nearest?;
        if !neighborhood.contains(&index) {
            neighborhood.push(index);
            neighborhood.sort_unstable();
        }

        Some(PixelMatch {
            index,
            distance_m,
            neighborhood,
        })
    }
}

impl Default for NearestPixelMatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl SpatialMatcher for NearestPixelMatcher {
    fn match_benchmarks(
        &self,
        field: &InsarField,
        lons: &[f64],
        lats: &[f64],
    ) -> LevsarResult<Vec<Option<PixelMatch>>> {
        if lons.len() != lats.len() {
            return Err(LevsarError::ShapeMismatch(format!(
                "{} benchmark longitudes but {} latitudes",
                lons.len(),
                lats.len()
            )));
        }

        log::debug!(
            "Matching {} benchmarks against {} InSAR pixels",
            lons.len(),
            field.len()
        );
        let matches: Vec<Option<PixelMatch>> = lons
            .iter()
            .zip(lats)
            .map(|(&lon, &lat)| self.match_one(field, lon, lat))
            .collect();

        let unmatched = matches.iter().filter(|m| m.is_none()).count();
        if unmatched > 0 {
            log::info!(
                "{} of {} benchmarks have no InSAR pixel within {} m",
                unmatched,
                matches.len(),
                self.params.tolerance_m
            );
        }
        Ok(matches)
    }
}
