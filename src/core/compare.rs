use crate::core::coregister::{MatchParams, NearestPixelMatcher, PixelMatch, SpatialMatcher};
use crate::core::cube::{InsarCube, InsarField};
use crate::core::stats::{mean_abs_deviation, nan_mean, r_squared};
use crate::types::{DisplacementSeries, LevsarError, LevsarResult};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Start/end indices into a time axis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpochPair {
    pub start: usize,
    pub end: usize,
}

impl EpochPair {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }
}

/// One benchmark seen by both techniques
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PairedSample {
    pub name: String,
    pub lon: f64,
    pub lat: f64,
    pub leveling_mm: f64,
    pub insar_mm: f64,
}

/// Outcome of one leveling vs InSAR comparison
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonReport {
    pub leveling_epochs: (NaiveDate, NaiveDate),
    pub insar_epochs: (NaiveDate, NaiveDate),
    pub reference_name: String,
    /// InSAR value subtracted from every pixel; `None` invalidates the run
    pub reference_insar_mm: Option<f64>,
    pub samples: Vec<PairedSample>,
    /// Mean |leveling - InSAR| in mm
    pub misfit_mm: Option<f64>,
    pub r_squared: Option<f64>,
    pub total_benchmarks: usize,
    pub unmatched: usize,
    pub missing_data: usize,
}

impl ComparisonReport {
    pub fn used(&self) -> usize {
        self.samples.len()
    }

    pub fn is_valid(&self) -> bool {
        self.reference_insar_mm.is_some()
    }

    pub fn leveling_values(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.leveling_mm).collect()
    }

    pub fn insar_values(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.insar_mm).collect()
    }
}

/// One-to-one comparison of leveling and InSAR displacements at benchmarks
pub struct OneToOneComparator<M: SpatialMatcher> {
    matcher: M,
}

impl OneToOneComparator<NearestPixelMatcher> {
    pub fn with_params(params: MatchParams) -> Self {
        Self::new(NearestPixelMatcher::with_params(params))
    }
}

impl<M: SpatialMatcher> OneToOneComparator<M> {
    pub fn new(matcher: M) -> Self {
        Self { matcher }
    }

    /// Compare leveling over `epochs` with a single-interval InSAR field.
    ///
    /// The first series is the survey datum. InSAR values are referenced to
    /// the mean of that benchmark's neighborhood, since the leveling is already
    /// referenced to it.
    pub fn compare(
        &self,
        leveling: &[DisplacementSeries],
        field: &InsarField,
        epochs: EpochPair,
    ) -> LevsarResult<ComparisonReport> {
        let datum = leveling.first().ok_or_else(|| {
            LevsarError::Processing("No leveling benchmarks to compare".to_string())
        })?;
        let leveling_epochs = datum.epoch_pair(epochs.start, epochs.end)?;
        log::info!(
            "Comparing leveling {} to {} with InSAR {} to {}",
            leveling_epochs.0,
            leveling_epochs.1,
            field.start,
            field.end
        );

        let lons: Vec<f64> = leveling.iter().map(|s| s.location.lon).collect();
        let lats: Vec<f64> = leveling.iter().map(|s| s.location.lat).collect();
        let matches = self.matcher.match_benchmarks(field, &lons, &lats)?;
        if matches.len() != leveling.len() {
            return Err(LevsarError::Processing(format!(
                "Matcher returned {} results for {} benchmarks",
                matches.len(),
                leveling.len()
            )));
        }
        let unmatched = matches.iter().filter(|m| m.is_none()).count();

        let mut report = ComparisonReport {
            leveling_epochs,
            insar_epochs: (field.start, field.end),
            reference_name: datum.name.clone(),
            reference_insar_mm: None,
            samples: Vec::new(),
            misfit_mm: None,
            r_squared: None,
            total_benchmarks: leveling.len(),
            unmatched,
            missing_data: 0,
        };

        let reference = match matches[0].as_ref().and_then(|m| neighborhood_mean(field, m)) {
            Some(value) => value,
            None => {
                log::warn!(
                    "Reference benchmark {} has no InSAR data; comparison is invalid",
                    datum.name
                );
                return Ok(report);
            }
        };
        report.reference_insar_mm = Some(reference);
        log::debug!("InSAR reference near {}: {:.3} mm", datum.name, reference);

        for (series, pixel) in leveling.iter().zip(&matches) {
            let pixel = match pixel {
                Some(p) => p,
                None => continue,
            };

            let leveling_mm = series.between(epochs.start, epochs.end)?.map(|m| 1000.0 * m);
            let insar_mm = neighborhood_mean(field, pixel).map(|v| v - reference);

            match (leveling_mm, insar_mm) {
                (Some(lev), Some(insar)) if lev.is_finite() && insar.is_finite() => {
                    report.samples.push(PairedSample {
                        name: series.name.clone(),
                        lon: series.location.lon,
                        lat: series.location.lat,
                        leveling_mm: lev,
                        insar_mm: insar,
                    });
                }
                _ => report.missing_data += 1,
            }
        }

        let lev = report.leveling_values();
        let insar = report.insar_values();
        report.misfit_mm = mean_abs_deviation(&lev, &insar);
        report.r_squared = r_squared(&lev, &insar);

        match (report.misfit_mm, report.r_squared) {
            (Some(misfit), Some(r2)) => log::info!(
                "Avg misfit = {:.2} mm, Rsq = {:.2} ({} of {} benchmarks)",
                misfit,
                r2,
                report.used(),
                report.total_benchmarks
            ),
            _ => log::warn!(
                "Statistics undefined with {} of {} benchmarks usable",
                report.used(),
                report.total_benchmarks
            ),
        }

        Ok(report)
    }

    /// Compare against the interval between two cube epochs
    pub fn compare_cube(
        &self,
        leveling: &[DisplacementSeries],
        cube: &InsarCube,
        leveling_epochs: EpochPair,
        insar_epochs: EpochPair,
    ) -> LevsarResult<ComparisonReport> {
        let field = cube.displacement_between(insar_epochs.start, insar_epochs.end)?;
        self.compare(leveling, &field, leveling_epochs)
    }
}

fn neighborhood_mean(field: &InsarField, pixel: &PixelMatch) -> Option<f64> {
    nan_mean(pixel.neighborhood.iter().filter_map(|&i| field.los.get(i).copied()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::GeoPoint;

    fn ymd(y: i32, m: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, 1).unwrap()
    }

    fn series(name: &str, lon: f64, lat: f64, values: [Option<f64>; 2]) -> DisplacementSeries {
        DisplacementSeries {
            name: name.to_string(),
            location: GeoPoint::new(lon, lat),
            epochs: vec![ymd(2010, 11), ymd(2011, 11)],
            displacements: values.to_vec(),
            reference: GeoPoint::new(-115.55, 33.0),
        }
    }

    #[test]
    fn test_unmatched_reference_invalidates_run() {
        let field = InsarField::new(
            vec![-115.50],
            vec![33.0],
            vec![4.0],
            ymd(2010, 11),
            ymd(2011, 11),
        )
        .unwrap();
        let leveling = vec![
            series("DATUM", -115.55, 33.0, [Some(0.0), Some(0.0)]),
            series("A", -115.50, 33.0, [Some(0.0), Some(0.01)]),
        ];

        let comparator = OneToOneComparator::with_params(MatchParams::default());
        let report = comparator
            .compare(&leveling, &field, EpochPair::new(0, 1))
            .unwrap();

        assert!(!report.is_valid());
        assert!(report.samples.is_empty());
        assert_eq!(report.misfit_mm, None);
        assert_eq!(report.r_squared, None);
        assert_eq!(report.unmatched, 1);
    }

    #[test]
    fn test_single_sample_has_no_statistics() {
        let field = InsarField::new(
            vec![-115.55, -115.50],
            vec![33.0, 33.0],
            vec![1.0, 5.0],
            ymd(2010, 11),
            ymd(2011, 11),
        )
        .unwrap();
        let leveling = vec![
            series("DATUM", -115.55, 33.0, [Some(0.0), None]),
            series("A", -115.50, 33.0, [Some(0.0), Some(0.004)]),
        ];

        let comparator = OneToOneComparator::new(NearestPixelMatcher::new());
        let report = comparator
            .compare(&leveling, &field, EpochPair::new(0, 1))
            .unwrap();

        assert!(report.is_valid());
        assert_eq!(report.used(), 1);
        assert_eq!(report.missing_data, 1);
        assert!((report.samples[0].insar_mm - 4.0).abs() < 1e-12);
        assert!((report.samples[0].leveling_mm - 4.0).abs() < 1e-9);
        assert_eq!(report.misfit_mm, None);
        assert_eq!(report.r_squared, None);
    }

    #[test]
    fn test_empty_leveling_is_an_error() {
        let field =
            InsarField::new(vec![], vec![], vec![], ymd(2010, 11), ymd(2011, 11)).unwrap();
        let comparator = OneToOneComparator::new(NearestPixelMatcher::new());
        assert!(comparator.compare(&[], &field, EpochPair::new(0, 1)).is_err());
    }
}
