use crate::types::{
    BenchmarkSeries, DisplacementSeries, LevelValue, LevsarError, LevsarResult,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Datum referencing parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatumParams {
    /// Reference epoch is the first observed epoch strictly after this date
    pub analysis_start: NaiveDate,
    /// Epochs strictly after this date carry the datum step
    pub datum_change: NaiveDate,
    /// Bootstrap survey left out of the output
    pub excluded_index: usize,
    /// Column surveyed against the old datum height
    pub pre_correction_index: usize,
    /// Same survey re-reduced against the new datum height
    pub post_correction_index: usize,
}

impl Default for DatumParams {
    fn default() -> Self {
        Self {
            analysis_start: NaiveDate::from_ymd_opt(2009, 1, 1).unwrap_or_default(),
            datum_change: NaiveDate::from_ymd_opt(2014, 1, 1).unwrap_or_default(),
            excluded_index: 0,
            pre_correction_index: 6,
            post_correction_index: 7,
        }
    }
}

/// Converts absolute elevations into displacement since a reference epoch
pub struct DatumReferencer {
    params: DatumParams,
}

impl DatumReferencer {
    pub fn new() -> Self {
        Self {
            params: DatumParams::default(),
        }
    }

    pub fn with_params(params: DatumParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &DatumParams {
        &self.params
    }

    /// Reference every series in a survey
    pub fn reference_all(&self, survey: &[BenchmarkSeries]) -> LevsarResult<Vec<DisplacementSeries>> {
        log::info!(
            "Referencing {} benchmarks to the first epoch after {}",
            survey.len(),
            self.params.analysis_start
        );
        let referenced = survey
            .iter()
            .map(|series| self.reference(series))
            .collect::<LevsarResult<Vec<_>>>()?;

        let degenerate = referenced
            .iter()
            .filter(|s| s.displacements.iter().all(|v| v.is_none()))
            .count();
        if degenerate > 0 {
            log::warn!(
                "{} of {} benchmarks have no usable reference epoch",
                degenerate,
                referenced.len()
            );
        }
        Ok(referenced)
    }

    /// Reference one series, carrying the datum step across the change date
    pub fn reference(&self, series: &BenchmarkSeries) -> LevsarResult<DisplacementSeries> {
        let p = &self.params;
        let n = series.len();
        for (idx, what) in [
            (p.excluded_index, "excluded"),
            (p.pre_correction_index, "pre-correction"),
            (p.post_correction_index, "post-correction"),
        ] {
            if idx >= n {
                return Err(LevsarError::Config(format!(
                    "{} index {} out of range for benchmark {} ({} epochs)",
                    what, idx, series.name, n
                )));
            }
        }

        let base = self.reference_elevation(series);
        if base.is_none() {
            log::debug!("Benchmark {} has no data after {}", series.name, p.analysis_start);
        }

        let step = match (
            series.elevations[p.pre_correction_index],
            series.elevations[p.post_correction_index],
        ) {
            (Some(before), Some(after)) => Some(before - after),
            _ => None,
        };

        let mut epochs = Vec::with_capacity(n);
        let mut displacements = Vec::with_capacity(n);
        for (j, (&epoch, &elevation)) in series.epochs.iter().zip(&series.elevations).enumerate() {
            if j == p.excluded_index || j == p.pre_correction_index {
                continue;
            }

            let relative = match (elevation, base) {
                (Some(e), Some(b)) => Some(e - b),
                _ => None,
            };
            let value: LevelValue = if epoch > p.datum_change {
                relative.zip(step).map(|(r, s)| r + s)
            } else {
                relative
            };

            epochs.push(epoch);
            displacements.push(value);
        }

        Ok(DisplacementSeries {
            name: series.name.clone(),
            location: series.location,
            epochs,
            displacements,
            reference: series.reference,
        })
    }

    /// Elevation at the first observed epoch after the analysis start
    fn reference_elevation(&self, series: &BenchmarkSeries) -> LevelValue {
        series
            .epochs
            .iter()
            .zip(&series.elevations)
            .find(|(epoch, elevation)| elevation.is_some() && **epoch > self.params.analysis_start)
            .and_then(|(_, elevation)| *elevation)
    }
}

impl Default for DatumReferencer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::GeoPoint;

    fn ymd(y: i32, m: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, 1).unwrap()
    }

    fn epochs() -> Vec<NaiveDate> {
        vec![
            ymd(2008, 11),
            ymd(2009, 11),
            ymd(2010, 11),
            ymd(2011, 11),
            ymd(2012, 11),
            ymd(2013, 11),
            ymd(2014, 11),
            ymd(2014, 12),
            ymd(2015, 11),
        ]
    }

    fn series(elevations: Vec<LevelValue>) -> BenchmarkSeries {
        BenchmarkSeries::new(
            "B 7",
            GeoPoint::new(-115.54, 33.02),
            epochs(),
            elevations,
            GeoPoint::new(-115.55, 33.01),
        )
        .unwrap()
    }

    #[test]
    fn test_excluded_positions_are_dropped() {
        let s = series(vec![Some(1.0); 9]);
        let out = DatumReferencer::new().reference(&s).unwrap();
        assert_eq!(out.len(), 7);
        assert_eq!(out.epochs[0], ymd(2009, 11));
        assert!(!out.epochs.contains(&ymd(2014, 11)));
        assert!(out.epochs.contains(&ymd(2014, 12)));
    }

    #[test]
    fn test_reference_epoch_is_zero() {
        let s = series(vec![
            Some(10.0), Some(9.990), Some(9.980), Some(9.970), Some(9.960),
            Some(9.950), Some(9.940), Some(9.900), Some(9.890),
        ]);
        let out = DatumReferencer::new().reference(&s).unwrap();
        assert_eq!(out.displacements[0], Some(0.0));
        assert!((out.displacements[1].unwrap() + 0.010).abs() < 1e-12);
    }

    #[test]
    fn test_step_applied_after_datum_change() {
        // pre 9.94 vs post 9.90 -> step 0.04
        let s = series(vec![
            Some(10.0), Some(9.990), Some(9.980), Some(9.970), Some(9.960),
            Some(9.950), Some(9.940), Some(9.900), Some(9.890),
        ]);
        let out = DatumReferencer::new().reference(&s).unwrap();
        // post-correction 2014: 9.90 - 9.99 + 0.04
        assert!((out.displacements[5].unwrap() + 0.050).abs() < 1e-9);
        // 2015: 9.89 - 9.99 + 0.04
        assert!((out.displacements[6].unwrap() + 0.060).abs() < 1e-9);
    }

    #[test]
    fn test_late_first_observation() {
        let s = series(vec![
            Some(10.0), None, None, Some(9.970), Some(9.960),
            Some(9.950), Some(9.940), Some(9.940), Some(9.930),
        ]);
        let out = DatumReferencer::new().reference(&s).unwrap();
        assert_eq!(out.displacements[0], None);
        assert_eq!(out.displacements[2], Some(0.0));
    }

    #[test]
    fn test_degenerate_series_is_all_missing() {
        let mut elevations = vec![None; 9];
        elevations[0] = Some(10.0);
        let out = DatumReferencer::new().reference(&series(elevations)).unwrap();
        assert!(out.displacements.iter().all(|v| v.is_none()));
        assert_eq!(out.len(), 7);
    }

    #[test]
    fn test_missing_step_only_affects_late_epochs() {
        let mut elevations = vec![Some(9.95); 9];
        elevations[6] = None;
        let out = DatumReferencer::new().reference(&series(elevations)).unwrap();
        assert_eq!(out.displacements[4], Some(0.0));
        assert_eq!(out.displacements[5], None);
        assert_eq!(out.displacements[6], None);
    }

    #[test]
    fn test_indices_out_of_range() {
        let s = BenchmarkSeries::new(
            "short",
            GeoPoint::new(0.0, 0.0),
            vec![ymd(2009, 11), ymd(2010, 11)],
            vec![Some(1.0), Some(1.0)],
            GeoPoint::new(0.0, 0.0),
        )
        .unwrap();
        let result = DatumReferencer::new().reference(&s);
        assert!(matches!(result, Err(LevsarError::Config(_))));
    }
}
