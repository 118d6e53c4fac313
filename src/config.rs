//! Run configuration
//!
//! Every tunable of a reconciliation run in one place, loadable from JSON.
//! Missing keys fall back to the defaults of each parameter struct.

use crate::core::compare::OneToOneComparator;
use crate::core::coregister::{MatchParams, NearestPixelMatcher};
use crate::core::cube::CubeParams;
use crate::core::datum::{DatumParams, DatumReferencer};
use crate::io::leveling::{
    EpochLabelRules, LevelingReader, SentinelSet, SurveySchema, TransposedSchema,
};
use crate::types::{LevsarError, LevsarResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Cell delimiter of text survey tables
    pub delimiter: char,
    pub survey: SurveySchema,
    pub transposed: TransposedSchema,
    pub sentinels: SentinelSet,
    pub epoch_labels: EpochLabelRules,
    pub datum: DatumParams,
    pub cube: CubeParams,
    pub matching: MatchParams,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            delimiter: '\t',
            survey: SurveySchema::default(),
            transposed: TransposedSchema::default(),
            sentinels: SentinelSet::default(),
            epoch_labels: EpochLabelRules::default(),
            datum: DatumParams::default(),
            cube: CubeParams::default(),
            matching: MatchParams::default(),
        }
    }
}

impl RunConfig {
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> LevsarResult<Self> {
        log::info!("Reading configuration: {}", path.as_ref().display());
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&content)
    }

    pub fn from_json_str(content: &str) -> LevsarResult<Self> {
        let config: RunConfig = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values no component can work with
    pub fn validate(&self) -> LevsarResult<()> {
        if self.delimiter == ':' {
            return Err(LevsarError::Config(
                "':' is reserved for correction lists and cannot delimit tables".to_string(),
            ));
        }
        if self.datum.pre_correction_index == self.datum.post_correction_index {
            return Err(LevsarError::Config(format!(
                "Pre- and post-correction indices are both {}",
                self.datum.pre_correction_index
            )));
        }
        if self.datum.datum_change < self.datum.analysis_start {
            log::warn!(
                "Datum change {} precedes analysis start {}",
                self.datum.datum_change,
                self.datum.analysis_start
            );
        }
        if !(self.matching.tolerance_m > 0.0) || !(self.matching.neighborhood_m >= 0.0) {
            return Err(LevsarError::Config(format!(
                "Invalid matching distances: tolerance {} m, neighborhood {} m",
                self.matching.tolerance_m, self.matching.neighborhood_m
            )));
        }
        if !self.cube.to_mm.is_finite() || self.cube.to_mm == 0.0 {
            return Err(LevsarError::Config(format!(
                "Invalid cube unit factor {}",
                self.cube.to_mm
            )));
        }
        Ok(())
    }

    pub fn leveling_reader(&self) -> LevsarResult<LevelingReader> {
        LevelingReader::new(
            self.survey.clone(),
            self.sentinels.clone(),
            self.epoch_labels.clone(),
        )
    }

    pub fn datum_referencer(&self) -> DatumReferencer {
        DatumReferencer::with_params(self.datum.clone())
    }

    pub fn comparator(&self) -> OneToOneComparator<NearestPixelMatcher> {
        OneToOneComparator::with_params(self.matching.clone())
    }
}
