//! levsar: leveling / InSAR reconciliation
//!
//! Ingests leveling survey sheets, references them to a survey datum across a
//! datum change, extracts displacement intervals from InSAR time series cubes,
//! and compares the two one-to-one at benchmark locations.

pub mod types;
pub mod io;
pub mod core;
pub mod config;

#[cfg(feature = "python")]
mod python;

// Re-export main types and functions for easier access
pub use types::{
    BenchmarkSeries, DisplacementSeries, GeoPoint, LevelValue, LevsarError, LevsarResult,
};

pub use config::RunConfig;
pub use io::{CoordinateTable, InsarCubeReader, LevelingReader, RawTable, ReportWriter};
pub use crate::core::{
    ComparisonReport, DatumReferencer, EpochPair, InsarCube, InsarField, OneToOneComparator,
    SelectionMode,
};
