//! Readers and writers for survey sheets, InSAR grids and comparison reports

pub mod table;
pub mod leveling;
pub mod insar;
pub mod report;

pub use table::{parse_corrections, read_corrections, Correction, RawTable};
pub use leveling::{
    CellValue, CoordinateTable, EpochLabelParser, EpochLabelRules, LevelingReader, SentinelSet,
    SpecialLabel, SurveySchema, TransposedSchema,
};
pub use insar::{parse_dimension_values, InsarCubeReader};
pub use report::ReportWriter;
