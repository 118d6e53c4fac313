//! Leveling survey ingestion
//!
//! Turns raw survey sheets into [`BenchmarkSeries`]. Two layouts are
//! supported: the standard layout (one benchmark per row, one survey epoch per
//! column) and the transposed layout (one epoch per row, one benchmark per
//! column). Both share the same missing-value sentinels and epoch label rules.

use crate::io::table::{Correction, RawTable};
use crate::types::{BenchmarkSeries, GeoPoint, LevelValue, LevsarError, LevsarResult};
use chrono::NaiveDate;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ops::Range;
use std::path::Path;

/// Cell tokens that mark a missing observation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SentinelSet {
    pub tokens: Vec<String>,
}

impl Default for SentinelSet {
    fn default() -> Self {
        let tokens = [
            "", "-", "DESTROYED", "DAMAGED", "NOT", "FOUND", "NOT FOUND", "?", "LOST",
            "UNACCESSABLE",
        ];
        Self {
            tokens: tokens.iter().map(|t| t.to_string()).collect(),
        }
    }
}

/// Classified content of one survey cell
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CellValue {
    Value(f64),
    Missing,
    Invalid,
}

impl SentinelSet {
    pub fn is_missing(&self, cell: &str) -> bool {
        let cell = cell.trim();
        self.tokens
            .iter()
            .any(|token| token.trim().eq_ignore_ascii_case(cell))
    }

    pub fn classify(&self, cell: &str) -> CellValue {
        if self.is_missing(cell) {
            return CellValue::Missing;
        }
        match cell.trim().parse::<f64>() {
            Ok(v) if v.is_finite() => CellValue::Value(v),
            Ok(_) => CellValue::Missing,
            Err(_) => CellValue::Invalid,
        }
    }

    fn parse_cell(&self, cell: &str, benchmark: &str, column: &str) -> LevsarResult<LevelValue> {
        match self.classify(cell) {
            CellValue::Value(v) => Ok(Some(v)),
            CellValue::Missing => Ok(None),
            CellValue::Invalid => Err(LevsarError::Ingestion(format!(
                "Unrecognized value '{}' for benchmark {} in column '{}'",
                cell.trim(),
                benchmark,
                column
            ))),
        }
    }
}

/// A label with no month token that maps to a fixed epoch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpecialLabel {
    pub contains: String,
    pub epoch: NaiveDate,
}

/// Rules for turning column labels into survey epochs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EpochLabelRules {
    /// Token preceding the month/year pair in standard headers
    pub datum_marker: String,
    /// Known bad month tokens and their replacements
    pub month_typos: BTreeMap<String, String>,
    /// Checked before the month/year pattern
    pub special_labels: Vec<SpecialLabel>,
}

impl Default for EpochLabelRules {
    fn default() -> Self {
        let mut month_typos = BTreeMap::new();
        month_typos.insert(")CT".to_string(), "OCT".to_string());

        Self {
            datum_marker: "88".to_string(),
            month_typos,
            special_labels: vec![SpecialLabel {
                contains: "NOLTE 2008".to_string(),
                epoch: NaiveDate::from_ymd_opt(2008, 11, 1).unwrap_or_default(),
            }],
        }
    }
}

/// Compiled form of [`EpochLabelRules`]
#[derive(Debug, Clone)]
pub struct EpochLabelParser {
    rules: EpochLabelRules,
    header_pattern: Regex,
    month_year_pattern: Regex,
}

impl EpochLabelParser {
    pub fn new(rules: EpochLabelRules) -> LevsarResult<Self> {
        let header_pattern = Regex::new(&format!(
            r"(?:^|\s){}\s+(\S+)\s+(\d{{4}})\b",
            regex::escape(rules.datum_marker.trim())
        ))
        .map_err(|e| LevsarError::Config(format!("Invalid datum marker: {}", e)))?;
        let month_year_pattern = Regex::new(r"^\s*(\S+?)\.?\s+(\d{4})\s*$")
            .map_err(|e| LevsarError::Config(format!("Regex error: {}", e)))?;

        Ok(Self {
            rules,
            header_pattern,
            month_year_pattern,
        })
    }

    /// Epoch of a standard header such as `ELEV NAVD 88 NOV 2009`
    pub fn parse_header(&self, label: &str) -> LevsarResult<NaiveDate> {
        if let Some(epoch) = self.special_epoch(label) {
            return Ok(epoch);
        }

        let captures = self.header_pattern.captures(label).ok_or_else(|| {
            LevsarError::Ingestion(format!("No month/year token in column label '{}'", label))
        })?;
        self.epoch_from_tokens(&captures[1], &captures[2], label)
    }

    /// Epoch of a bare `Nov 2009` label
    pub fn parse_month_year(&self, label: &str) -> LevsarResult<NaiveDate> {
        if let Some(epoch) = self.special_epoch(label) {
            return Ok(epoch);
        }

        let captures = self.month_year_pattern.captures(label).ok_or_else(|| {
            LevsarError::Ingestion(format!("Epoch label '{}' is not of the form 'Mon YYYY'", label))
        })?;
        self.epoch_from_tokens(&captures[1], &captures[2], label)
    }

    fn special_epoch(&self, label: &str) -> Option<NaiveDate> {
        self.rules
            .special_labels
            .iter()
            .find(|special| label.contains(special.contains.as_str()))
            .map(|special| special.epoch)
    }

    fn epoch_from_tokens(&self, month: &str, year: &str, label: &str) -> LevsarResult<NaiveDate> {
        let mut month = month.to_ascii_uppercase();
        if let Some(fixed) = self.rules.month_typos.get(&month) {
            log::debug!("Fixing month token '{}' -> '{}' in '{}'", month, fixed, label);
            month = fixed.to_ascii_uppercase();
        }

        let month_number = month_number(&month).ok_or_else(|| {
            LevsarError::Ingestion(format!("Unknown month '{}' in label '{}'", month, label))
        })?;
        let year: i32 = year.parse().map_err(|_| {
            LevsarError::Ingestion(format!("Invalid year '{}' in label '{}'", year, label))
        })?;

        NaiveDate::from_ymd_opt(year, month_number, 1).ok_or_else(|| {
            LevsarError::Ingestion(format!("Invalid date in label '{}'", label))
        })
    }
}

/// Month of a full name, a 3-letter abbreviation, or an abbreviation with a
/// trailing `T` (`SEPT`); a trailing `.` is ignored
fn month_number(token: &str) -> Option<u32> {
    const MONTHS: [&str; 12] = [
        "JANUARY", "FEBRUARY", "MARCH", "APRIL", "MAY", "JUNE", "JULY", "AUGUST", "SEPTEMBER",
        "OCTOBER", "NOVEMBER", "DECEMBER",
    ];
    let token = token.strip_suffix('.').unwrap_or(token);
    MONTHS
        .iter()
        .position(|name| {
            let abbrev = &name[..3];
            token == *name || token == abbrev || token.strip_suffix('T') == Some(abbrev)
        })
        .map(|i| i as u32 + 1)
}

/// Benchmark name -> location lookup, in sheet order
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CoordinateTable {
    entries: Vec<(String, GeoPoint)>,
}

impl CoordinateTable {
    pub fn new(entries: Vec<(String, GeoPoint)>) -> Self {
        Self { entries }
    }

    /// Build from a sheet with `name`/`benchmark`, `longitude` and `latitude` columns.
    /// Rows with a blank latitude are skipped.
    pub fn from_table(table: &RawTable) -> LevsarResult<Self> {
        let name_col = find_column(table, &["name", "benchmark"])?;
        let lon_col = find_column(table, &["longitude", "lon"])?;
        let lat_col = find_column(table, &["latitude", "lat"])?;

        let mut entries = Vec::with_capacity(table.rows.len());
        for (i, row) in table.rows.iter().enumerate() {
            if row[lat_col].trim().is_empty() {
                continue;
            }
            let name = row[name_col].trim();
            let lon = parse_coordinate(&row[lon_col], name, i + 2)?;
            let lat = parse_coordinate(&row[lat_col], name, i + 2)?;
            entries.push((name.to_string(), GeoPoint::new(lon, lat)));
        }

        log::debug!("Read {} benchmark locations", entries.len());
        Ok(Self { entries })
    }

    pub fn lookup(&self, name: &str) -> Option<GeoPoint> {
        self.entries
            .iter()
            .find(|(entry, _)| entry == name)
            .map(|(_, point)| *point)
    }

    pub fn first(&self) -> Option<&(String, GeoPoint)> {
        self.entries.first()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn find_column(table: &RawTable, names: &[&str]) -> LevsarResult<usize> {
    names
        .iter()
        .find_map(|name| table.column_index(name))
        .ok_or_else(|| {
            LevsarError::Ingestion(format!(
                "Coordinate table has no column named any of {:?}",
                names
            ))
        })
}

/// Parse a degree value, repairing a doubled decimal point
fn parse_coordinate(text: &str, name: &str, row: usize) -> LevsarResult<f64> {
    let repaired = text.trim().replace("..", ".");
    repaired.parse::<f64>().map_err(|_| {
        LevsarError::Ingestion(format!(
            "Invalid coordinate '{}' for benchmark {} on row {}",
            text.trim(),
            name,
            row
        ))
    })
}

/// Layout of a standard survey sheet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SurveySchema {
    /// Header of the benchmark name column
    pub name_column: String,
    /// Columns at the right edge of the sheet that carry no epochs
    pub ignored_trailing_columns: usize,
    /// Number of benchmarks the sheet must hold, when known
    pub expected_benchmarks: Option<usize>,
    /// Sheet names that are spelled differently in the coordinate table
    pub name_aliases: BTreeMap<String, String>,
}

impl Default for SurveySchema {
    fn default() -> Self {
        let mut name_aliases = BTreeMap::new();
        name_aliases.insert("Y-1225 Datum".to_string(), "Y 1225".to_string());

        Self {
            name_column: "BENCHMARK".to_string(),
            ignored_trailing_columns: 1,
            expected_benchmarks: None,
            name_aliases,
        }
    }
}

/// Layout of a transposed survey sheet, as 0-based sheet positions
/// (sheet row 0 is the header row)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransposedSchema {
    pub station_name_row: usize,
    pub epoch_rows: Range<usize>,
    pub epoch_label_column: usize,
    pub station_columns: Range<usize>,
}

impl Default for TransposedSchema {
    fn default() -> Self {
        Self {
            station_name_row: 31,
            epoch_rows: 32..57,
            epoch_label_column: 0,
            station_columns: 5..163,
        }
    }
}

impl TransposedSchema {
    fn validate(&self, table: &RawTable) -> LevsarResult<()> {
        let rows = table.sheet_rows();
        let cols = table.width();
        let checks = [
            (self.station_name_row < rows, "station name row"),
            (self.epoch_rows.end <= rows && !self.epoch_rows.is_empty(), "epoch rows"),
            (self.epoch_label_column < cols, "epoch label column"),
            (
                self.station_columns.end <= cols && !self.station_columns.is_empty(),
                "station columns",
            ),
        ];
        for (ok, what) in checks {
            if !ok {
                return Err(LevsarError::Ingestion(format!(
                    "Transposed survey {} fall outside the {} x {} sheet",
                    what, rows, cols
                )));
            }
        }
        Ok(())
    }
}

/// Reader for leveling survey sheets
pub struct LevelingReader {
    schema: SurveySchema,
    sentinels: SentinelSet,
    labels: EpochLabelParser,
}

impl LevelingReader {
    pub fn new(
        schema: SurveySchema,
        sentinels: SentinelSet,
        rules: EpochLabelRules,
    ) -> LevsarResult<Self> {
        Ok(Self {
            schema,
            sentinels,
            labels: EpochLabelParser::new(rules)?,
        })
    }

    /// Reader with default schema, sentinels and label rules
    pub fn with_defaults() -> LevsarResult<Self> {
        Self::new(
            SurveySchema::default(),
            SentinelSet::default(),
            EpochLabelRules::default(),
        )
    }

    pub fn schema(&self) -> &SurveySchema {
        &self.schema
    }

    /// Read a standard survey sheet. Corrections are applied to a copy of the
    /// sheet first; the first benchmark row is the survey datum.
    pub fn read_survey(
        &self,
        table: &RawTable,
        corrections: &[Correction],
        coordinates: &CoordinateTable,
    ) -> LevsarResult<Vec<BenchmarkSeries>> {
        let table = table.apply_corrections(corrections)?;

        let name_col = table.column_index(&self.schema.name_column).ok_or_else(|| {
            LevsarError::Ingestion(format!(
                "Survey sheet has no '{}' column",
                self.schema.name_column
            ))
        })?;
        let epoch_end = table
            .width()
            .checked_sub(self.schema.ignored_trailing_columns)
            .filter(|end| *end > name_col + 1)
            .ok_or_else(|| {
                LevsarError::Ingestion(format!(
                    "Survey sheet has {} columns, leaving no epoch columns",
                    table.width()
                ))
            })?;
        let epoch_cols = name_col + 1..epoch_end;

        let epochs = epoch_cols
            .clone()
            .map(|c| self.labels.parse_header(&table.header[c]))
            .collect::<LevsarResult<Vec<_>>>()?;
        log::debug!("Survey epochs: {:?}", epochs);

        let rows: Vec<&Vec<String>> = table
            .rows
            .iter()
            .filter(|row| !row[name_col].trim().is_empty())
            .collect();
        if let Some(expected) = self.schema.expected_benchmarks {
            if rows.len() != expected {
                return Err(LevsarError::Ingestion(format!(
                    "Survey sheet holds {} benchmarks, expected {}",
                    rows.len(),
                    expected
                )));
            }
        }

        let mut located = Vec::with_capacity(rows.len());
        for row in &rows {
            let name = row[name_col].trim();
            let location = self.locate(name, coordinates)?;
            let elevations = epoch_cols
                .clone()
                .map(|c| self.sentinels.parse_cell(&row[c], name, &table.header[c]))
                .collect::<LevsarResult<Vec<_>>>()?;
            located.push((name.to_string(), location, elevations));
        }

        let reference = located.first().map(|(_, loc, _)| *loc).ok_or_else(|| {
            LevsarError::Ingestion("Survey sheet holds no benchmarks".to_string())
        })?;

        let series = located
            .into_iter()
            .map(|(name, location, elevations)| {
                BenchmarkSeries::new(name, location, epochs.clone(), elevations, reference)
            })
            .collect::<LevsarResult<Vec<_>>>()?;

        log::info!("Returning {} leveling stations", series.len());
        Ok(series)
    }

    /// Read a transposed survey sheet. The datum is the first entry of the
    /// coordinate table.
    pub fn read_transposed(
        &self,
        table: &RawTable,
        layout: &TransposedSchema,
        coordinates: &CoordinateTable,
    ) -> LevsarResult<Vec<BenchmarkSeries>> {
        layout.validate(table)?;

        let reference = coordinates.first().map(|(_, loc)| *loc).ok_or_else(|| {
            LevsarError::Ingestion("Coordinate table is empty".to_string())
        })?;

        let mut epochs = Vec::with_capacity(layout.epoch_rows.len());
        for row in layout.epoch_rows.clone() {
            let label = table.sheet_cell(row, layout.epoch_label_column).unwrap_or("");
            epochs.push(self.labels.parse_month_year(label)?);
        }

        let mut series = Vec::with_capacity(layout.station_columns.len());
        for col in layout.station_columns.clone() {
            let name = table
                .sheet_cell(layout.station_name_row, col)
                .unwrap_or("")
                .trim();
            if name.is_empty() {
                return Err(LevsarError::Ingestion(format!(
                    "Station column {} has no name in row {}",
                    col, layout.station_name_row
                )));
            }

            let column_label = format!("column {}", col);
            let elevations = layout
                .epoch_rows
                .clone()
                .map(|row| {
                    let cell = table.sheet_cell(row, col).unwrap_or("");
                    self.sentinels.parse_cell(cell, name, &column_label)
                })
                .collect::<LevsarResult<Vec<_>>>()?;

            let location = self.locate(name, coordinates)?;
            series.push(BenchmarkSeries::new(
                name,
                location,
                epochs.clone(),
                elevations,
                reference,
            )?);
        }

        log::info!("Returning {} leveling stations", series.len());
        Ok(series)
    }

    /// Load sheet, corrections and locations from delimited text files
    pub fn read_survey_files<P: AsRef<Path>>(
        &self,
        data_path: P,
        corrections_path: P,
        coordinates_path: P,
        delimiter: char,
    ) -> LevsarResult<Vec<BenchmarkSeries>> {
        let table = RawTable::from_delimited(data_path, delimiter)?;
        let corrections = crate::io::table::read_corrections(corrections_path)?;
        let coordinates = CoordinateTable::from_table(&RawTable::from_delimited(
            coordinates_path,
            delimiter,
        )?)?;
        self.read_survey(&table, &corrections, &coordinates)
    }

    fn locate(&self, name: &str, coordinates: &CoordinateTable) -> LevsarResult<GeoPoint> {
        let lookup_name = self
            .schema
            .name_aliases
            .get(name)
            .map(|s| s.as_str())
            .unwrap_or(name);
        coordinates.lookup(lookup_name).ok_or_else(|| {
            LevsarError::Ingestion(format!(
                "Benchmark '{}' has no entry in the coordinate table",
                name
            ))
        })
    }
}
