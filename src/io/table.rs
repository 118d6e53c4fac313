use crate::types::{LevsarError, LevsarResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Raw survey sheet: one header row followed by data rows of text cells
#[derive(Debug, Clone, PartialEq)]
pub struct RawTable {
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// Documented fix for a single spreadsheet cell.
///
/// `row` and `column` are 1-indexed sheet coordinates: row 1 is the header
/// row and column 1 is the benchmark name column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Correction {
    pub row: usize,
    pub column: usize,
    pub old_value: String,
    pub new_value: String,
}

impl RawTable {
    /// Build a table, padding short rows to the header width
    pub fn new(header: Vec<String>, rows: Vec<Vec<String>>) -> LevsarResult<Self> {
        let width = header.len();
        let mut padded = Vec::with_capacity(rows.len());

        for (i, mut row) in rows.into_iter().enumerate() {
            if row.len() > width {
                return Err(LevsarError::Ingestion(format!(
                    "Row {} has {} cells but the header has {}",
                    i + 2,
                    row.len(),
                    width
                )));
            }
            row.resize(width, String::new());
            padded.push(row);
        }

        Ok(Self {
            header,
            rows: padded,
        })
    }

    /// Read a delimited text export of a survey sheet
    pub fn from_delimited<P: AsRef<Path>>(path: P, delimiter: char) -> LevsarResult<Self> {
        log::info!("Reading survey table: {}", path.as_ref().display());
        let content = std::fs::read_to_string(path.as_ref())?;
        let table = Self::parse_delimited(&content, delimiter)?;
        log::debug!(
            "Table has {} columns and {} data rows",
            table.width(),
            table.rows.len()
        );
        Ok(table)
    }

    /// Parse delimited text; the first non-blank line is the header
    pub fn parse_delimited(content: &str, delimiter: char) -> LevsarResult<Self> {
        let mut lines = content
            .lines()
            .map(|line| line.trim_end_matches('\r'))
            .filter(|line| !line.trim().is_empty());

        let header = match lines.next() {
            Some(line) => split_cells(line, delimiter),
            None => {
                return Err(LevsarError::Ingestion(
                    "Survey table is empty".to_string(),
                ))
            }
        };
        let rows = lines.map(|line| split_cells(line, delimiter)).collect();

        Self::new(header, rows)
    }

    pub fn width(&self) -> usize {
        self.header.len()
    }

    /// Number of sheet rows, header included
    pub fn sheet_rows(&self) -> usize {
        self.rows.len() + 1
    }

    /// Cell by 0-based sheet position, where sheet row 0 is the header
    pub fn sheet_cell(&self, row: usize, col: usize) -> Option<&str> {
        let cells = if row == 0 {
            &self.header
        } else {
            self.rows.get(row - 1)?
        };
        cells.get(col).map(|s| s.as_str())
    }

    /// Index of a header column, matched case-insensitively
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.header
            .iter()
            .position(|h| h.trim().eq_ignore_ascii_case(name.trim()))
    }

    /// Return a copy of the table with every correction applied
    pub fn apply_corrections(&self, corrections: &[Correction]) -> LevsarResult<RawTable> {
        log::info!("Applying {} documented corrections", corrections.len());
        let mut fixed = self.clone();

        for correction in corrections {
            if correction.row == 0 || correction.column == 0 {
                return Err(LevsarError::Ingestion(format!(
                    "Correction references row {} column {}, but sheet positions are 1-indexed",
                    correction.row, correction.column
                )));
            }
            let col = correction.column - 1;
            let row = correction.row - 1;
            if row >= fixed.sheet_rows() || col >= fixed.width() {
                return Err(LevsarError::Ingestion(format!(
                    "Correction references row {} column {}, outside the {} x {} sheet",
                    correction.row,
                    correction.column,
                    fixed.sheet_rows(),
                    fixed.width()
                )));
            }

            let cell = if row == 0 {
                &mut fixed.header[col]
            } else {
                &mut fixed.rows[row - 1][col]
            };

            log::debug!(
                "Correcting row {} column '{}'",
                correction.row,
                self.header[col]
            );
            if !same_cell_value(cell, &correction.old_value) {
                log::warn!(
                    "Row {} column {} holds '{}', expected '{}'; replacing anyway",
                    correction.row,
                    correction.column,
                    cell,
                    correction.old_value
                );
            }
            log::info!(
                "   Carefully replacing {} with {}",
                cell.trim(),
                correction.new_value
            );
            *cell = correction.new_value.clone();
        }

        Ok(fixed)
    }
}

/// Split one line into trimmed cells. Double-quoted cells may hold the
/// delimiter; `""` inside quotes is a literal quote.
fn split_cells(line: &str, delimiter: char) -> Vec<String> {
    let mut cells = Vec::new();
    let mut cell = String::new();
    let mut quoted = false;
    let mut chars = line.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '"' if quoted && chars.peek() == Some(&'"') => {
                cell.push('"');
                chars.next();
            }
            '"' if quoted => quoted = false,
            '"' if cell.trim().is_empty() => {
                cell.clear();
                quoted = true;
            }
            c if c == delimiter && !quoted => {
                cells.push(cell.trim().to_string());
                cell.clear();
            }
            c => cell.push(c),
        }
    }
    cells.push(cell.trim().to_string());
    cells
}

fn same_cell_value(current: &str, expected: &str) -> bool {
    let (current, expected) = (current.trim(), expected.trim());
    if current == expected {
        return true;
    }
    match (current.parse::<f64>(), expected.parse::<f64>()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// Parse a correction list: `row::column::old::new`, `#` lines are comments
pub fn parse_corrections(content: &str) -> LevsarResult<Vec<Correction>> {
    let mut corrections = Vec::new();

    for (lineno, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let fields: Vec<&str> = line.split("::").collect();
        if fields.len() != 4 {
            return Err(LevsarError::Ingestion(format!(
                "Correction line {} has {} fields, expected 4: '{}'",
                lineno + 1,
                fields.len(),
                line
            )));
        }

        let row = parse_position(fields[0], "row", lineno)?;
        let column = parse_position(fields[1], "column", lineno)?;

        corrections.push(Correction {
            row,
            column,
            old_value: fields[2].trim().to_string(),
            new_value: fields[3].trim().to_string(),
        });
    }

    Ok(corrections)
}

/// Read a correction list from disk
pub fn read_corrections<P: AsRef<Path>>(path: P) -> LevsarResult<Vec<Correction>> {
    log::info!("Reading documented errors in {}", path.as_ref().display());
    let content = std::fs::read_to_string(path.as_ref())?;
    let corrections = parse_corrections(&content)?;
    log::debug!("Found {} corrections", corrections.len());
    Ok(corrections)
}

fn parse_position(field: &str, what: &str, lineno: usize) -> LevsarResult<usize> {
    let value = field.trim().parse::<usize>().map_err(|e| {
        LevsarError::Ingestion(format!(
            "Correction line {} has invalid {} '{}': {}",
            lineno + 1,
            what,
            field.trim(),
            e
        ))
    })?;
    if value == 0 {
        return Err(LevsarError::Ingestion(format!(
            "Correction line {} has {} 0; positions are 1-indexed",
            lineno + 1,
            what
        )));
    }
    Ok(value)
}
