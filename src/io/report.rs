use crate::core::compare::ComparisonReport;
use crate::types::LevsarResult;
use std::fmt::Write as _;
use std::path::Path;

/// Writes comparison results for the plotting and bookkeeping tools
pub struct ReportWriter;

impl ReportWriter {
    /// Paired-sample table, one benchmark per line
    pub fn format_table(report: &ComparisonReport) -> String {
        let mut out = String::from("# name lon lat leveling_mm insar_mm\n");
        for s in &report.samples {
            let _ = writeln!(
                out,
                "{} {:.6} {:.6} {:.3} {:.3}",
                s.name.replace(' ', "_"),
                s.lon,
                s.lat,
                s.leveling_mm,
                s.insar_mm
            );
        }
        out
    }

    /// Human-readable summary
    pub fn format_summary(report: &ComparisonReport) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "Leveling: {} to {}",
            report.leveling_epochs.0.format("%m-%Y"),
            report.leveling_epochs.1.format("%m-%Y")
        );
        let _ = writeln!(
            out,
            "InSAR: {} to {}",
            report.insar_epochs.0.format("%Y-%m-%d"),
            report.insar_epochs.1.format("%Y-%m-%d")
        );
        let _ = writeln!(out, "Reference benchmark: {}", report.reference_name);
        match report.reference_insar_mm {
            Some(v) => {
                let _ = writeln!(out, "Reference InSAR value: {:.3} mm", v);
            }
            None => {
                let _ = writeln!(out, "Reference InSAR value: unavailable (run invalid)");
            }
        }
        let _ = writeln!(out, "Average misfit: {} mm", format_optional(report.misfit_mm));
        let _ = writeln!(out, "R-squared: {}", format_optional(report.r_squared));
        let _ = writeln!(
            out,
            "Benchmarks used: {} of {} ({} unmatched, {} missing data)",
            report.used(),
            report.total_benchmarks,
            report.unmatched,
            report.missing_data
        );
        out
    }

    pub fn write_table<P: AsRef<Path>>(report: &ComparisonReport, path: P) -> LevsarResult<()> {
        log::info!("Writing paired samples to {}", path.as_ref().display());
        std::fs::write(path.as_ref(), Self::format_table(report))?;
        Ok(())
    }

    pub fn write_summary<P: AsRef<Path>>(report: &ComparisonReport, path: P) -> LevsarResult<()> {
        log::info!("Writing summary to {}", path.as_ref().display());
        std::fs::write(path.as_ref(), Self::format_summary(report))?;
        Ok(())
    }

    pub fn write_json<P: AsRef<Path>>(report: &ComparisonReport, path: P) -> LevsarResult<()> {
        log::info!("Writing JSON report to {}", path.as_ref().display());
        let content = serde_json::to_string_pretty(report)?;
        std::fs::write(path.as_ref(), content)?;
        Ok(())
    }
}

fn format_optional(value: Option<f64>) -> String {
    value
        .map(|v| format!("{:.2}", v))
        .unwrap_or_else(|| "undefined".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::compare::PairedSample;
    use chrono::NaiveDate;

    fn report() -> ComparisonReport {
        let d = |y, m| NaiveDate::from_ymd_opt(y, m, 1).unwrap();
        ComparisonReport {
            leveling_epochs: (d(2009, 11), d(2010, 11)),
            insar_epochs: (d(2009, 10), d(2010, 12)),
            reference_name: "Y-1225 Datum".to_string(),
            reference_insar_mm: Some(1.25),
            samples: vec![PairedSample {
                name: "B 7".to_string(),
                lon: -115.54,
                lat: 33.02,
                leveling_mm: -10.0,
                insar_mm: -12.5,
            }],
            misfit_mm: None,
            r_squared: None,
            total_benchmarks: 3,
            unmatched: 1,
            missing_data: 1,
        }
    }

    #[test]
    fn test_table_format() {
        let table = ReportWriter::format_table(&report());
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1], "B_7 -115.540000 33.020000 -10.000 -12.500");
    }

    #[test]
    fn test_summary_reports_counts() {
        let summary = ReportWriter::format_summary(&report());
        assert!(summary.contains("Leveling: 11-2009 to 11-2010"));
        assert!(summary.contains("Average misfit: undefined mm"));
        assert!(summary.contains("Benchmarks used: 1 of 3 (1 unmatched, 1 missing data)"));
    }
}
