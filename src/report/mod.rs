//! File sinks for reconciliation results.

use crate::domain::CompletedPair;
use chrono::NaiveDate;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

pub mod csv;
pub mod json;
pub mod xlsx;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("csv error: {0}")]
    Csv(#[from] ::csv::Error),
    #[error("spreadsheet error: {0}")]
    Spreadsheet(#[from] rust_xlsxwriter::XlsxError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    Json,
    Csv,
    Xlsx,
}

impl ReportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ReportFormat::Json => "json",
            ReportFormat::Csv => "csv",
            ReportFormat::Xlsx => "xlsx",
        }
    }

    pub fn write(&self, pairs: &[CompletedPair], path: &Path) -> Result<(), ReportError> {
        match self {
            ReportFormat::Json => json::write_json(pairs, path),
            ReportFormat::Csv => csv::write_csv(pairs, path),
            ReportFormat::Xlsx => xlsx::write_xlsx(pairs, path),
        }
    }
}

/// `trade_report_{DD-MM-YYYY}_to_{DD-MM-YYYY}` for the sales window.
pub fn report_name(start: NaiveDate, end: NaiveDate) -> String {
    format!(
        "trade_report_{}_to_{}",
        start.format("%d-%m-%Y"),
        end.format("%d-%m-%Y")
    )
}

/// Write `pairs` once per format into `dir`, returning the written paths.
pub fn write_reports(
    pairs: &[CompletedPair],
    dir: &Path,
    name: &str,
    formats: &[ReportFormat],
) -> Result<Vec<PathBuf>, ReportError> {
    std::fs::create_dir_all(dir)?;
    let mut written = Vec::with_capacity(formats.len());
    for format in formats {
        let path = dir.join(format!("{}.{}", name, format.extension()));
        format.write(pairs, &path)?;
        info!(path = %path.display(), pairs = pairs.len(), "Report saved");
        written.push(path);
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_name() {
        let start = NaiveDate::from_ymd_opt(2024, 11, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        assert_eq!(
            report_name(start, end),
            "trade_report_01-11-2024_to_01-01-2025"
        );
    }
}
