//! CSV output for per-country datasets and the normalized table.
//!
//! Per-country files keep the historical trending-dataset layout: an
//! unquoted header line, then one line per record with every value wrapped
//! in double quotes. Newlines and double quotes are removed from values
//! instead of escaped, so every record is exactly one physical line.

use crate::models::{CSV_HEADER, CountryDataset, TrendingRecord};
use crate::normalize::{Cell, Table};
use csv::WriterBuilder;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tracing::{info, instrument};

/// Characters removed from every value before quoting.
pub const UNSAFE_CHARACTERS: [char; 2] = ['\n', '"'];

/// Failures while rendering or writing CSV output.
#[derive(Error, Debug)]
pub enum EmitError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// Remove [`UNSAFE_CHARACTERS`] from a value.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(strip_unsafe("say \"hi\"\nnow"), "say hinow");
/// ```
pub fn strip_unsafe(value: &str) -> String {
    value.replace(UNSAFE_CHARACTERS, "")
}

/// One record as a single CSV line, without the trailing newline.
pub fn record_line(record: &TrendingRecord) -> String {
    record
        .fields()
        .iter()
        .map(|field| format!("\"{}\"", strip_unsafe(field)))
        .collect::<Vec<_>>()
        .join(",")
}

/// `{output_dir}/{country_code}videos.csv`
pub fn country_csv_path(output_dir: &Path, country_code: &str) -> PathBuf {
    output_dir.join(format!("{country_code}videos.csv"))
}

/// Render a dataset to bytes: header line plus one [`record_line`] per record.
///
/// # Arguments
///
/// * `dataset` - Records of one country, in fetch order
///
/// # Returns
///
/// The complete file contents, every line terminated by `\n`.
pub fn render_country_csv(dataset: &CountryDataset) -> Result<Vec<u8>, EmitError> {
    let mut buf = Vec::new();
    writeln!(buf, "{}", CSV_HEADER.join(","))?;
    for record in &dataset.records {
        writeln!(buf, "{}", record_line(record))?;
    }
    Ok(buf)
}

/// Write one country's file, replacing any previous file of the same name.
///
/// # Arguments
///
/// * `output_dir` - Existing directory receiving the file
/// * `dataset` - Records of one country
///
/// # Returns
///
/// The path of the written `{country_code}videos.csv`.
#[instrument(level = "info", skip_all, fields(country = %dataset.country_code))]
pub async fn write_country_csv(
    output_dir: &Path,
    dataset: &CountryDataset,
) -> Result<PathBuf, EmitError> {
    let bytes = render_country_csv(dataset)?;
    let path = country_csv_path(output_dir, &dataset.country_code);
    fs::write(&path, bytes).await?;
    info!(
        path = %path.display(),
        records = dataset.records.len(),
        "Wrote country CSV"
    );
    Ok(path)
}

/// Write the normalized table with standard CSV quoting.
///
/// Timestamps are written as RFC 3339, trending dates as `%Y-%m-%d`.
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub fn write_table_csv(path: &Path, table: &Table) -> Result<(), EmitError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let mut wtr = WriterBuilder::new().from_path(path)?;
    wtr.write_record(&table.columns)?;
    for row in &table.rows {
        wtr.write_record(row.cells.iter().map(Cell::to_text))?;
    }
    wtr.flush()?;
    info!(rows = table.rows.len(), "Wrote normalized table");
    Ok(())
}
