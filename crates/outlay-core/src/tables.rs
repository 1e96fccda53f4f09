//! CSV storage for the history and forecast tables
//!
//! History: `month,category,amount`
//! Forecasts: `month,category,forecast_amount,lower_ci,upper_ci`
//!
//! Writes go through a temp file in the target directory and are renamed
//! into place, so readers never see a half-written table.

use std::collections::HashSet;
use std::fs;
use std::io::{Read, Write};
use std::path::Path;

use csv::{ReaderBuilder, WriterBuilder};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::error::{Error, Result};
use crate::models::{parse_month, ForecastRow, MonthlyObservation};

/// Raw history record, month kept as text so "YYYY-MM" is accepted too
#[derive(Debug, Deserialize)]
struct HistoryRecord {
    month: String,
    category: String,
    amount: f64,
}

#[derive(Debug, Deserialize)]
struct ForecastRecord {
    month: String,
    category: String,
    forecast_amount: f64,
    lower_ci: f64,
    upper_ci: f64,
}

/// Parse a history table
pub fn parse_history<R: Read>(reader: R) -> Result<Vec<MonthlyObservation>> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut rows = Vec::new();
    let mut seen = HashSet::new();

    for (line, result) in rdr.deserialize::<HistoryRecord>().enumerate() {
        let record = result?;
        let month = parse_month(&record.month).ok_or_else(|| {
            Error::InvalidData(format!(
                "Row {}: invalid month '{}'",
                line + 2,
                record.month
            ))
        })?;

        if !record.amount.is_finite() || record.amount < 0.0 {
            return Err(Error::InvalidData(format!(
                "Row {}: amount must be non-negative, got {}",
                line + 2,
                record.amount
            )));
        }

        if !seen.insert((month, record.category.clone())) {
            return Err(Error::InvalidData(format!(
                "Row {}: duplicate observation for {} {}",
                line + 2,
                record.category,
                month
            )));
        }

        rows.push(MonthlyObservation {
            month,
            category: record.category,
            amount: record.amount,
        });
    }

    Ok(rows)
}

/// Parse a forecast table
pub fn parse_forecasts<R: Read>(reader: R) -> Result<Vec<ForecastRow>> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut rows = Vec::new();
    for (line, result) in rdr.deserialize::<ForecastRecord>().enumerate() {
        let record = result?;
        let month = parse_month(&record.month).ok_or_else(|| {
            Error::InvalidData(format!(
                "Row {}: invalid month '{}'",
                line + 2,
                record.month
            ))
        })?;
        rows.push(ForecastRow {
            month,
            category: record.category,
            forecast_amount: record.forecast_amount,
            lower_ci: record.lower_ci,
            upper_ci: record.upper_ci,
        });
    }
    Ok(rows)
}

/// Read the history table from disk
pub fn read_history(path: &Path) -> Result<Vec<MonthlyObservation>> {
    let file = fs::File::open(path)?;
    let rows = parse_history(file)?;
    debug!(path = %path.display(), rows = rows.len(), "Read history table");
    Ok(rows)
}

/// Read the forecast table from disk
pub fn read_forecasts(path: &Path) -> Result<Vec<ForecastRow>> {
    let file = fs::File::open(path)?;
    let rows = parse_forecasts(file)?;
    debug!(path = %path.display(), rows = rows.len(), "Read forecast table");
    Ok(rows)
}

/// Serialize rows to CSV bytes
pub fn to_csv<T: Serialize>(rows: &[T]) -> Result<Vec<u8>> {
    let mut wtr = WriterBuilder::new().has_headers(true).from_writer(Vec::new());
    for row in rows {
        wtr.serialize(row)?;
    }
    wtr.into_inner()
        .map_err(|e| Error::Io(std::io::Error::other(e.to_string())))
}

/// Write the history table, replacing any existing file
pub fn write_history(path: &Path, rows: &[MonthlyObservation]) -> Result<()> {
    write_atomic(path, &to_csv(rows)?)?;
    debug!(path = %path.display(), rows = rows.len(), "Wrote history table");
    Ok(())
}

/// Write the forecast table, replacing any existing file
pub fn write_forecasts(path: &Path, rows: &[ForecastRow]) -> Result<()> {
    write_atomic(path, &to_csv(rows)?)?;
    debug!(path = %path.display(), rows = rows.len(), "Wrote forecast table");
    Ok(())
}

/// Replace `path` with `contents` via a temp file in the same directory
fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(contents)?;
    tmp.flush()?;
    tmp.persist(path).map_err(|e| Error::Io(e.error))?;
    Ok(())
}

/// SHA-256 of a file's bytes, hex encoded
pub fn fingerprint(path: &Path) -> Result<String> {
    let bytes = fs::read(path)?;
    Ok(fingerprint_bytes(&bytes))
}

pub fn fingerprint_bytes(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}
