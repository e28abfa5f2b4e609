//! Bar loading from CSV files.
//!
//! Expected header: `timestamp,open,high,low,close,volume` with an optional
//! `symbol` column. Timestamps are RFC 3339 or plain `YYYY-MM-DD` (midnight
//! UTC). Rows without a symbol take the caller's default symbol.
//!
//! The loader only parses: bar sanity and timestamp ordering are checked by
//! the engine, which fails the run with the offending index.

use std::io::Read;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use tradesim_core::domain::MarketBar;

/// Errors from the data loading layer.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to open {path}: {source}")]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("row {row}: unrecognized timestamp '{value}'")]
    Timestamp { row: usize, value: String },

    #[error("no bars found")]
    Empty,
}

#[derive(Debug, Deserialize)]
struct CsvBar {
    timestamp: String,
    #[serde(default)]
    symbol: Option<String>,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
}

/// Load bars from a CSV file.
pub fn load_bars_csv(path: &Path, default_symbol: &str) -> Result<Vec<MarketBar>, LoadError> {
    let file = std::fs::File::open(path).map_err(|source| LoadError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    let bars = read_bars(file, default_symbol)?;
    debug!(path = %path.display(), bars = bars.len(), "loaded bars");
    Ok(bars)
}

/// Parse bars from any CSV reader.
pub fn read_bars<R: Read>(reader: R, default_symbol: &str) -> Result<Vec<MarketBar>, LoadError> {
    let mut csv_reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let mut bars = Vec::new();
    for (row, record) in csv_reader.deserialize::<CsvBar>().enumerate() {
        let raw = record?;
        let timestamp = parse_timestamp(&raw.timestamp).ok_or_else(|| LoadError::Timestamp {
            row: row + 1,
            value: raw.timestamp.clone(),
        })?;
        let symbol = raw
            .symbol
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| default_symbol.to_string());
        bars.push(MarketBar::new(
            symbol, timestamp, raw.open, raw.high, raw.low, raw.close, raw.volume,
        ));
    }
    if bars.is_empty() {
        return Err(LoadError::Empty);
    }
    Ok(bars)
}

/// RFC 3339, or a bare date taken as midnight UTC.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

/// BLAKE3 over every bar, identifying a dataset.
pub fn dataset_hash(bars: &[MarketBar]) -> String {
    let mut hasher = blake3::Hasher::new();
    for bar in bars {
        hasher.update(bar.symbol.as_bytes());
        hasher.update(&bar.timestamp.timestamp().to_le_bytes());
        for value in [bar.open, bar.high, bar.low, bar.close, bar.volume] {
            hasher.update(&value.to_bits().to_le_bytes());
        }
    }
    hasher.finalize().to_hex().to_string()
}
