//! MarketBar — the unit of market data the simulation consumes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// OHLCV bar for one symbol over one period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketBar {
    pub symbol: String,
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Reasons a single bar is malformed.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
pub enum BarError {
    #[error("non-finite {field} value")]
    NonFinite { field: String },

    #[error("negative {field} value {value}")]
    Negative { field: String, value: f64 },

    #[error("high {high} is below low {low}")]
    HighBelowLow { high: f64, low: f64 },

    #[error("{field} {value} outside [low {low}, high {high}]")]
    OutsideRange {
        field: String,
        value: f64,
        low: f64,
        high: f64,
    },
}

impl MarketBar {
    pub fn new(
        symbol: impl Into<String>,
        timestamp: DateTime<Utc>,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    /// Returns true if any OHLCV field is NaN or infinite.
    pub fn is_void(&self) -> bool {
        self.fields().iter().any(|(_, v)| !v.is_finite())
    }

    /// Checks the OHLCV invariants: finite, non-negative, `low <= {open, close} <= high`.
    pub fn validate(&self) -> Result<(), BarError> {
        for (field, value) in self.fields() {
            if !value.is_finite() {
                return Err(BarError::NonFinite {
                    field: field.to_string(),
                });
            }
            if value < 0.0 {
                return Err(BarError::Negative {
                    field: field.to_string(),
                    value,
                });
            }
        }
        if self.high < self.low {
            return Err(BarError::HighBelowLow {
                high: self.high,
                low: self.low,
            });
        }
        for (field, value) in [("open", self.open), ("close", self.close)] {
            if value < self.low || value > self.high {
                return Err(BarError::OutsideRange {
                    field: field.to_string(),
                    value,
                    low: self.low,
                    high: self.high,
                });
            }
        }
        Ok(())
    }

    pub fn is_sane(&self) -> bool {
        self.validate().is_ok()
    }

    fn fields(&self) -> [(&'static str, f64); 5] {
        [
            ("open", self.open),
            ("high", self.high),
            ("low", self.low),
            ("close", self.close),
            ("volume", self.volume),
        ]
    }
}
