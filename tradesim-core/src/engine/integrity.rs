//! Data integrity checks applied to every bar before it is processed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{BarError, MarketBar};

/// Fatal input problem: the run stops and reports partial results.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
pub enum DataIntegrityError {
    #[error("bar {index} at {timestamp} is malformed: {reason}")]
    MalformedBar {
        index: usize,
        timestamp: DateTime<Utc>,
        reason: BarError,
    },

    #[error("bar {index}: timestamp {current} does not follow {previous}")]
    NonMonotonicTimestamp {
        index: usize,
        previous: DateTime<Utc>,
        current: DateTime<Utc>,
    },
}

impl DataIntegrityError {
    /// Index of the offending bar.
    pub fn index(&self) -> usize {
        match self {
            DataIntegrityError::MalformedBar { index, .. }
            | DataIntegrityError::NonMonotonicTimestamp { index, .. } => *index,
        }
    }
}

/// Validate `bar` on its own and against the bar before it.
pub fn check_bar(
    index: usize,
    bar: &MarketBar,
    previous: Option<&MarketBar>,
) -> Result<(), DataIntegrityError> {
    bar.validate()
        .map_err(|reason| DataIntegrityError::MalformedBar {
            index,
            timestamp: bar.timestamp,
            reason,
        })?;
    if let Some(prev) = previous {
        if bar.timestamp <= prev.timestamp {
            return Err(DataIntegrityError::NonMonotonicTimestamp {
                index,
                previous: prev.timestamp,
                current: bar.timestamp,
            });
        }
    }
    Ok(())
}

/// Validate a whole series up front.
pub fn check_series(bars: &[MarketBar]) -> Result<(), DataIntegrityError> {
    for (i, bar) in bars.iter().enumerate() {
        check_bar(i, bar, i.checked_sub(1).map(|p| &bars[p]))?;
    }
    Ok(())
}
