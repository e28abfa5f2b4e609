//! Lot sizing — converts abstract lot counts into tradable units.
//!
//! Sizing is a pure policy: it never looks at positions or signals, only at
//! the requested lots, the fill price, available cash and the `LotConfig`.

pub mod lots;

pub use lots::{
    lots_to_units, round_to_granularity, units_to_lots, AssetType, LotConfig, SizingMode,
};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
pub enum SizingError {
    #[error("lots must be positive and finite, got {0}")]
    NonPositiveLots(f64),

    #[error("price must be positive and finite, got {0}")]
    InvalidPrice(f64),

    #[error("sizing produced {0} units")]
    NonPositiveUnits(f64),

    #[error("invalid lot config: {0}")]
    InvalidConfig(String),
}
