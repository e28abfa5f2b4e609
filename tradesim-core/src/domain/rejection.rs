//! Rejection reasons shared by the order manager and the portfolio manager.
//!
//! Rejections are values, never panics: the bar loop records them and moves on.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::sizing::SizingError;

/// Malformed order or lot parameters.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
pub enum ValidationError {
    #[error("lot quantity must be positive and finite, got {0}")]
    InvalidLots(f64),

    #[error("limit price must be positive and finite, got {0}")]
    InvalidLimitPrice(f64),

    #[error("fill price must be positive and finite, got {0}")]
    InvalidFillPrice(f64),

    #[error("unsupported order shape: {0}")]
    UnsupportedShape(String),

    #[error("lot sizing failed: {0}")]
    Sizing(#[from] SizingError),
}

/// Why an order was not applied.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
pub enum RejectReason {
    #[error("validation: {0}")]
    Validation(#[from] ValidationError),

    #[error("insufficient funds: need {required:.4}, have {available:.4}")]
    InsufficientFunds { required: f64, available: f64 },

    #[error("insufficient position: requested {requested} units, held {held}")]
    InsufficientPosition { requested: f64, held: f64 },

    #[error("position limit of {max_positions} reached")]
    PositionLimitExceeded { max_positions: usize },
}

impl RejectReason {
    /// Stable machine-readable reason code.
    pub fn code(&self) -> &'static str {
        match self {
            RejectReason::Validation(_) => "VALIDATION",
            RejectReason::InsufficientFunds { .. } => "INSUFFICIENT_FUNDS",
            RejectReason::InsufficientPosition { .. } => "INSUFFICIENT_POSITION",
            RejectReason::PositionLimitExceeded { .. } => "POSITION_LIMIT_EXCEEDED",
        }
    }
}
