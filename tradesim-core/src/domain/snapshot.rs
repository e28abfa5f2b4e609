//! PortfolioSnapshot — one point on the equity timeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioSnapshot {
    pub timestamp: DateTime<Utc>,
    pub cash: f64,
    /// Mark-to-market value of all open positions (signed for shorts).
    pub positions_value: f64,
    /// Always `cash + positions_value`.
    pub equity: f64,
    pub open_positions: usize,
    pub realized_pnl: f64,
}

impl PortfolioSnapshot {
    pub fn new(
        timestamp: DateTime<Utc>,
        cash: f64,
        positions_value: f64,
        open_positions: usize,
        realized_pnl: f64,
    ) -> Self {
        Self {
            timestamp,
            cash,
            positions_value,
            equity: cash + positions_value,
            open_positions,
            realized_pnl,
        }
    }
}
