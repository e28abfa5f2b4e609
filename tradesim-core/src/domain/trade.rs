//! Trade — realized P&L for the closed portion of a position.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::ids::PositionId;
use super::position::PositionSide;

/// A full or partial close.
///
/// `pnl` is always `side_sign * (exit_price - entry_price) * quantity - commission`,
/// so every stored trade can be re-derived from its own fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub position_id: PositionId,
    pub symbol: String,
    pub side: PositionSide,
    pub entry_price: f64,
    pub exit_price: f64,
    /// Units closed by this trade.
    pub quantity: f64,
    pub entry_timestamp: DateTime<Utc>,
    pub exit_timestamp: DateTime<Utc>,
    /// Allocated entry commission plus exit commission.
    pub commission: f64,
    pub pnl: f64,
    /// True when the position stayed open after this trade.
    pub partial: bool,
}

impl Trade {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        position_id: PositionId,
        symbol: impl Into<String>,
        side: PositionSide,
        entry_price: f64,
        exit_price: f64,
        quantity: f64,
        entry_timestamp: DateTime<Utc>,
        exit_timestamp: DateTime<Utc>,
        commission: f64,
        partial: bool,
    ) -> Self {
        let mut trade = Self {
            position_id,
            symbol: symbol.into(),
            side,
            entry_price,
            exit_price,
            quantity,
            entry_timestamp,
            exit_timestamp,
            commission,
            pnl: 0.0,
            partial,
        };
        trade.pnl = trade.expected_pnl();
        trade
    }

    /// P&L before commission.
    pub fn gross_pnl(&self) -> f64 {
        self.side.sign() * (self.exit_price - self.entry_price) * self.quantity
    }

    /// P&L recomputed from the stored prices, quantity and commission.
    pub fn expected_pnl(&self) -> f64 {
        self.gross_pnl() - self.commission
    }

    /// Return on the trade as a fraction of entry notional.
    pub fn return_pct(&self) -> f64 {
        let notional = self.entry_price * self.quantity;
        if notional == 0.0 {
            return 0.0;
        }
        self.pnl / notional
    }

    pub fn is_winner(&self) -> bool {
        self.pnl > 0.0
    }

    pub fn holding_period(&self) -> Duration {
        self.exit_timestamp - self.entry_timestamp
    }
}
