//! Position — one open slot in the portfolio.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{OrderId, PositionId};
use super::order::OrderSide;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PositionSide {
    Long,
    Short,
}

impl PositionSide {
    pub fn sign(self) -> f64 {
        match self {
            PositionSide::Long => 1.0,
            PositionSide::Short => -1.0,
        }
    }

    /// The order side that grows a position of this side.
    pub fn opening_order_side(self) -> OrderSide {
        match self {
            PositionSide::Long => OrderSide::Buy,
            PositionSide::Short => OrderSide::Sell,
        }
    }
}

/// One fill that contributed to a position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionFill {
    /// `None` when the fill was applied directly rather than through the order manager.
    pub order_id: Option<OrderId>,
    pub timestamp: DateTime<Utc>,
    pub side: OrderSide,
    pub price: f64,
    pub units: f64,
    pub commission: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub position_id: PositionId,
    pub symbol: String,
    pub tag: Option<String>,
    /// Signed unit quantity: positive long, negative short.
    pub quantity: f64,
    /// Volume-weighted average entry price.
    pub avg_entry_price: f64,
    pub entry_timestamp: DateTime<Utc>,
    pub fills: Vec<PositionFill>,
    /// Entry commission not yet allocated to a trade.
    pub open_commission: f64,
}

impl Position {
    pub fn side(&self) -> PositionSide {
        if self.quantity < 0.0 {
            PositionSide::Short
        } else {
            PositionSide::Long
        }
    }

    pub fn is_long(&self) -> bool {
        self.quantity > 0.0
    }

    pub fn is_short(&self) -> bool {
        self.quantity < 0.0
    }

    /// Absolute unit count.
    pub fn units(&self) -> f64 {
        self.quantity.abs()
    }

    pub fn market_value(&self, current_price: f64) -> f64 {
        self.quantity * current_price
    }

    pub fn unrealized_pnl(&self, current_price: f64) -> f64 {
        self.quantity * (current_price - self.avg_entry_price)
    }

    /// Pyramid `units` more at `price`, re-weighting the average entry.
    pub fn add_units(&mut self, units: f64, price: f64) {
        let held = self.units();
        let total = held + units;
        if total > 0.0 {
            self.avg_entry_price = (self.avg_entry_price * held + price * units) / total;
        }
        self.quantity = self.side().sign() * total;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn long(quantity: f64, avg: f64) -> Position {
        Position {
            position_id: PositionId(1),
            symbol: "SPY".into(),
            tag: None,
            quantity,
            avg_entry_price: avg,
            entry_timestamp: Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap(),
            fills: Vec::new(),
            open_commission: 0.0,
        }
    }

    #[test]
    fn long_position_valuation() {
        let pos = long(10.0, 100.0);
        assert!(pos.is_long());
        assert_eq!(pos.side(), PositionSide::Long);
        assert!((pos.market_value(110.0) - 1100.0).abs() < 1e-10);
        assert!((pos.unrealized_pnl(110.0) - 100.0).abs() < 1e-10);
    }

    #[test]
    fn short_position_profits_when_price_falls() {
        let pos = long(-10.0, 100.0);
        assert!(pos.is_short());
        assert!((pos.market_value(90.0) + 900.0).abs() < 1e-10);
        assert!((pos.unrealized_pnl(90.0) - 100.0).abs() < 1e-10);
    }

    #[test]
    fn pyramiding_reweights_average() {
        let mut pos = long(10.0, 100.0);
        pos.add_units(30.0, 120.0);
        assert!((pos.quantity - 40.0).abs() < 1e-10);
        assert!((pos.avg_entry_price - 115.0).abs() < 1e-10);
    }

    #[test]
    fn pyramiding_short_keeps_sign() {
        let mut pos = long(-5.0, 50.0);
        pos.add_units(5.0, 60.0);
        assert!((pos.quantity + 10.0).abs() < 1e-10);
        assert!((pos.avg_entry_price - 55.0).abs() < 1e-10);
    }
}
