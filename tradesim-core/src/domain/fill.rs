//! Fill — an order matched against a bar.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::OrderId;
use super::order::Order;

/// Produced by the order manager when an order triggers.
///
/// Units and commission are not known here: they depend on the portfolio's
/// cash at execution time (variable lot sizing), so the portfolio manager
/// computes them when it applies the fill.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fill {
    pub order_id: OrderId,
    pub order: Order,
    /// Price after slippage.
    pub price: f64,
    /// Price before slippage (bar reference or limit price).
    pub reference_price: f64,
    pub timestamp: DateTime<Utc>,
}

impl Fill {
    /// Per-unit slippage paid on this fill; always non-negative.
    pub fn slippage_per_unit(&self) -> f64 {
        (self.price - self.reference_price).abs()
    }
}
