//! Orders as submitted by strategies.
//!
//! An `Order` is a value: once handed to the order manager it is never
//! mutated. The order manager wraps it with an id and lifecycle state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::rejection::ValidationError;

/// Buy or sell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    /// +1 for buys, -1 for sells. Multiplies an unsigned unit count into a
    /// signed position delta.
    pub fn sign(self) -> f64 {
        match self {
            OrderSide::Buy => 1.0,
            OrderSide::Sell => -1.0,
        }
    }

    pub fn opposite(self) -> Self {
        match self {
            OrderSide::Buy => OrderSide::Sell,
            OrderSide::Sell => OrderSide::Buy,
        }
    }
}

/// How the order is priced.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum OrderKind {
    /// Fill on the bar being processed at the configured reference price.
    Market,
    /// Fill at `price` once the bar trades through it.
    Limit { price: f64 },
}

/// How much to trade.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum OrderSize {
    /// A positive number of lots, converted to units by the lot sizing policy.
    Lots(f64),
    /// The full open quantity of the targeted position. Only valid for
    /// orders that reduce an existing position.
    All,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub symbol: String,
    pub side: OrderSide,
    pub kind: OrderKind,
    pub size: OrderSize,
    pub timestamp: DateTime<Utc>,
    /// Selects the position slot on `symbol`. Orders with different tags
    /// open and manage independent positions.
    pub position_tag: Option<String>,
}

impl Order {
    pub fn market(
        symbol: impl Into<String>,
        side: OrderSide,
        lots: f64,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            side,
            kind: OrderKind::Market,
            size: OrderSize::Lots(lots),
            timestamp,
            position_tag: None,
        }
    }

    pub fn limit(
        symbol: impl Into<String>,
        side: OrderSide,
        lots: f64,
        price: f64,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            side,
            kind: OrderKind::Limit { price },
            size: OrderSize::Lots(lots),
            timestamp,
            position_tag: None,
        }
    }

    /// Market order that closes the whole targeted position.
    pub fn close_all(symbol: impl Into<String>, side: OrderSide, timestamp: DateTime<Utc>) -> Self {
        Self {
            symbol: symbol.into(),
            side,
            kind: OrderKind::Market,
            size: OrderSize::All,
            timestamp,
            position_tag: None,
        }
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.position_tag = Some(tag.into());
        self
    }

    pub fn limit_price(&self) -> Option<f64> {
        match self.kind {
            OrderKind::Market => None,
            OrderKind::Limit { price } => Some(price),
        }
    }

    pub fn lots(&self) -> Option<f64> {
        match self.size {
            OrderSize::Lots(lots) => Some(lots),
            OrderSize::All => None,
        }
    }

    /// Shape checks that do not depend on portfolio state.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if let OrderSize::Lots(lots) = self.size {
            if !lots.is_finite() || lots <= 0.0 {
                return Err(ValidationError::InvalidLots(lots));
            }
        }
        if let OrderKind::Limit { price } = self.kind {
            if !price.is_finite() || price <= 0.0 {
                return Err(ValidationError::InvalidLimitPrice(price));
            }
        }
        if self.symbol.is_empty() {
            return Err(ValidationError::UnsupportedShape(
                "order has no symbol".into(),
            ));
        }
        Ok(())
    }
}
