//! Execution settings and the cost model.
//!
//! Slippage is directional: buyers pay more, sellers receive less.
//! Commission is a fraction of traded notional, charged on every fill.

use serde::{Deserialize, Serialize};

use crate::domain::OrderSide;

/// Which bar price a market order fills at before slippage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarketPriceBasis {
    Close,
    Open,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    pub market_price: MarketPriceBasis,
    /// Fractional slippage, e.g. 0.001 = 10 bps.
    pub slippage_rate: f64,
    /// Fractional commission on notional, e.g. 0.001 = 10 bps.
    pub commission_rate: f64,
    /// Apply `slippage_rate` to limit fills as well as market fills.
    pub slip_limit_orders: bool,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self::frictionless()
    }
}

impl ExecutionConfig {
    /// Close fills, no slippage, no commission.
    pub fn frictionless() -> Self {
        Self {
            market_price: MarketPriceBasis::Close,
            slippage_rate: 0.0,
            commission_rate: 0.0,
            slip_limit_orders: false,
        }
    }

    /// Close fills with 10 bps slippage and 10 bps commission.
    pub fn realistic() -> Self {
        Self {
            slippage_rate: 0.001,
            commission_rate: 0.001,
            ..Self::frictionless()
        }
    }

    pub fn cost_model(&self) -> CostModel {
        CostModel::new(self.slippage_rate, self.commission_rate)
    }
}

/// Friction applied to fills.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CostModel {
    pub slippage_rate: f64,
    pub commission_rate: f64,
}

impl CostModel {
    pub fn new(slippage_rate: f64, commission_rate: f64) -> Self {
        Self {
            slippage_rate,
            commission_rate,
        }
    }

    pub fn frictionless() -> Self {
        Self::new(0.0, 0.0)
    }

    /// Apply slippage to a raw fill price.
    pub fn apply_slippage(&self, raw_price: f64, side: OrderSide) -> f64 {
        if self.slippage_rate == 0.0 {
            return raw_price;
        }
        match side {
            OrderSide::Buy => raw_price * (1.0 + self.slippage_rate),
            OrderSide::Sell => raw_price * (1.0 - self.slippage_rate),
        }
    }

    /// Commission for trading `units` at `price`.
    pub fn commission(&self, price: f64, units: f64) -> f64 {
        self.commission_rate * price * units.abs()
    }
}
