//! Buy-and-hold: one market buy on the first bar, never sells.

use crate::domain::{MarketBar, Order, OrderSide};
use crate::strategy::{Strategy, StrategyError};

#[derive(Debug, Clone)]
pub struct BuyAndHold {
    lots: f64,
    has_bought: bool,
}

impl BuyAndHold {
    pub fn new(lots: f64) -> Self {
        Self {
            lots,
            has_bought: false,
        }
    }
}

impl Strategy for BuyAndHold {
    fn generate_signal(
        &mut self,
        current: &MarketBar,
        _history: &[MarketBar],
    ) -> Result<Option<Order>, StrategyError> {
        if self.has_bought {
            return Ok(None);
        }
        self.has_bought = true;
        Ok(Some(Order::market(
            current.symbol.clone(),
            OrderSide::Buy,
            self.lots,
            current.timestamp,
        )))
    }

    fn name(&self) -> &str {
        "buy_and_hold"
    }

    fn reset(&mut self) {
        self.has_bought = false;
    }
}
