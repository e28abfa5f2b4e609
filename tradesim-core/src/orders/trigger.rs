//! Trigger checking — does a bar trigger a given order?
//!
//! Computes the reference fill price before slippage.

use crate::domain::{MarketBar, Order, OrderKind, OrderSide};

use super::cost_model::MarketPriceBasis;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TriggerResult {
    NoTrigger,
    Fill { reference_price: f64 },
}

/// Check whether `order` fills on `bar`.
///
/// Market orders always fill at the configured basis price. Limit buys fill
/// when the bar trades at or below the limit, limit sells when it trades at
/// or above; both fill at the limit price itself.
pub fn check_trigger(order: &Order, bar: &MarketBar, basis: MarketPriceBasis) -> TriggerResult {
    if bar.is_void() {
        return TriggerResult::NoTrigger;
    }
    match order.kind {
        OrderKind::Market => TriggerResult::Fill {
            reference_price: match basis {
                MarketPriceBasis::Close => bar.close,
                MarketPriceBasis::Open => bar.open,
            },
        },
        OrderKind::Limit { price } => check_limit(order.side, price, bar),
    }
}

fn check_limit(side: OrderSide, limit: f64, bar: &MarketBar) -> TriggerResult {
    let touched = match side {
        OrderSide::Buy => bar.low <= limit,
        OrderSide::Sell => bar.high >= limit,
    };
    if touched {
        TriggerResult::Fill {
            reference_price: limit,
        }
    } else {
        TriggerResult::NoTrigger
    }
}
