//! Moving average crossover.
//!
//! - Buy `lots` when the short SMA crosses above the long SMA
//! - Close the whole position when it crosses back below

use crate::domain::{MarketBar, Order, OrderSide};
use crate::strategy::{Strategy, StrategyError};

#[derive(Debug, Clone)]
pub struct MovingAverageCrossover {
    short_window: usize,
    long_window: usize,
    lots: f64,
    in_position: bool,
    name: String,
}

impl MovingAverageCrossover {
    pub fn new(short_window: usize, long_window: usize, lots: f64) -> Result<Self, StrategyError> {
        if short_window == 0 {
            return Err(StrategyError::InvalidParameters(
                "short_window must be > 0".into(),
            ));
        }
        if short_window >= long_window {
            return Err(StrategyError::InvalidParameters(format!(
                "short_window ({short_window}) must be < long_window ({long_window})"
            )));
        }
        Ok(Self {
            short_window,
            long_window,
            lots,
            in_position: false,
            name: format!("ma_crossover_{short_window}_{long_window}"),
        })
    }

    pub fn short_window(&self) -> usize {
        self.short_window
    }

    pub fn long_window(&self) -> usize {
        self.long_window
    }

    /// Bars needed before the first crossover can be detected.
    pub fn max_lookback(&self) -> usize {
        self.long_window + 1
    }
}

/// Mean of the last `period` values ending `offset` values before the end.
fn sma(closes: &[f64], period: usize, offset: usize) -> Option<f64> {
    let end = closes.len().checked_sub(offset)?;
    let start = end.checked_sub(period)?;
    let window = &closes[start..end];
    Some(window.iter().sum::<f64>() / period as f64)
}

impl Strategy for MovingAverageCrossover {
    fn generate_signal(
        &mut self,
        current: &MarketBar,
        history: &[MarketBar],
    ) -> Result<Option<Order>, StrategyError> {
        let needed = self.max_lookback();
        if history.len() + 1 < needed {
            return Ok(None);
        }
        let tail = &history[history.len() + 1 - needed..];
        let closes: Vec<f64> = tail
            .iter()
            .map(|b| b.close)
            .chain(std::iter::once(current.close))
            .collect();

        let (Some(short_now), Some(long_now), Some(short_prev), Some(long_prev)) = (
            sma(&closes, self.short_window, 0),
            sma(&closes, self.long_window, 0),
            sma(&closes, self.short_window, 1),
            sma(&closes, self.long_window, 1),
        ) else {
            return Ok(None);
        };
        if ![short_now, long_now, short_prev, long_prev]
            .iter()
            .all(|v| v.is_finite())
        {
            return Err(StrategyError::Computation(format!(
                "non-finite moving average at {}",
                current.timestamp
            )));
        }

        let crossed_up = short_prev <= long_prev && short_now > long_now;
        let crossed_down = short_prev >= long_prev && short_now < long_now;

        if crossed_up && !self.in_position {
            self.in_position = true;
            return Ok(Some(Order::market(
                current.symbol.clone(),
                OrderSide::Buy,
                self.lots,
                current.timestamp,
            )));
        }
        if crossed_down && self.in_position {
            self.in_position = false;
            return Ok(Some(Order::close_all(
                current.symbol.clone(),
                OrderSide::Sell,
                current.timestamp,
            )));
        }
        Ok(None)
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn reset(&mut self) {
        self.in_position = false;
    }
}
