//! Strategy interface — the external decision maker driven by the backtester.
//!
//! A strategy sees market data only: the current bar and a trailing window
//! of earlier bars. It never sees cash or positions.

pub mod buy_and_hold;
pub mod ma_crossover;

pub use buy_and_hold::BuyAndHold;
pub use ma_crossover::MovingAverageCrossover;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{MarketBar, Order};

#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
pub enum StrategyError {
    #[error("invalid strategy parameters: {0}")]
    InvalidParameters(String),

    #[error("signal computation failed: {0}")]
    Computation(String),
}

/// Decision maker invoked once per bar.
///
/// # Invariants
/// - `generate_signal()` must be deterministic for the same bar sequence
/// - `history` holds bars strictly before `current`, oldest first
/// - an `Err` skips the bar; the run continues
pub trait Strategy: Send {
    fn generate_signal(
        &mut self,
        current: &MarketBar,
        history: &[MarketBar],
    ) -> Result<Option<Order>, StrategyError>;

    /// Strategy name for results and logging.
    fn name(&self) -> &str;

    /// Clear internal state before a fresh run.
    fn reset(&mut self) {}
}

impl<S: Strategy + ?Sized> Strategy for Box<S> {
    fn generate_signal(
        &mut self,
        current: &MarketBar,
        history: &[MarketBar],
    ) -> Result<Option<Order>, StrategyError> {
        (**self).generate_signal(current, history)
    }

    fn name(&self) -> &str {
        (**self).name()
    }

    fn reset(&mut self) {
        (**self).reset()
    }
}
