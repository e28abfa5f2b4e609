//! Side-by-side strategy comparison over the same bars.
//!
//! Each strategy gets its own run (fresh order and portfolio managers); runs
//! share only the immutable bar slice and execute in parallel on rayon.
//! Results come back in input order and are identical to sequential runs.

use rayon::prelude::*;
use tracing::info;

use tradesim_core::domain::MarketBar;
use tradesim_core::strategy::Strategy;

use crate::config::{BacktestConfig, StrategyConfig};
use crate::result::BacktestResult;
use crate::runner::{run_backtest, RunError};

/// Run every strategy over `bars` in parallel.
pub fn compare_strategies(
    bars: &[MarketBar],
    strategies: Vec<Box<dyn Strategy>>,
    config: &BacktestConfig,
) -> Result<Vec<BacktestResult>, RunError> {
    config.validate()?;
    info!(strategies = strategies.len(), bars = bars.len(), "comparing strategies");
    strategies
        .into_par_iter()
        .map(|mut strategy| run_backtest(bars, strategy.as_mut(), config))
        .collect()
}

/// Build each configured strategy and compare them.
pub fn compare_configs(
    bars: &[MarketBar],
    strategies: &[StrategyConfig],
    config: &BacktestConfig,
) -> Result<Vec<BacktestResult>, RunError> {
    let built = strategies
        .iter()
        .map(StrategyConfig::build)
        .collect::<Result<Vec<_>, _>>()?;
    compare_strategies(bars, built, config)
}
