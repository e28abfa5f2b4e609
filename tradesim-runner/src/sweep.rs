//! Parameter sweep over moving-average crossover windows.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;

use tradesim_core::domain::MarketBar;
use tradesim_core::strategy::MovingAverageCrossover;

use crate::config::{BacktestConfig, StrategyConfig};
use crate::result::BacktestResult;
use crate::runner::{run_backtest, RunError};

/// Windows and lot size to sweep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamGrid {
    pub short_windows: Vec<usize>,
    pub long_windows: Vec<usize>,
    pub lots: f64,
}

impl ParamGrid {
    /// Short 5/10/20 against long 50/100/200.
    pub fn ma_crossover_default() -> Self {
        Self {
            short_windows: vec![5, 10, 20],
            long_windows: vec![50, 100, 200],
            lots: 1.0,
        }
    }

    /// Valid (short, long) pairs in grid order; pairs with `short >= long`
    /// are skipped.
    pub fn combinations(&self) -> Vec<(usize, usize)> {
        self.short_windows
            .iter()
            .flat_map(|&short| {
                self.long_windows
                    .iter()
                    .filter(move |&&long| short > 0 && short < long)
                    .map(move |&long| (short, long))
            })
            .collect()
    }

    pub fn size(&self) -> usize {
        self.combinations().len()
    }
}

/// One grid point and its run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepResult {
    pub short_window: usize,
    pub long_window: usize,
    pub result: BacktestResult,
}

/// Run every grid point over `bars`, optionally in parallel.
///
/// Output order follows [`ParamGrid::combinations`] either way.
pub fn sweep_ma_crossover(
    bars: &[MarketBar],
    grid: &ParamGrid,
    config: &BacktestConfig,
    parallel: bool,
) -> Result<Vec<SweepResult>, RunError> {
    config.validate()?;
    let points = grid.combinations();
    info!(points = points.len(), parallel, "starting parameter sweep");

    let run_point = |&(short, long): &(usize, usize)| -> Result<SweepResult, RunError> {
        let mut strategy = MovingAverageCrossover::new(short, long, grid.lots)?;
        let mut point_config = config.clone();
        point_config.strategy = StrategyConfig::MaCrossover {
            short_window: short,
            long_window: long,
            lots: grid.lots,
        };
        if point_config.backtest.history_window.is_none() {
            point_config.backtest.history_window = Some(strategy.max_lookback());
        }
        let result = run_backtest(bars, &mut strategy, &point_config)?;
        Ok(SweepResult {
            short_window: short,
            long_window: long,
            result,
        })
    };

    if parallel {
        points.par_iter().map(run_point).collect()
    } else {
        points.iter().map(run_point).collect()
    }
}

/// The sweep point maximizing `metric`.
///
/// Points missing the metric or reporting NaN are ignored.
pub fn best_by<'r>(results: &'r [SweepResult], metric: &str) -> Option<&'r SweepResult> {
    results
        .iter()
        .filter_map(|r| {
            r.result
                .metric(metric)
                .filter(|v| !v.is_nan())
                .map(|v| (r, v))
        })
        .max_by(|(_, a), (_, b)| a.total_cmp(b))
        .map(|(r, _)| r)
}
