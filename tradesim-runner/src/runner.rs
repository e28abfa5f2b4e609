//! Backtest runner — wires configuration, engine, and metrics.
//!
//! Entry points:
//! - `run_backtest()`: one strategy over pre-loaded bars, no hooks.
//! - `Runner`: same, with optional progress and cancellation hooks, and a
//!   `run_configured()` shortcut that builds the strategy from the config.

use thiserror::Error;
use tracing::{debug, info};

use tradesim_core::domain::MarketBar;
use tradesim_core::engine::{Backtester, EngineConfigError, RunResult};
use tradesim_core::strategy::{Strategy, StrategyError};

use crate::config::{BacktestConfig, ConfigError};
use crate::metrics::{benchmark_returns, monthly_returns, PerformanceMetrics};
use crate::result::{BacktestResult, SCHEMA_VERSION};

/// Errors from the runner.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("engine config error: {0}")]
    Engine(#[from] EngineConfigError),
    #[error("strategy error: {0}")]
    Strategy(#[from] StrategyError),
}

type ProgressFn<'a> = Box<dyn FnMut(usize, usize) + 'a>;
type CancelFn<'a> = Box<dyn Fn() -> bool + 'a>;

/// Runs strategies under one validated configuration.
pub struct Runner<'a> {
    config: BacktestConfig,
    progress: Option<ProgressFn<'a>>,
    cancel: Option<CancelFn<'a>>,
}

impl<'a> Runner<'a> {
    pub fn new(config: BacktestConfig) -> Result<Self, RunError> {
        config.validate()?;
        Ok(Self {
            config,
            progress: None,
            cancel: None,
        })
    }

    /// Called after every bar with `(processed, total)`.
    pub fn with_progress(mut self, callback: impl FnMut(usize, usize) + 'a) -> Self {
        self.progress = Some(Box::new(callback));
        self
    }

    /// Polled once per bar; returning true stops the run with partial results.
    pub fn with_cancellation(mut self, predicate: impl Fn() -> bool + 'a) -> Self {
        self.cancel = Some(Box::new(predicate));
        self
    }

    pub fn config(&self) -> &BacktestConfig {
        &self.config
    }

    /// Run the strategy named in the configuration.
    pub fn run_configured(&mut self, bars: &[MarketBar]) -> Result<BacktestResult, RunError> {
        let mut strategy = self.config.strategy.build()?;
        self.run(bars, strategy.as_mut())
    }

    pub fn run(
        &mut self,
        bars: &[MarketBar],
        strategy: &mut dyn Strategy,
    ) -> Result<BacktestResult, RunError> {
        let mut backtester = Backtester::new(self.config.to_engine_config())?;
        if let Some(progress) = self.progress.as_mut() {
            backtester = backtester.with_progress(move |done, total| progress(done, total));
        }
        if let Some(cancel) = self.cancel.as_ref() {
            backtester = backtester.with_cancellation(move || cancel());
        }
        let run = backtester.run(bars, strategy);
        Ok(assemble(run, bars, &self.config))
    }
}

/// Run one strategy over `bars` with `config`.
pub fn run_backtest(
    bars: &[MarketBar],
    strategy: &mut dyn Strategy,
    config: &BacktestConfig,
) -> Result<BacktestResult, RunError> {
    Runner::new(config.clone())?.run(bars, strategy)
}

/// Turn a core run into a result with metrics over the processed bars.
fn assemble(run: RunResult, bars: &[MarketBar], config: &BacktestConfig) -> BacktestResult {
    let processed = &bars[..run.bars_processed.min(bars.len())];
    let benchmark = benchmark_returns(processed);
    let metrics = PerformanceMetrics::compute(
        &run.trades,
        &run.snapshots,
        run.initial_capital,
        &benchmark,
        &config.analytics,
    );
    debug!(
        strategy = %run.strategy_name,
        trades = metrics.trade_count,
        final_equity = metrics.final_equity,
        "metrics computed"
    );

    let result = BacktestResult {
        schema_version: SCHEMA_VERSION,
        strategy_name: run.strategy_name,
        status: run.status,
        failure: run.failure.map(|err| err.to_string()),
        cancelled: run.cancelled,
        config_fingerprint: config.fingerprint(),
        initial_capital: run.initial_capital,
        bars_processed: run.bars_processed,
        bars_total: run.bars_total,
        monthly_returns: monthly_returns(&run.snapshots, run.initial_capital),
        metrics: metrics.to_map(),
        trades: run.trades,
        snapshots: run.snapshots,
        rejections: run.rejections,
        strategy_errors: run.strategy_errors,
        final_mark: run.final_mark,
        order_stats: run.order_stats,
    };
    info!(
        strategy = %result.strategy_name,
        status = ?result.status,
        trades = result.trades.len(),
        final_equity = result.final_equity(),
        "run complete"
    );
    result
}
