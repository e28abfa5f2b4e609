//! Bar-by-bar backtest loop.
//!
//! Per bar, strictly in order:
//! 1. Validate the bar (fatal `DataIntegrityError` on failure)
//! 2. Ask the strategy for a signal; errors are logged and the bar is skipped
//! 3. Submit the order, process the order book, apply fills to the portfolio
//! 4. Append a portfolio snapshot at the bar's close
//! 5. Report progress and check for cooperative cancellation
//!
//! Each run builds a fresh order manager and portfolio manager, so repeated
//! runs over the same inputs are bit-identical.

use std::collections::HashMap;

use tracing::{debug, error, info, warn};

use crate::domain::{MarketBar, PortfolioSnapshot};
use crate::orders::{OrderManager, SubmitOutcome};
use crate::portfolio::{ExecutionOutcome, PortfolioManager};
use crate::strategy::Strategy;

use super::integrity::{check_bar, DataIntegrityError};
use super::state::{
    EngineConfig, EngineConfigError, FinalMark, RejectionRecord, RejectionStage, RunResult,
    RunStatus, StrategyFailure,
};

type ProgressFn<'a> = Box<dyn FnMut(usize, usize) + 'a>;
type CancelFn<'a> = Box<dyn Fn() -> bool + 'a>;

/// Drives one strategy over one bar series.
pub struct Backtester<'a> {
    config: EngineConfig,
    status: RunStatus,
    progress: Option<ProgressFn<'a>>,
    cancel: Option<CancelFn<'a>>,
}

/// Per-run mutable state threaded through the loop.
struct RunState {
    orders: OrderManager,
    portfolio: PortfolioManager,
    prices: HashMap<String, f64>,
    snapshots: Vec<PortfolioSnapshot>,
    rejections: Vec<RejectionRecord>,
    strategy_errors: Vec<StrategyFailure>,
    fills: usize,
    processed: usize,
}

impl<'a> Backtester<'a> {
    pub fn new(config: EngineConfig) -> Result<Self, EngineConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            status: RunStatus::Initialized,
            progress: None,
            cancel: None,
        })
    }

    /// Called after every processed bar with `(processed, total)`.
    pub fn with_progress(mut self, callback: impl FnMut(usize, usize) + 'a) -> Self {
        self.progress = Some(Box::new(callback));
        self
    }

    /// Checked once per bar boundary; returning true ends the run early.
    pub fn with_cancellation(mut self, predicate: impl Fn() -> bool + 'a) -> Self {
        self.cancel = Some(Box::new(predicate));
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn status(&self) -> RunStatus {
        self.status
    }

    /// Run `strategy` over `bars`. Never panics on bad data: integrity
    /// failures come back as a `Failed` result with partial output.
    pub fn run(&mut self, bars: &[MarketBar], strategy: &mut dyn Strategy) -> RunResult {
        self.status = RunStatus::Initialized;
        strategy.reset();

        let orders = OrderManager::new(self.config.execution.clone());
        let portfolio = PortfolioManager::new(
            self.config.portfolio.clone(),
            self.config.lot.clone(),
            orders.cost_model(),
        );
        let mut state = RunState {
            orders,
            portfolio,
            prices: HashMap::new(),
            snapshots: Vec::with_capacity(bars.len()),
            rejections: Vec::new(),
            strategy_errors: Vec::new(),
            fills: 0,
            processed: 0,
        };

        let total = bars.len();
        info!(strategy = strategy.name(), bars = total, "backtest started");
        self.status = RunStatus::Running;

        let mut cancelled = false;
        for (i, bar) in bars.iter().enumerate() {
            if let Err(err) = check_bar(i, bar, i.checked_sub(1).map(|p| &bars[p])) {
                error!(%err, "data integrity failure, aborting run");
                self.status = RunStatus::Failed;
                return self.finish(strategy.name(), state, total, Some(err), false, None);
            }

            self.step(i, bar, bars, strategy, &mut state);

            if let Some(progress) = self.progress.as_mut() {
                progress(state.processed, total);
            }
            if self.cancel.as_ref().is_some_and(|cancel| cancel()) {
                info!(processed = state.processed, total, "backtest cancelled");
                cancelled = true;
                break;
            }
        }

        let final_mark = state.processed.checked_sub(1).map(|last| {
            let timestamp = bars[last].timestamp;
            FinalMark {
                timestamp,
                positions: state.portfolio.positions_summary(&state.prices),
                cash: state.portfolio.cash(),
                equity: state.portfolio.get_portfolio_value(&state.prices),
                unrealized_pnl: state.portfolio.unrealized_pnl(&state.prices),
            }
        });
        self.status = RunStatus::Completed;
        self.finish(strategy.name(), state, total, None, cancelled, final_mark)
    }

    fn step(
        &self,
        index: usize,
        bar: &MarketBar,
        bars: &[MarketBar],
        strategy: &mut dyn Strategy,
        state: &mut RunState,
    ) {
        let start = self
            .config
            .history_window
            .map_or(0, |window| index.saturating_sub(window));
        let history = &bars[start..index];

        match strategy.generate_signal(bar, history) {
            Ok(Some(order)) => {
                if let SubmitOutcome::Rejected(reason) = state.orders.submit(order.clone()) {
                    state.rejections.push(RejectionRecord {
                        bar_index: index,
                        timestamp: bar.timestamp,
                        stage: RejectionStage::Submission,
                        order,
                        reason,
                    });
                }
            }
            Ok(None) => {}
            Err(err) => {
                warn!(bar = index, strategy = strategy.name(), %err, "strategy error, skipping bar");
                state.strategy_errors.push(StrategyFailure {
                    bar_index: index,
                    timestamp: bar.timestamp,
                    error: err,
                });
            }
        }

        for fill in state.orders.process(bar) {
            state.fills += 1;
            if let ExecutionOutcome::Rejected(reason) = state.portfolio.apply_fill(&fill) {
                state
                    .orders
                    .record_execution_rejection(fill.order_id, &reason, bar.timestamp);
                state.rejections.push(RejectionRecord {
                    bar_index: index,
                    timestamp: bar.timestamp,
                    stage: RejectionStage::Execution,
                    order: fill.order,
                    reason,
                });
            }
        }

        state.prices.insert(bar.symbol.clone(), bar.close);
        let snapshot = state.portfolio.snapshot(bar.timestamp, &state.prices);
        debug!(bar = index, equity = snapshot.equity, cash = snapshot.cash, "bar processed");
        state.snapshots.push(snapshot);
        state.processed = index + 1;
    }

    fn finish(
        &self,
        strategy_name: &str,
        state: RunState,
        total: usize,
        failure: Option<DataIntegrityError>,
        cancelled: bool,
        final_mark: Option<FinalMark>,
    ) -> RunResult {
        let trades = state.portfolio.trades().to_vec();
        info!(
            strategy = strategy_name,
            status = ?self.status,
            processed = state.processed,
            trades = trades.len(),
            rejections = state.rejections.len(),
            "backtest finished"
        );
        RunResult {
            strategy_name: strategy_name.to_string(),
            status: self.status,
            failure,
            cancelled,
            initial_capital: state.portfolio.initial_capital(),
            bars_processed: state.processed,
            bars_total: total,
            fills: state.fills,
            trades,
            snapshots: state.snapshots,
            rejections: state.rejections,
            strategy_errors: state.strategy_errors,
            final_mark,
            order_stats: state.orders.statistics(),
        }
    }
}

/// Convenience wrapper: build a backtester and run it once.
pub fn run_backtest(
    bars: &[MarketBar],
    strategy: &mut dyn Strategy,
    config: &EngineConfig,
) -> Result<RunResult, EngineConfigError> {
    let mut backtester = Backtester::new(config.clone())?;
    Ok(backtester.run(bars, strategy))
}
