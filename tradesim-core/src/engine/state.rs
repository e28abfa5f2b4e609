//! Engine configuration, run status, and run result types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{Order, PortfolioSnapshot, RejectReason, Trade};
use crate::orders::{ExecutionConfig, OrderStats};
use crate::portfolio::{PortfolioConfig, PositionSummary};
use crate::sizing::{LotConfig, SizingError};
use crate::strategy::StrategyError;

use super::integrity::DataIntegrityError;

/// Configuration for a single backtest run.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub portfolio: PortfolioConfig,
    pub lot: LotConfig,
    pub execution: ExecutionConfig,
    /// Trailing bars handed to the strategy; `None` passes all earlier bars.
    pub history_window: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineConfigError {
    #[error("initial capital must be positive and finite, got {0}")]
    InitialCapital(f64),

    #[error("max_positions must be at least 1")]
    MaxPositions,

    #[error("{name} must be in [0, 1), got {value}")]
    Rate { name: &'static str, value: f64 },

    #[error(transparent)]
    Lot(#[from] SizingError),
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), EngineConfigError> {
        let capital = self.portfolio.initial_capital;
        if !capital.is_finite() || capital <= 0.0 {
            return Err(EngineConfigError::InitialCapital(capital));
        }
        if self.portfolio.max_positions == 0 {
            return Err(EngineConfigError::MaxPositions);
        }
        for (name, value) in [
            ("slippage_rate", self.execution.slippage_rate),
            ("commission_rate", self.execution.commission_rate),
        ] {
            if !(0.0..1.0).contains(&value) {
                return Err(EngineConfigError::Rate { name, value });
            }
        }
        self.lot.validate()?;
        Ok(())
    }
}

/// Lifecycle of one run: `Initialized → Running → Completed | Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    Initialized,
    Running,
    Completed,
    Failed,
}

/// Where in the bar loop an order was turned away.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RejectionStage {
    Submission,
    Execution,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RejectionRecord {
    pub bar_index: usize,
    pub timestamp: DateTime<Utc>,
    pub stage: RejectionStage,
    pub order: Order,
    pub reason: RejectReason,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyFailure {
    pub bar_index: usize,
    pub timestamp: DateTime<Utc>,
    pub error: StrategyError,
}

/// Open positions valued at the last processed close. Reporting only:
/// no trade is emitted and cash is untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalMark {
    pub timestamp: DateTime<Utc>,
    pub positions: Vec<PositionSummary>,
    pub cash: f64,
    pub equity: f64,
    pub unrealized_pnl: f64,
}

/// Everything a run produced, complete or partial.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    pub strategy_name: String,
    pub status: RunStatus,
    pub failure: Option<DataIntegrityError>,
    pub cancelled: bool,
    pub initial_capital: f64,
    pub bars_processed: usize,
    pub bars_total: usize,
    pub fills: usize,
    pub trades: Vec<Trade>,
    pub snapshots: Vec<PortfolioSnapshot>,
    pub rejections: Vec<RejectionRecord>,
    pub strategy_errors: Vec<StrategyFailure>,
    pub final_mark: Option<FinalMark>,
    pub order_stats: OrderStats,
}

impl RunResult {
    /// Equity after the last processed bar, or initial capital if none.
    pub fn final_equity(&self) -> f64 {
        self.snapshots
            .last()
            .map(|s| s.equity)
            .unwrap_or(self.initial_capital)
    }

    /// Equity timeline, one point per processed bar.
    pub fn equity_curve(&self) -> Vec<f64> {
        self.snapshots.iter().map(|s| s.equity).collect()
    }

    pub fn is_completed(&self) -> bool {
        self.status == RunStatus::Completed
    }
}
