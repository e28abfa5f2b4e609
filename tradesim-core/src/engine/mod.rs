//! Backtest engine — bar-by-bar orchestration.
//!
//! The engine wires a `Strategy` to the order manager and the portfolio
//! manager, one bar at a time, and records trades, snapshots, rejections
//! and strategy failures as it goes.

pub mod backtester;
pub mod integrity;
pub mod state;

pub use backtester::{run_backtest, Backtester};
pub use integrity::{check_bar, check_series, DataIntegrityError};
pub use state::{
    EngineConfig, EngineConfigError, FinalMark, RejectionRecord, RejectionStage, RunResult,
    RunStatus, StrategyFailure,
};
