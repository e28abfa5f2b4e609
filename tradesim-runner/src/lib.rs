//! TradeSim Runner — backtest runs, analytics, and batch orchestration.
//!
//! This crate builds on `tradesim-core` to provide:
//! - Performance analytics over trades and the equity timeline
//! - TOML configuration with content fingerprints
//! - Single runs with progress/cancel hooks and result digests
//! - Parallel strategy comparison and MA-window parameter sweeps
//! - CSV bar loading and JSON/CSV/Markdown export

pub mod compare;
pub mod config;
pub mod data_loader;
pub mod export;
pub mod metrics;
pub mod result;
pub mod runner;
pub mod sweep;

pub use compare::{compare_configs, compare_strategies};
pub use config::{BacktestConfig, BacktestSection, ConfigError, StrategyConfig};
pub use data_loader::{dataset_hash, load_bars_csv, read_bars, LoadError};
pub use metrics::{AnalyticsConfig, MonthlyReturn, PerformanceMetrics, PROFIT_FACTOR_INFINITE};
pub use result::{format_metric, BacktestResult, SCHEMA_VERSION};
pub use runner::{run_backtest, RunError, Runner};
pub use sweep::{best_by, sweep_ma_crossover, ParamGrid, SweepResult};
