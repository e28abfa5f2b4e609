//! Portfolio accounting: cash, position slots, trades, snapshots.

pub mod manager;

pub use manager::{ExecutionOutcome, PortfolioConfig, PortfolioManager, PositionSummary};
