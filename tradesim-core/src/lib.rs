//! TradeSim Core — the deterministic simulation core of a bar-by-bar backtester.
//!
//! This crate contains:
//! - Domain types (bars, orders, fills, positions, trades, snapshots)
//! - Lot sizing policy (fixed and cash-proportional)
//! - Order manager with market/limit triggers and FIFO fills
//! - Portfolio manager with bounded slots, pyramiding and partial closes
//! - Backtester orchestrator with progress, cancellation and integrity checks
//! - Strategy trait and reference strategies
//!
//! Nothing here performs I/O. Loading data and writing results live in
//! `tradesim-runner`.

pub mod domain;
pub mod engine;
pub mod orders;
pub mod portfolio;
pub mod sizing;
pub mod strategy;
pub mod synthetic;

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: results and configs can cross thread boundaries,
    /// which parallel strategy comparison relies on.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        require_send::<domain::MarketBar>();
        require_sync::<domain::MarketBar>();
        require_send::<domain::Order>();
        require_sync::<domain::Order>();
        require_send::<domain::Trade>();
        require_sync::<domain::Trade>();
        require_send::<domain::PortfolioSnapshot>();
        require_sync::<domain::PortfolioSnapshot>();

        require_send::<engine::EngineConfig>();
        require_sync::<engine::EngineConfig>();
        require_send::<engine::RunResult>();
        require_sync::<engine::RunResult>();

        require_send::<orders::OrderManager>();
        require_send::<portfolio::PortfolioManager>();

        require_send::<Box<dyn strategy::Strategy>>();
    }

    /// Strategies see market data only: the trait takes the current bar and
    /// history, with no portfolio parameter.
    #[test]
    fn strategy_trait_has_no_portfolio_parameter() {
        fn _check_trait_object_builds(
            strategy: &mut dyn strategy::Strategy,
            bar: &domain::MarketBar,
            history: &[domain::MarketBar],
        ) -> Result<Option<domain::Order>, strategy::StrategyError> {
            strategy.generate_signal(bar, history)
        }
    }
}
