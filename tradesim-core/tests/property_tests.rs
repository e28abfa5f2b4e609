//! Property tests for simulation invariants.
//!
//! Uses proptest to verify:
//! 1. Accounting identity — equity == cash + positions at every snapshot
//! 2. Slot bound — open positions never exceed max_positions
//! 3. Rejections are pure — a rejected execution changes nothing
//! 4. Variable sizing never targets more than the capital fraction
//! 5. Trade P&L is reproducible from stored fields

use chrono::{DateTime, Duration, TimeZone, Utc};
use proptest::prelude::*;
use std::collections::HashMap;
use tradesim_core::domain::{MarketBar, Order, OrderSide};
use tradesim_core::engine::{run_backtest, EngineConfig};
use tradesim_core::orders::{CostModel, ExecutionConfig};
use tradesim_core::portfolio::{PortfolioConfig, PortfolioManager};
use tradesim_core::sizing::{lots_to_units, LotConfig, SizingMode};
use tradesim_core::strategy::{Strategy as TradingStrategy, StrategyError};
use tradesim_core::synthetic::generate_bars;

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2023, 6, 1, 0, 0, 0).unwrap()
}

/// One planned action per bar: (buy?, lots, limit offset, tag).
type Action = (bool, f64, Option<f64>, u8);

struct Planned {
    actions: Vec<Option<Action>>,
}

impl TradingStrategy for Planned {
    fn generate_signal(
        &mut self,
        current: &MarketBar,
        history: &[MarketBar],
    ) -> Result<Option<Order>, StrategyError> {
        let Some(Some((buy, lots, limit_offset, tag))) = self.actions.get(history.len()) else {
            return Ok(None);
        };
        let side = if *buy { OrderSide::Buy } else { OrderSide::Sell };
        let order = match limit_offset {
            Some(offset) => Order::limit(
                current.symbol.clone(),
                side,
                *lots,
                current.close * (1.0 + offset),
                current.timestamp,
            ),
            None => Order::market(current.symbol.clone(), side, *lots, current.timestamp),
        };
        Ok(Some(order.with_tag(format!("t{tag}"))))
    }

    fn name(&self) -> &str {
        "planned"
    }
}

// ── Strategies (proptest) ────────────────────────────────────────────

fn arb_action() -> impl Strategy<Value = Option<Action>> {
    prop::option::weighted(
        0.6,
        (
            any::<bool>(),
            (0.1..20.0_f64).prop_map(|l| (l * 10.0).round() / 10.0),
            prop::option::of(-0.02..0.02_f64),
            0u8..8,
        ),
    )
}

fn arb_config() -> impl Strategy<Value = EngineConfig> {
    (
        1usize..6,
        any::<bool>(),
        0.0..0.005_f64,
        0.0..0.005_f64,
        any::<bool>(),
    )
        .prop_map(|(max_positions, allow_short, slip, comm, variable)| {
            let mut config = EngineConfig::default();
            config.portfolio = PortfolioConfig {
                initial_capital: 10_000.0,
                max_positions,
                allow_short,
            };
            config.execution = ExecutionConfig {
                slippage_rate: slip,
                commission_rate: comm,
                ..ExecutionConfig::frictionless()
            };
            if variable {
                config.lot = LotConfig {
                    sizing_mode: SizingMode::Variable,
                    capital_percentage: 0.2,
                    granularity: 0.01,
                    ..LotConfig::default()
                };
            }
            config
        })
}

// ── 1 & 2. Accounting identity and slot bound ────────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn snapshots_balance_and_respect_slot_limit(
        seed in any::<u64>(),
        actions in prop::collection::vec(arb_action(), 60),
        config in arb_config(),
    ) {
        let bars = generate_bars("SPY", t0(), 60, 100.0, seed);
        let mut strategy = Planned { actions };
        let result = run_backtest(&bars, &mut strategy, &config).unwrap();

        prop_assert!(result.is_completed());
        prop_assert_eq!(result.snapshots.len(), 60);
        for snap in &result.snapshots {
            prop_assert_eq!(snap.equity, snap.cash + snap.positions_value);
            prop_assert!(snap.cash >= -1e-9, "cash {}", snap.cash);
            prop_assert!(snap.open_positions <= config.portfolio.max_positions);
        }
        for trade in &result.trades {
            prop_assert!((trade.pnl - trade.expected_pnl()).abs() < 1e-9);
        }
    }
}

// ── 3. Rejections are pure ───────────────────────────────────────────

proptest! {
    #[test]
    fn rejected_execution_changes_nothing(
        ops in prop::collection::vec((any::<bool>(), 0.5..5.0_f64, 50.0..150.0_f64, 0u8..3), 1..40),
    ) {
        let mut pm = PortfolioManager::new(
            PortfolioConfig {
                initial_capital: 1_000.0,
                max_positions: 2,
                allow_short: false,
            },
            LotConfig::default(),
            CostModel::new(0.0, 0.001),
        );
        for (i, (buy, lots, price, tag)) in ops.into_iter().enumerate() {
            let side = if buy { OrderSide::Buy } else { OrderSide::Sell };
            let ts = t0() + Duration::days(i as i64);
            let order = Order::market("SPY", side, lots, ts).with_tag(format!("t{tag}"));

            let cash_before = pm.cash();
            let open_before = pm.open_position_count();
            let trades_before = pm.trades().len();

            let outcome = pm.execute(&order, price, ts);
            if outcome.is_rejected() {
                prop_assert_eq!(pm.cash(), cash_before);
                prop_assert_eq!(pm.open_position_count(), open_before);
                prop_assert_eq!(pm.trades().len(), trades_before);
            }
            prop_assert!(pm.cash() >= 0.0);
            let prices = HashMap::from([("SPY".to_string(), price)]);
            prop_assert_eq!(
                pm.get_portfolio_value(&prices),
                pm.snapshot(ts, &prices).equity
            );
        }
    }
}

// ── 4. Variable sizing bound ─────────────────────────────────────────

proptest! {
    #[test]
    fn variable_sizing_stays_within_target(
        cash in 1.0..1_000_000.0_f64,
        price in 0.01..10_000.0_f64,
        pct in 0.01..1.0_f64,
    ) {
        let config = LotConfig {
            sizing_mode: SizingMode::Variable,
            capital_percentage: pct,
            granularity: 0.001,
            ..LotConfig::default()
        };
        if let Ok(units) = lots_to_units(1.0, price, cash, &config) {
            let target = cash * pct;
            prop_assert!(units > 0.0);
            prop_assert!(units * price <= target,
                "units {} * price {} > target {}", units, price, target);
        }
    }
}
