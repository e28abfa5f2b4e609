//! Integration tests for the backtest loop.
//!
//! Tests:
//! 1. Market round trip realizes P&L through the full loop
//! 2. Limit orders wait for the bar range to reach them
//! 3. Variable lot sizing respects the capital fraction
//! 4. Oversells are rejected without touching state
//! 5. Data integrity failures stop the run with partial results
//! 6. Final mark-to-market reports open positions without trading
//! 7. Replaying identical inputs gives identical results

use chrono::{DateTime, Duration, TimeZone, Utc};
use std::collections::HashMap;
use tradesim_core::domain::{MarketBar, Order, OrderSide, RejectReason};
use tradesim_core::engine::{
    run_backtest, Backtester, DataIntegrityError, EngineConfig, RejectionStage, RunStatus,
};
use tradesim_core::sizing::{LotConfig, SizingMode};
use tradesim_core::strategy::{
    BuyAndHold, MovingAverageCrossover, Strategy, StrategyError,
};
use tradesim_core::synthetic::generate_bars;

// ── Helpers ──────────────────────────────────────────────────────────

fn t(day: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap() + Duration::days(day)
}

/// Bar with explicit range.
fn bar(day: i64, open: f64, high: f64, low: f64, close: f64) -> MarketBar {
    MarketBar::new("SPY", t(day), open, high, low, close, 10_000.0)
}

/// Bar with a ±1 range around `close`.
fn flat_bar(day: i64, close: f64) -> MarketBar {
    bar(day, close, close + 1.0, close - 1.0, close)
}

/// Emits pre-planned orders keyed by bar index.
struct Scripted {
    plan: HashMap<usize, Order>,
}

impl Scripted {
    fn new(plan: Vec<(usize, Order)>) -> Self {
        Self {
            plan: plan.into_iter().collect(),
        }
    }
}

impl Strategy for Scripted {
    fn generate_signal(
        &mut self,
        _current: &MarketBar,
        history: &[MarketBar],
    ) -> Result<Option<Order>, StrategyError> {
        Ok(self.plan.get(&history.len()).cloned())
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

fn frictionless(capital: f64) -> EngineConfig {
    let mut config = EngineConfig::default();
    config.portfolio.initial_capital = capital;
    config
}

// ── 1. Market round trip ─────────────────────────────────────────────

#[test]
fn market_round_trip_realizes_ten() {
    let bars = vec![flat_bar(0, 100.0), flat_bar(1, 105.0), flat_bar(2, 110.0)];
    let mut strategy = Scripted::new(vec![
        (0, Order::market("SPY", OrderSide::Buy, 1.0, t(0))),
        (2, Order::market("SPY", OrderSide::Sell, 1.0, t(2))),
    ]);
    let result = run_backtest(&bars, &mut strategy, &frictionless(1_000.0)).unwrap();

    assert_eq!(result.status, RunStatus::Completed);
    assert_eq!(result.trades.len(), 1);
    let trade = &result.trades[0];
    assert_eq!(trade.entry_price, 100.0);
    assert_eq!(trade.exit_price, 110.0);
    assert!((trade.pnl - 10.0).abs() < 1e-10);
    assert!((result.final_equity() - 1_010.0).abs() < 1e-10);

    // Mid-run the position is marked at 105.
    assert!((result.snapshots[1].positions_value - 105.0).abs() < 1e-10);
    assert_eq!(result.snapshots[2].open_positions, 0);
}

// ── 2. Limit orders ──────────────────────────────────────────────────

#[test]
fn limit_buy_fills_exactly_at_limit_on_later_bar() {
    let bars = vec![
        bar(0, 97.0, 98.0, 96.0, 97.0),
        bar(1, 96.0, 97.0, 94.0, 95.5),
    ];
    let mut strategy = Scripted::new(vec![(
        0,
        Order::limit("SPY", OrderSide::Buy, 1.0, 95.0, t(0)),
    )]);
    let result = run_backtest(&bars, &mut strategy, &frictionless(1_000.0)).unwrap();

    assert_eq!(result.fills, 1);
    assert_eq!(result.snapshots[0].open_positions, 0);
    assert_eq!(result.snapshots[0].cash, 1_000.0);
    assert_eq!(result.snapshots[1].open_positions, 1);
    assert_eq!(result.snapshots[1].cash, 905.0);
    let mark = result.final_mark.unwrap();
    assert_eq!(mark.positions[0].avg_entry_price, 95.0);
}

#[test]
fn unfilled_limit_order_stays_pending() {
    let bars = vec![flat_bar(0, 100.0), flat_bar(1, 101.0)];
    let mut strategy = Scripted::new(vec![(
        0,
        Order::limit("SPY", OrderSide::Buy, 1.0, 50.0, t(0)),
    )]);
    let result = run_backtest(&bars, &mut strategy, &frictionless(1_000.0)).unwrap();
    assert_eq!(result.fills, 0);
    assert_eq!(result.order_stats.pending, 1);
}

#[test]
fn unaffordable_limit_fill_counts_as_rejected() {
    let bars = vec![bar(0, 100.0, 101.0, 99.0, 100.0)];
    let mut strategy = Scripted::new(vec![(
        0,
        Order::limit("SPY", OrderSide::Buy, 1_000.0, 99.5, t(0)),
    )]);
    let result = run_backtest(&bars, &mut strategy, &frictionless(1_000.0)).unwrap();

    assert_eq!(result.rejections.len(), 1);
    assert_eq!(result.rejections[0].stage, RejectionStage::Execution);
    assert!(result.trades.is_empty());
    let stats = &result.order_stats;
    assert_eq!(stats.accepted, 1);
    assert_eq!(stats.filled, 0);
    assert_eq!(stats.rejected, 1);
    assert_eq!(stats.fill_rate(), 0.0);
}

// ── 3. Variable sizing ───────────────────────────────────────────────

#[test]
fn variable_sizing_uses_at_most_capital_fraction() {
    let mut config = frictionless(1_000.0);
    config.lot = LotConfig {
        sizing_mode: SizingMode::Variable,
        capital_percentage: 0.5,
        granularity: 0.01,
        ..LotConfig::default()
    };
    let bars = vec![flat_bar(0, 100.0)];
    let mut strategy = BuyAndHold::new(1.0);
    let result = run_backtest(&bars, &mut strategy, &config).unwrap();

    let snap = &result.snapshots[0];
    assert_eq!(snap.open_positions, 1);
    assert!(snap.positions_value <= 500.0 + 1e-9);
    assert!(snap.positions_value > 0.0);
    assert!((snap.cash + snap.positions_value - 1_000.0).abs() < 1e-9);
}

// ── 4. Rejections ────────────────────────────────────────────────────

#[test]
fn oversell_is_rejected_and_state_is_unchanged() {
    let bars = vec![flat_bar(0, 100.0), flat_bar(1, 110.0)];
    let mut strategy = Scripted::new(vec![
        (0, Order::market("SPY", OrderSide::Buy, 1.0, t(0))),
        (1, Order::market("SPY", OrderSide::Sell, 2.0, t(1))),
    ]);
    let result = run_backtest(&bars, &mut strategy, &frictionless(1_000.0)).unwrap();

    assert!(result.trades.is_empty());
    assert_eq!(result.rejections.len(), 1);
    let rejection = &result.rejections[0];
    assert_eq!(rejection.stage, RejectionStage::Execution);
    assert!(matches!(
        rejection.reason,
        RejectReason::InsufficientPosition { .. }
    ));
    assert_eq!(result.snapshots[0].cash, result.snapshots[1].cash);
    assert_eq!(result.snapshots[1].open_positions, 1);
}

#[test]
fn invalid_order_is_rejected_at_submission() {
    let bars = vec![flat_bar(0, 100.0)];
    let mut strategy = Scripted::new(vec![(
        0,
        Order::market("SPY", OrderSide::Buy, 0.0, t(0)),
    )]);
    let result = run_backtest(&bars, &mut strategy, &frictionless(1_000.0)).unwrap();
    assert_eq!(result.rejections.len(), 1);
    assert_eq!(result.rejections[0].stage, RejectionStage::Submission);
    assert_eq!(result.rejections[0].reason.code(), "VALIDATION");
    assert!(result.is_completed());
}

#[test]
fn position_limit_holds_across_tagged_slots() {
    let mut config = frictionless(10_000.0);
    config.portfolio.max_positions = 2;
    let bars: Vec<MarketBar> = (0..4).map(|d| flat_bar(d, 10.0)).collect();
    let plan = (0..4)
        .map(|i| {
            (
                i,
                Order::market("SPY", OrderSide::Buy, 1.0, t(i as i64)).with_tag(format!("slot-{i}")),
            )
        })
        .collect();
    let mut strategy = Scripted::new(plan);
    let result = run_backtest(&bars, &mut strategy, &config).unwrap();

    assert!(result.snapshots.iter().all(|s| s.open_positions <= 2));
    assert_eq!(result.rejections.len(), 2);
    assert!(result
        .rejections
        .iter()
        .all(|r| r.reason == RejectReason::PositionLimitExceeded { max_positions: 2 }));
}

// ── 5. Data integrity ────────────────────────────────────────────────

#[test]
fn malformed_bar_fails_run_with_partial_results() {
    let bars = vec![
        flat_bar(0, 100.0),
        flat_bar(1, 101.0),
        bar(2, 100.0, 99.0, 101.0, 100.0), // high < low
        flat_bar(3, 103.0),
    ];
    let mut bt = Backtester::new(frictionless(1_000.0)).unwrap();
    let result = bt.run(&bars, &mut BuyAndHold::new(1.0));

    assert_eq!(bt.status(), RunStatus::Failed);
    assert_eq!(result.status, RunStatus::Failed);
    assert_eq!(result.snapshots.len(), 2);
    assert_eq!(result.bars_processed, 2);
    assert!(matches!(
        result.failure,
        Some(DataIntegrityError::MalformedBar { index: 2, .. })
    ));
}

#[test]
fn out_of_order_timestamp_fails_run() {
    let bars = vec![flat_bar(1, 100.0), flat_bar(0, 101.0)];
    let result = run_backtest(&bars, &mut BuyAndHold::new(1.0), &frictionless(1_000.0)).unwrap();
    assert_eq!(result.status, RunStatus::Failed);
    assert_eq!(result.snapshots.len(), 1);
    assert!(matches!(
        result.failure,
        Some(DataIntegrityError::NonMonotonicTimestamp { index: 1, .. })
    ));
}

// ── 6. Final mark ────────────────────────────────────────────────────

#[test]
fn final_mark_reports_open_positions_without_trading() {
    let bars = vec![flat_bar(0, 100.0), flat_bar(1, 120.0)];
    let result = run_backtest(&bars, &mut BuyAndHold::new(2.0), &frictionless(1_000.0)).unwrap();

    assert!(result.trades.is_empty());
    let mark = result.final_mark.as_ref().expect("completed run has a final mark");
    assert_eq!(mark.timestamp, t(1));
    assert_eq!(mark.positions.len(), 1);
    assert!((mark.unrealized_pnl - 40.0).abs() < 1e-10);
    assert_eq!(mark.cash, result.snapshots[1].cash);
    assert_eq!(mark.equity, result.final_equity());
}

// ── 7. Accounting and determinism ────────────────────────────────────

#[test]
fn every_snapshot_satisfies_accounting_identity() {
    let bars = generate_bars("SPY", t(0), 300, 100.0, 11);
    let mut config = frictionless(100_000.0);
    config.execution = tradesim_core::orders::ExecutionConfig::realistic();
    let mut strategy = MovingAverageCrossover::new(5, 20, 10.0).unwrap();
    let result = run_backtest(&bars, &mut strategy, &config).unwrap();

    assert!(result.is_completed());
    assert!(!result.trades.is_empty());
    for snap in &result.snapshots {
        assert_eq!(snap.equity, snap.cash + snap.positions_value);
        assert!(snap.cash >= 0.0);
    }
    for trade in &result.trades {
        assert!((trade.pnl - trade.expected_pnl()).abs() < 1e-9);
    }
}

#[test]
fn identical_inputs_replay_identically() {
    let bars = generate_bars("SPY", t(0), 250, 100.0, 3);
    let config = frictionless(50_000.0);

    let run = || {
        let mut strategy = MovingAverageCrossover::new(3, 12, 5.0).unwrap();
        run_backtest(&bars, &mut strategy, &config).unwrap()
    };
    let a = run();
    let b = run();
    assert_eq!(a, b);
    assert_eq!(
        serde_json::to_string(&a.trades).unwrap(),
        serde_json::to_string(&b.trades).unwrap()
    );
}

#[test]
fn reused_backtester_resets_strategy_state() {
    let bars = vec![flat_bar(0, 100.0), flat_bar(1, 101.0)];
    let mut bt = Backtester::new(frictionless(1_000.0)).unwrap();
    let mut strategy = BuyAndHold::new(1.0);
    let first = bt.run(&bars, &mut strategy);
    let second = bt.run(&bars, &mut strategy);
    assert_eq!(first, second);
    assert_eq!(second.fills, 1);
}
