//! Property tests for the analytics layer.
//!
//! 1. Metrics are never NaN, whatever the equity path and trade list
//! 2. Max drawdown stays within [0, 1] for positive equity
//! 3. Profit factor and win rate stay in range
//! 4. Runner output is deterministic for any seed

use chrono::{Duration, TimeZone, Utc};
use proptest::prelude::*;
use tradesim_core::domain::{PortfolioSnapshot, PositionId, PositionSide, Trade};
use tradesim_core::strategy::MovingAverageCrossover;
use tradesim_core::synthetic::generate_bars;
use tradesim_runner::metrics::{max_drawdown, profit_factor, win_rate, AnalyticsConfig};
use tradesim_runner::{run_backtest, BacktestConfig, PerformanceMetrics};

fn make_trade(pnl: f64) -> Trade {
    let t0 = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
    Trade::new(
        PositionId(1),
        "SPY",
        PositionSide::Long,
        100.0,
        100.0 + pnl,
        1.0,
        t0,
        t0 + Duration::days(1),
        0.0,
        false,
    )
}

fn arb_equity() -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(1.0..1_000_000.0_f64, 0..80)
}

fn arb_trades() -> impl Strategy<Value = Vec<Trade>> {
    prop::collection::vec((-50.0..50.0_f64).prop_map(make_trade), 0..40)
}

fn snapshots(equity: &[f64]) -> Vec<PortfolioSnapshot> {
    let t0 = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
    equity
        .iter()
        .enumerate()
        .map(|(i, &eq)| PortfolioSnapshot::new(t0 + Duration::days(i as i64), eq, 0.0, 0, 0.0))
        .collect()
}

proptest! {
    #[test]
    fn metrics_are_never_nan(equity in arb_equity(), trades in arb_trades()) {
        let bench: Vec<f64> = (0..=equity.len()).map(|i| (i as f64 * 0.37).sin() / 100.0).collect();
        let m = PerformanceMetrics::compute(
            &trades,
            &snapshots(&equity),
            100_000.0,
            &bench,
            &AnalyticsConfig::default(),
        );
        for (name, value) in m.to_map() {
            prop_assert!(!value.is_nan(), "{} is NaN", name);
            if name != "profit_factor" {
                prop_assert!(value.is_finite(), "{} = {}", name, value);
            }
        }
    }

    #[test]
    fn drawdown_is_a_fraction(equity in arb_equity()) {
        let dd = max_drawdown(&equity);
        prop_assert!((0.0..=1.0).contains(&dd));
    }

    #[test]
    fn trade_ratios_stay_in_range(trades in arb_trades()) {
        let wr = win_rate(&trades);
        prop_assert!((0.0..=1.0).contains(&wr));
        prop_assert!(profit_factor(&trades) >= 0.0);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn runs_are_deterministic(seed in any::<u64>(), short in 2usize..8, gap in 2usize..20) {
        let start = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
        let bars = generate_bars("SPY", start, 120, 50.0, seed);
        let config = BacktestConfig::default();
        let mut a = MovingAverageCrossover::new(short, short + gap, 3.0).unwrap();
        let mut b = MovingAverageCrossover::new(short, short + gap, 3.0).unwrap();
        let ra = run_backtest(&bars, &mut a, &config).unwrap();
        let rb = run_backtest(&bars, &mut b, &config).unwrap();
        prop_assert_eq!(ra.digest().unwrap(), rb.digest().unwrap());
    }
}
