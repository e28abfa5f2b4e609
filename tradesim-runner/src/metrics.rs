//! Performance metrics — pure functions that compute strategy statistics.
//!
//! Every metric is a total function: trade list and/or return series in,
//! scalar out. Empty and degenerate inputs (no trades, no losses, zero
//! variance) produce well-defined values instead of NaN:
//! - ratios with a zero denominator are 0
//! - `profit_factor` with profits and no losses is [`PROFIT_FACTOR_INFINITE`]
//!
//! The equity series used for returns starts with the initial capital,
//! followed by one point per processed bar.

use std::collections::BTreeMap;

use chrono::Datelike;
use serde::{Deserialize, Serialize};
use tradesim_core::domain::{MarketBar, PortfolioSnapshot, Trade};

/// Sentinel reported by [`profit_factor`] when there are profits but no losses.
pub const PROFIT_FACTOR_INFINITE: f64 = f64::INFINITY;

pub const DEFAULT_RISK_FREE_RATE: f64 = 0.02;
pub const DEFAULT_PERIODS_PER_YEAR: f64 = 252.0;
pub const DEFAULT_VAR_CONFIDENCE: f64 = 0.95;

const EPS: f64 = 1e-15;

/// Parameters for the annualized metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyticsConfig {
    /// Annual risk-free rate, spread evenly over `periods_per_year`.
    pub risk_free_rate: f64,
    pub periods_per_year: f64,
    /// Confidence level for historical value-at-risk.
    pub var_confidence: f64,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            risk_free_rate: DEFAULT_RISK_FREE_RATE,
            periods_per_year: DEFAULT_PERIODS_PER_YEAR,
            var_confidence: DEFAULT_VAR_CONFIDENCE,
        }
    }
}

/// Aggregate performance metrics for a single backtest run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub total_return: f64,
    pub annualized_return: f64,
    pub volatility: f64,
    pub sharpe: f64,
    pub sortino: f64,
    pub calmar: f64,
    /// Positive fraction: 0.15 is a 15% peak-to-trough decline.
    pub max_drawdown: f64,
    pub value_at_risk: f64,
    pub beta: f64,
    pub alpha: f64,
    pub information_ratio: f64,
    pub trade_count: usize,
    pub win_rate: f64,
    pub gross_profit: f64,
    pub gross_loss: f64,
    pub profit_factor: f64,
    pub average_win: f64,
    pub average_loss: f64,
    pub largest_win: f64,
    pub largest_loss: f64,
    pub expectancy: f64,
    pub max_consecutive_wins: usize,
    pub max_consecutive_losses: usize,
    pub total_commission: f64,
    pub final_equity: f64,
}

impl PerformanceMetrics {
    /// Compute all metrics for one run.
    ///
    /// `benchmark_returns` is aligned index-by-index with the run's period
    /// returns (see [`benchmark_returns`]); pass an empty slice to skip
    /// the relative metrics.
    pub fn compute(
        trades: &[Trade],
        snapshots: &[PortfolioSnapshot],
        initial_capital: f64,
        benchmark_returns: &[f64],
        config: &AnalyticsConfig,
    ) -> Self {
        let equity = equity_series(initial_capital, snapshots);
        let returns = period_returns(&equity);
        let rf = config.risk_free_rate;
        let ppy = config.periods_per_year;

        Self {
            total_return: total_return(&equity),
            annualized_return: annualized_return(&equity, ppy),
            volatility: std_dev(&returns) * ppy.sqrt(),
            sharpe: sharpe_ratio(&returns, rf, ppy),
            sortino: sortino_ratio(&returns, rf, ppy),
            calmar: calmar_ratio(&equity, ppy),
            max_drawdown: max_drawdown(&equity),
            value_at_risk: value_at_risk(&returns, config.var_confidence),
            beta: beta(&returns, benchmark_returns),
            alpha: alpha(&returns, benchmark_returns, rf, ppy),
            information_ratio: information_ratio(&returns, benchmark_returns, ppy),
            trade_count: trades.len(),
            win_rate: win_rate(trades),
            gross_profit: gross_profit(trades),
            gross_loss: gross_loss(trades),
            profit_factor: profit_factor(trades),
            average_win: average_win(trades),
            average_loss: average_loss(trades),
            largest_win: largest_win(trades),
            largest_loss: largest_loss(trades),
            expectancy: expectancy(trades),
            max_consecutive_wins: max_consecutive_wins(trades),
            max_consecutive_losses: max_consecutive_losses(trades),
            total_commission: trades.iter().map(|t| t.commission).sum(),
            final_equity: equity.last().copied().unwrap_or(initial_capital),
        }
    }

    /// Flatten into the name → value map stored on a result.
    pub fn to_map(&self) -> BTreeMap<String, f64> {
        [
            ("total_return", self.total_return),
            ("annualized_return", self.annualized_return),
            ("volatility", self.volatility),
            ("sharpe", self.sharpe),
            ("sortino", self.sortino),
            ("calmar", self.calmar),
            ("max_drawdown", self.max_drawdown),
            ("value_at_risk", self.value_at_risk),
            ("beta", self.beta),
            ("alpha", self.alpha),
            ("information_ratio", self.information_ratio),
            ("trade_count", self.trade_count as f64),
            ("win_rate", self.win_rate),
            ("gross_profit", self.gross_profit),
            ("gross_loss", self.gross_loss),
            ("profit_factor", self.profit_factor),
            ("average_win", self.average_win),
            ("average_loss", self.average_loss),
            ("largest_win", self.largest_win),
            ("largest_loss", self.largest_loss),
            ("expectancy", self.expectancy),
            ("max_consecutive_wins", self.max_consecutive_wins as f64),
            ("max_consecutive_losses", self.max_consecutive_losses as f64),
            ("total_commission", self.total_commission),
            ("final_equity", self.final_equity),
        ]
        .into_iter()
        .map(|(name, value)| (name.to_string(), value))
        .collect()
    }
}

/// Return over one calendar month of the equity timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyReturn {
    pub year: i32,
    pub month: u32,
    pub return_pct: f64,
}

// ─── Series helpers ─────────────────────────────────────────────────

/// Initial capital followed by each snapshot's equity.
pub fn equity_series(initial_capital: f64, snapshots: &[PortfolioSnapshot]) -> Vec<f64> {
    std::iter::once(initial_capital)
        .chain(snapshots.iter().map(|s| s.equity))
        .collect()
}

/// Simple returns between consecutive equity points.
///
/// A non-positive starting point yields a 0 return for that period.
pub fn period_returns(equity: &[f64]) -> Vec<f64> {
    equity
        .windows(2)
        .map(|w| if w[0] > 0.0 { (w[1] - w[0]) / w[0] } else { 0.0 })
        .collect()
}

/// Buy-and-hold benchmark returns for a bar sequence.
///
/// Tracks the first bar's symbol close to close. The series starts with a 0
/// for the initial-capital point and has one entry per bar, so it lines up
/// with [`period_returns`] over [`equity_series`]. Bars of other symbols
/// contribute a 0 return.
pub fn benchmark_returns(bars: &[MarketBar]) -> Vec<f64> {
    let Some(primary) = bars.first().map(|b| b.symbol.as_str()) else {
        return Vec::new();
    };
    let mut last_close: Option<f64> = None;
    let mut returns = Vec::with_capacity(bars.len() + 1);
    returns.push(0.0);
    for bar in bars {
        if bar.symbol != primary {
            returns.push(0.0);
            continue;
        }
        let r = match last_close {
            Some(prev) if prev > 0.0 => bar.close / prev - 1.0,
            _ => 0.0,
        };
        last_close = Some(bar.close);
        returns.push(r);
    }
    returns
}

// ─── Equity metrics ─────────────────────────────────────────────────

/// Total return as a fraction: (final - initial) / initial.
pub fn total_return(equity: &[f64]) -> f64 {
    match (equity.first(), equity.last()) {
        (Some(&first), Some(&last)) if equity.len() >= 2 && first > 0.0 => (last - first) / first,
        _ => 0.0,
    }
}

/// Compound annual growth rate, one equity step per period.
///
/// Returns -1.0 when the account is wiped out, 0.0 for fewer than two points.
pub fn annualized_return(equity: &[f64], periods_per_year: f64) -> f64 {
    let (Some(&first), Some(&last)) = (equity.first(), equity.last()) else {
        return 0.0;
    };
    if equity.len() < 2 || first <= 0.0 || periods_per_year <= 0.0 {
        return 0.0;
    }
    if last <= 0.0 {
        return -1.0;
    }
    let years = (equity.len() - 1) as f64 / periods_per_year;
    (last / first).powf(1.0 / years) - 1.0
}

/// Largest peak-to-trough decline as a positive fraction of the peak.
pub fn max_drawdown(equity: &[f64]) -> f64 {
    let mut peak = f64::MIN;
    let mut max_dd = 0.0_f64;
    for &eq in equity {
        peak = peak.max(eq);
        if peak > 0.0 {
            max_dd = max_dd.max((peak - eq) / peak);
        }
    }
    max_dd
}

/// Annualized Sharpe ratio.
///
/// `(mean(r) - rf / ppy) / stdev(r) * sqrt(ppy)`, sample standard deviation.
/// Returns 0.0 for fewer than two returns or zero variance.
pub fn sharpe_ratio(returns: &[f64], risk_free_rate: f64, periods_per_year: f64) -> f64 {
    if returns.len() < 2 {
        return 0.0;
    }
    let std = std_dev(returns);
    if std < EPS {
        return 0.0;
    }
    let excess = mean(returns) - risk_free_rate / periods_per_year;
    excess / std * periods_per_year.sqrt()
}

/// Annualized Sortino ratio.
///
/// Downside deviation is `sqrt(Σ min(r, 0)² / n)` over all returns.
/// Returns 0.0 when nothing was ever lost.
pub fn sortino_ratio(returns: &[f64], risk_free_rate: f64, periods_per_year: f64) -> f64 {
    if returns.len() < 2 {
        return 0.0;
    }
    let downside = downside_deviation(returns);
    if downside < EPS {
        return 0.0;
    }
    let excess = mean(returns) - risk_free_rate / periods_per_year;
    excess / downside * periods_per_year.sqrt()
}

pub fn downside_deviation(returns: &[f64]) -> f64 {
    if returns.is_empty() {
        return 0.0;
    }
    let sum_sq: f64 = returns.iter().map(|r| r.min(0.0).powi(2)).sum();
    (sum_sq / returns.len() as f64).sqrt()
}

/// Calmar ratio: annualized return / max drawdown, 0.0 without a drawdown.
pub fn calmar_ratio(equity: &[f64], periods_per_year: f64) -> f64 {
    let dd = max_drawdown(equity);
    if dd < EPS {
        return 0.0;
    }
    annualized_return(equity, periods_per_year) / dd
}

/// Historical value-at-risk: the loss not exceeded with `confidence`
/// probability, as a positive fraction (negative when even the tail gained).
pub fn value_at_risk(returns: &[f64], confidence: f64) -> f64 {
    if returns.is_empty() || !(0.0..1.0).contains(&confidence) {
        return 0.0;
    }
    let mut sorted = returns.to_vec();
    sorted.sort_by(f64::total_cmp);
    let index = (((1.0 - confidence) * sorted.len() as f64).floor() as usize).min(sorted.len() - 1);
    -sorted[index]
}

// ─── Benchmark-relative metrics ─────────────────────────────────────

/// Sensitivity of the strategy to the benchmark: cov(r, b) / var(b).
pub fn beta(returns: &[f64], benchmark: &[f64]) -> f64 {
    let n = returns.len().min(benchmark.len());
    if n < 2 {
        return 0.0;
    }
    let (r, b) = (&returns[..n], &benchmark[..n]);
    let var_b = variance(b);
    if var_b < EPS {
        return 0.0;
    }
    covariance(r, b) / var_b
}

/// Annualized Jensen's alpha.
pub fn alpha(returns: &[f64], benchmark: &[f64], risk_free_rate: f64, periods_per_year: f64) -> f64 {
    let n = returns.len().min(benchmark.len());
    if n < 2 {
        return 0.0;
    }
    let rf = risk_free_rate / periods_per_year;
    let (r, b) = (&returns[..n], &benchmark[..n]);
    let per_period = (mean(r) - rf) - beta(r, b) * (mean(b) - rf);
    per_period * periods_per_year
}

/// Annualized mean active return over tracking error.
pub fn information_ratio(returns: &[f64], benchmark: &[f64], periods_per_year: f64) -> f64 {
    let n = returns.len().min(benchmark.len());
    if n < 2 {
        return 0.0;
    }
    let active: Vec<f64> = returns[..n]
        .iter()
        .zip(&benchmark[..n])
        .map(|(r, b)| r - b)
        .collect();
    let tracking = std_dev(&active);
    if tracking < EPS {
        return 0.0;
    }
    mean(&active) / tracking * periods_per_year.sqrt()
}

// ─── Trade metrics ──────────────────────────────────────────────────

/// Sum of positive trade P&L.
pub fn gross_profit(trades: &[Trade]) -> f64 {
    trades.iter().filter(|t| t.pnl > 0.0).map(|t| t.pnl).sum()
}

/// Magnitude of the sum of negative trade P&L.
pub fn gross_loss(trades: &[Trade]) -> f64 {
    trades
        .iter()
        .filter(|t| t.pnl < 0.0)
        .map(|t| t.pnl)
        .sum::<f64>()
        .abs()
}

/// Gross profit / gross loss.
///
/// [`PROFIT_FACTOR_INFINITE`] when there are profits and no losses,
/// 0.0 when there are neither.
pub fn profit_factor(trades: &[Trade]) -> f64 {
    let profit = gross_profit(trades);
    let loss = gross_loss(trades);
    if loss > 0.0 {
        profit / loss
    } else if profit > 0.0 {
        PROFIT_FACTOR_INFINITE
    } else {
        0.0
    }
}

/// Fraction of trades with positive P&L.
pub fn win_rate(trades: &[Trade]) -> f64 {
    if trades.is_empty() {
        return 0.0;
    }
    trades.iter().filter(|t| t.pnl > 0.0).count() as f64 / trades.len() as f64
}

pub fn average_win(trades: &[Trade]) -> f64 {
    let wins: Vec<f64> = trades.iter().filter(|t| t.pnl > 0.0).map(|t| t.pnl).collect();
    mean(&wins)
}

/// Mean P&L of losing trades (a negative number, 0.0 without losers).
pub fn average_loss(trades: &[Trade]) -> f64 {
    let losses: Vec<f64> = trades.iter().filter(|t| t.pnl < 0.0).map(|t| t.pnl).collect();
    mean(&losses)
}

pub fn largest_win(trades: &[Trade]) -> f64 {
    trades.iter().map(|t| t.pnl).fold(0.0, f64::max)
}

/// Most negative trade P&L, 0.0 without losers.
pub fn largest_loss(trades: &[Trade]) -> f64 {
    trades.iter().map(|t| t.pnl).fold(0.0, f64::min)
}

/// Mean P&L per trade.
pub fn expectancy(trades: &[Trade]) -> f64 {
    let pnls: Vec<f64> = trades.iter().map(|t| t.pnl).collect();
    mean(&pnls)
}

pub fn max_consecutive_wins(trades: &[Trade]) -> usize {
    max_streak(trades, |pnl| pnl > 0.0)
}

/// Breakeven trades end both win and loss streaks.
pub fn max_consecutive_losses(trades: &[Trade]) -> usize {
    max_streak(trades, |pnl| pnl < 0.0)
}

fn max_streak(trades: &[Trade], matches: impl Fn(f64) -> bool) -> usize {
    let mut best = 0;
    let mut current = 0;
    for trade in trades {
        if matches(trade.pnl) {
            current += 1;
            best = best.max(current);
        } else {
            current = 0;
        }
    }
    best
}

// ─── Calendar ───────────────────────────────────────────────────────

/// Month-over-month returns of the equity timeline.
///
/// Each month runs from the previous month's last equity (or the initial
/// capital for the first month) to its own last equity.
pub fn monthly_returns(snapshots: &[PortfolioSnapshot], initial_capital: f64) -> Vec<MonthlyReturn> {
    let mut months: Vec<((i32, u32), f64)> = Vec::new();
    for snap in snapshots {
        let key = (snap.timestamp.year(), snap.timestamp.month());
        match months.last_mut() {
            Some((last_key, equity)) if *last_key == key => *equity = snap.equity,
            _ => months.push((key, snap.equity)),
        }
    }

    let mut start = initial_capital;
    months
        .into_iter()
        .map(|((year, month), end)| {
            let return_pct = if start > 0.0 { end / start - 1.0 } else { 0.0 };
            start = end;
            MonthlyReturn {
                year,
                month,
                return_pct,
            }
        })
        .collect()
}

// ─── Helpers ────────────────────────────────────────────────────────

pub(crate) fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample variance (n - 1 denominator).
fn variance(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64
}

pub(crate) fn std_dev(values: &[f64]) -> f64 {
    variance(values).sqrt()
}

fn covariance(a: &[f64], b: &[f64]) -> f64 {
    if a.len() < 2 || a.len() != b.len() {
        return 0.0;
    }
    let (ma, mb) = (mean(a), mean(b));
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - ma) * (y - mb))
        .sum::<f64>()
        / (a.len() - 1) as f64
}
