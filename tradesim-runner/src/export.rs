//! Reporting and export — JSON, CSV, and Markdown artifacts.
//!
//! - **JSON**: full `BacktestResult` round trip with schema versioning
//! - **CSV**: trade tape and equity timeline
//! - **Markdown**: human-readable single-run report and comparison table

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use tradesim_core::domain::{PortfolioSnapshot, Trade};

use crate::result::{format_metric, BacktestResult, SCHEMA_VERSION};

// ─── JSON export ────────────────────────────────────────────────────

/// Serialize a `BacktestResult` to pretty JSON.
pub fn export_json(result: &BacktestResult) -> Result<String> {
    serde_json::to_string_pretty(result).context("failed to serialize BacktestResult to JSON")
}

/// Deserialize a `BacktestResult`, rejecting newer schema versions.
pub fn import_json(json: &str) -> Result<BacktestResult> {
    let result: BacktestResult =
        serde_json::from_str(json).context("failed to deserialize BacktestResult from JSON")?;
    if result.schema_version > SCHEMA_VERSION {
        bail!(
            "unsupported schema version {} (max supported: {})",
            result.schema_version,
            SCHEMA_VERSION
        );
    }
    Ok(result)
}

// ─── CSV export ─────────────────────────────────────────────────────

/// Export trades as CSV, one row per full or partial close.
pub fn export_trades_csv(trades: &[Trade]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "position_id",
        "symbol",
        "side",
        "entry_timestamp",
        "entry_price",
        "exit_timestamp",
        "exit_price",
        "quantity",
        "gross_pnl",
        "commission",
        "pnl",
        "return_pct",
        "partial",
    ])?;
    for t in trades {
        wtr.write_record([
            &t.position_id.to_string(),
            &t.symbol,
            &format!("{:?}", t.side),
            &t.entry_timestamp.to_rfc3339(),
            &format!("{:.6}", t.entry_price),
            &t.exit_timestamp.to_rfc3339(),
            &format!("{:.6}", t.exit_price),
            &format!("{:.6}", t.quantity),
            &format!("{:.2}", t.gross_pnl()),
            &format!("{:.2}", t.commission),
            &format!("{:.2}", t.pnl),
            &format!("{:.6}", t.return_pct()),
            &t.partial.to_string(),
        ])?;
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// Export the snapshot timeline as CSV.
pub fn export_equity_csv(snapshots: &[PortfolioSnapshot]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "timestamp",
        "cash",
        "positions_value",
        "equity",
        "open_positions",
        "realized_pnl",
    ])?;
    for s in snapshots {
        wtr.write_record([
            &s.timestamp.to_rfc3339(),
            &format!("{:.2}", s.cash),
            &format!("{:.2}", s.positions_value),
            &format!("{:.2}", s.equity),
            &s.open_positions.to_string(),
            &format!("{:.2}", s.realized_pnl),
        ])?;
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

// ─── Artifact bundle ────────────────────────────────────────────────

/// Write `result.json`, `trades.csv` and `equity.csv` into
/// `{output_dir}/{strategy}_{digest prefix}/` and return that directory.
pub fn save_artifacts(result: &BacktestResult, output_dir: &Path) -> Result<PathBuf> {
    let digest = result.digest().context("failed to digest result")?;
    let run_dir = output_dir.join(format!("{}_{}", result.strategy_name, &digest[..12]));
    std::fs::create_dir_all(&run_dir)
        .with_context(|| format!("failed to create artifact dir: {}", run_dir.display()))?;

    std::fs::write(run_dir.join("result.json"), export_json(result)?)?;
    std::fs::write(run_dir.join("trades.csv"), export_trades_csv(&result.trades)?)?;
    std::fs::write(run_dir.join("equity.csv"), export_equity_csv(&result.snapshots)?)?;
    Ok(run_dir)
}

/// Load a `BacktestResult` from an artifact directory.
pub fn load_artifacts(dir: &Path) -> Result<BacktestResult> {
    let path = dir.join("result.json");
    let json = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    import_json(&json)
}

// ─── Markdown reports ───────────────────────────────────────────────

const REPORT_METRICS: [(&str, &str); 12] = [
    ("Total Return", "total_return"),
    ("Annualized Return", "annualized_return"),
    ("Sharpe", "sharpe"),
    ("Sortino", "sortino"),
    ("Calmar", "calmar"),
    ("Max Drawdown", "max_drawdown"),
    ("Win Rate", "win_rate"),
    ("Profit Factor", "profit_factor"),
    ("Trades", "trade_count"),
    ("Expectancy", "expectancy"),
    ("Beta", "beta"),
    ("Final Equity", "final_equity"),
];

/// Markdown report for a single run.
pub fn generate_report(result: &BacktestResult) -> String {
    let mut md = String::with_capacity(2048);
    let _ = writeln!(md, "# Backtest Report: {}\n", result.strategy_name);
    let _ = writeln!(md, "| Field | Value |\n| --- | --- |");
    let _ = writeln!(md, "| Status | {:?} |", result.status);
    if let Some(reason) = &result.failure {
        let _ = writeln!(md, "| Failure | {reason} |");
    }
    if result.cancelled {
        md.push_str("| Cancelled | yes |\n");
    }
    let _ = writeln!(md, "| Bars | {} / {} |", result.bars_processed, result.bars_total);
    let _ = writeln!(md, "| Initial Capital | {:.2} |", result.initial_capital);
    let _ = writeln!(md, "| Rejections | {} |", result.rejections.len());
    let _ = writeln!(md, "| Strategy Errors | {} |", result.strategy_errors.len());
    let _ = writeln!(md, "| Config | {} |\n", result.config_fingerprint);

    md.push_str("## Performance\n\n| Metric | Value |\n| --- | --- |\n");
    for (label, key) in REPORT_METRICS {
        if let Some(value) = result.metric(key) {
            let _ = writeln!(md, "| {label} | {} |", format_metric(value));
        }
    }

    if let Some(mark) = &result.final_mark {
        let _ = writeln!(
            md,
            "\n## Open Positions at {}\n\n| Position | Symbol | Side | Units | Value | Unrealized |\n| --- | --- | --- | --- | --- | --- |",
            mark.timestamp.to_rfc3339()
        );
        for p in &mark.positions {
            let _ = writeln!(
                md,
                "| {} | {} | {:?} | {:.4} | {:.2} | {:.2} |",
                p.position_id, p.symbol, p.side, p.units, p.market_value, p.unrealized_pnl
            );
        }
    }
    md
}

/// Markdown table comparing several runs on the report metrics.
pub fn generate_comparison(results: &[BacktestResult]) -> String {
    let mut md = String::from("| Metric |");
    for r in results {
        let _ = write!(md, " {} |", r.strategy_name);
    }
    md.push_str("\n| --- |");
    md.push_str(&" --- |".repeat(results.len()));
    md.push('\n');
    for (label, key) in REPORT_METRICS {
        let _ = write!(md, "| {label} |");
        for r in results {
            let cell = r.metric(key).map(format_metric).unwrap_or_else(|| "-".into());
            let _ = write!(md, " {cell} |");
        }
        md.push('\n');
    }
    md
}
