//! TradeSim CLI — run, compare, and sweep backtests.
//!
//! Commands:
//! - `run` — one backtest from a TOML config (or defaults)
//! - `compare` — several strategies over the same bars, in parallel
//! - `sweep` — grid search over moving-average crossover windows
//!
//! Bars come from a CSV file (`--bars`) or a seeded synthetic random walk
//! (`--synthetic N`). Logging goes through `tracing`; set `RUST_LOG` or pass
//! `--verbose` for per-bar detail.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use chrono::{TimeZone, Utc};
use clap::{Args, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use tradesim_core::domain::MarketBar;
use tradesim_core::synthetic::generate_bars;
use tradesim_runner::export::{export_json, generate_comparison, generate_report, save_artifacts};
use tradesim_runner::{
    best_by, compare_configs, dataset_hash, format_metric, load_bars_csv, sweep_ma_crossover,
    BacktestConfig, BacktestResult, ParamGrid, Runner, StrategyConfig,
};

#[derive(Parser)]
#[command(name = "tradesim", about = "TradeSim — bar-by-bar trading backtest simulator")]
struct Cli {
    /// Debug-level logging (overridden by RUST_LOG).
    #[arg(long, short, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct DataArgs {
    /// TOML config file; every section is optional.
    #[arg(long)]
    config: Option<PathBuf>,

    /// CSV file with timestamp,open,high,low,close,volume[,symbol].
    #[arg(long, conflicts_with = "synthetic")]
    bars: Option<PathBuf>,

    /// Generate this many synthetic daily bars instead of reading a file.
    #[arg(long)]
    synthetic: Option<usize>,

    /// Symbol for synthetic bars and CSV rows without a symbol column.
    #[arg(long, default_value = "SPY")]
    symbol: String,

    /// Seed for synthetic bars.
    #[arg(long, default_value_t = 42)]
    seed: u64,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the configured strategy once.
    Run {
        #[command(flatten)]
        data: DataArgs,

        /// Write result.json, trades.csv and equity.csv under this directory.
        #[arg(long)]
        output_dir: Option<PathBuf>,

        /// Print the full result as JSON instead of a report.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Compare strategies over the same bars.
    Compare {
        #[command(flatten)]
        data: DataArgs,

        /// Strategies: `buy_and_hold[:LOTS]` or `ma_crossover:SHORT:LONG[:LOTS]`.
        #[arg(long = "strategy", required = true)]
        strategies: Vec<String>,
    },
    /// Grid search over moving-average windows.
    Sweep {
        #[command(flatten)]
        data: DataArgs,

        /// Short windows, comma separated.
        #[arg(long, value_delimiter = ',', default_values_t = [5, 10, 20])]
        short: Vec<usize>,

        /// Long windows, comma separated.
        #[arg(long, value_delimiter = ',', default_values_t = [50, 100, 200])]
        long: Vec<usize>,

        #[arg(long, default_value_t = 1.0)]
        lots: f64,

        /// Metric used to pick the best grid point.
        #[arg(long, default_value = "sharpe")]
        metric: String,

        /// Run grid points one at a time.
        #[arg(long, default_value_t = false)]
        sequential: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Run {
            data,
            output_dir,
            json,
        } => run_cmd(&data, output_dir, json),
        Commands::Compare { data, strategies } => compare_cmd(&data, &strategies),
        Commands::Sweep {
            data,
            short,
            long,
            lots,
            metric,
            sequential,
        } => sweep_cmd(
            &data,
            ParamGrid {
                short_windows: short,
                long_windows: long,
                lots,
            },
            &metric,
            !sequential,
        ),
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(data: &DataArgs) -> Result<BacktestConfig> {
    match &data.config {
        Some(path) => BacktestConfig::load(path)
            .with_context(|| format!("failed to load config {}", path.display())),
        None => Ok(BacktestConfig::default()),
    }
}

fn load_data(data: &DataArgs) -> Result<Vec<MarketBar>> {
    let bars = match (&data.bars, data.synthetic) {
        (Some(path), _) => load_bars_csv(path, &data.symbol)
            .with_context(|| format!("failed to load bars from {}", path.display()))?,
        (None, Some(count)) => {
            let start = Utc
                .with_ymd_and_hms(2020, 1, 1, 0, 0, 0)
                .single()
                .context("invalid synthetic start date")?;
            generate_bars(&data.symbol, start, count, 100.0, data.seed)
        }
        (None, None) => bail!("one of --bars or --synthetic is required"),
    };
    info!(bars = bars.len(), dataset = %&dataset_hash(&bars)[..12], "bars loaded");
    Ok(bars)
}

fn run_cmd(data: &DataArgs, output_dir: Option<PathBuf>, json: bool) -> Result<()> {
    let config = load_config(data)?;
    let bars = load_data(data)?;
    let mut runner = Runner::new(config)?;
    let result = runner.run_configured(&bars)?;

    if json {
        println!("{}", export_json(&result)?);
    } else {
        println!("{}", generate_report(&result));
        println!("Digest: {}", result.digest()?);
    }
    if let Some(dir) = output_dir {
        let run_dir = save_artifacts(&result, &dir)?;
        println!("Artifacts saved to: {}", run_dir.display());
    }
    if let Some(reason) = &result.failure {
        bail!("run failed: {reason}");
    }
    Ok(())
}

fn compare_cmd(data: &DataArgs, names: &[String]) -> Result<()> {
    let config = load_config(data)?;
    let bars = load_data(data)?;
    let strategies = names
        .iter()
        .map(|text| parse_strategy(text))
        .collect::<Result<Vec<_>>>()?;
    let results = compare_configs(&bars, &strategies, &config)?;
    println!("{}", generate_comparison(&results));
    report_failures(&results);
    Ok(())
}

fn sweep_cmd(data: &DataArgs, grid: ParamGrid, metric: &str, parallel: bool) -> Result<()> {
    if grid.size() == 0 {
        bail!("grid has no valid (short < long) window pairs");
    }
    let config = load_config(data)?;
    let bars = load_data(data)?;
    let results = sweep_ma_crossover(&bars, &grid, &config, parallel)?;

    println!("| short | long | {metric} | trades | final equity |");
    println!("| --- | --- | --- | --- | --- |");
    for point in &results {
        let value = point.result.metric(metric).map(format_metric).unwrap_or_else(|| "-".into());
        println!(
            "| {} | {} | {} | {} | {:.2} |",
            point.short_window,
            point.long_window,
            value,
            point.result.trades.len(),
            point.result.final_equity()
        );
    }
    match best_by(&results, metric) {
        Some(best) => println!(
            "\nBest by {metric}: short={} long={}",
            best.short_window, best.long_window
        ),
        None => println!("\nNo grid point reported '{metric}'"),
    }
    Ok(())
}

fn report_failures(results: &[BacktestResult]) {
    for r in results {
        if let Some(reason) = &r.failure {
            eprintln!("{}: {reason}", r.strategy_name);
        }
    }
}

/// `buy_and_hold[:LOTS]` or `ma_crossover:SHORT:LONG[:LOTS]` (alias `ma`).
fn parse_strategy(text: &str) -> Result<StrategyConfig> {
    let parts: Vec<&str> = text.split(':').collect();
    let lots_at = |i: usize| -> Result<f64> {
        parts
            .get(i)
            .map(|s| s.parse::<f64>().with_context(|| format!("bad lots in '{text}'")))
            .transpose()
            .map(|lots| lots.unwrap_or(1.0))
    };
    match parts.as_slice() {
        ["buy_and_hold", ..] if parts.len() <= 2 => Ok(StrategyConfig::BuyAndHold { lots: lots_at(1)? }),
        ["ma_crossover" | "ma", short, long, ..] if parts.len() <= 4 => {
            Ok(StrategyConfig::MaCrossover {
                short_window: short
                    .parse()
                    .with_context(|| format!("bad short window in '{text}'"))?,
                long_window: long
                    .parse()
                    .with_context(|| format!("bad long window in '{text}'"))?,
                lots: lots_at(3)?,
            })
        }
        _ => bail!(
            "unknown strategy '{text}'. Use buy_and_hold[:LOTS] or ma_crossover:SHORT:LONG[:LOTS]"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_strategy_names() {
        assert_eq!(
            parse_strategy("buy_and_hold").unwrap(),
            StrategyConfig::BuyAndHold { lots: 1.0 }
        );
        assert_eq!(
            parse_strategy("ma:5:20:2.5").unwrap(),
            StrategyConfig::MaCrossover {
                short_window: 5,
                long_window: 20,
                lots: 2.5
            }
        );
        assert!(parse_strategy("ma_crossover:5").is_err());
        assert!(parse_strategy("ma:x:20").is_err());
        assert!(parse_strategy("martingale").is_err());
    }

    #[test]
    fn cli_parses_sweep_lists() {
        let cli = Cli::try_parse_from([
            "tradesim", "sweep", "--synthetic", "300", "--short", "3,5", "--long", "30",
        ])
        .unwrap();
        match cli.command {
            Commands::Sweep { short, long, data, .. } => {
                assert_eq!(short, vec![3, 5]);
                assert_eq!(long, vec![30]);
                assert_eq!(data.synthetic, Some(300));
            }
            _ => panic!("expected sweep"),
        }
    }

    #[test]
    fn bars_and_synthetic_conflict() {
        assert!(Cli::try_parse_from([
            "tradesim", "run", "--bars", "a.csv", "--synthetic", "10",
        ])
        .is_err());
    }
}
