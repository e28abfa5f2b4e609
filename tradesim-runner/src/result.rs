//! Backtest result: the core run output plus computed metrics.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tradesim_core::domain::{PortfolioSnapshot, Trade};
use tradesim_core::engine::{FinalMark, RejectionRecord, RunStatus, StrategyFailure};
use tradesim_core::orders::OrderStats;

use crate::metrics::MonthlyReturn;

/// Current schema version for persisted results.
pub const SCHEMA_VERSION: u32 = 1;

/// Complete result of a single backtest run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestResult {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub strategy_name: String,
    pub status: RunStatus,
    /// Data-integrity failure that aborted the run, if any.
    pub failure: Option<String>,
    pub cancelled: bool,
    /// Fingerprint of the configuration that produced this result.
    pub config_fingerprint: String,
    pub initial_capital: f64,
    pub bars_processed: usize,
    pub bars_total: usize,
    pub trades: Vec<Trade>,
    pub snapshots: Vec<PortfolioSnapshot>,
    /// Metric name → value. Non-finite values (the infinite profit factor)
    /// are stored as the strings `"inf"`, `"-inf"` and `"nan"`.
    #[serde(with = "metric_values")]
    pub metrics: BTreeMap<String, f64>,
    pub monthly_returns: Vec<MonthlyReturn>,
    pub rejections: Vec<RejectionRecord>,
    pub strategy_errors: Vec<StrategyFailure>,
    pub final_mark: Option<FinalMark>,
    pub order_stats: OrderStats,
}

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

impl BacktestResult {
    /// Metric by name.
    pub fn metric(&self, name: &str) -> Option<f64> {
        self.metrics.get(name).copied()
    }

    pub fn final_equity(&self) -> f64 {
        self.snapshots
            .last()
            .map(|s| s.equity)
            .unwrap_or(self.initial_capital)
    }

    pub fn equity_curve(&self) -> Vec<f64> {
        self.snapshots.iter().map(|s| s.equity).collect()
    }

    pub fn is_completed(&self) -> bool {
        self.status == RunStatus::Completed
    }

    /// BLAKE3 hex digest over the JSON of trades, snapshots and metrics.
    ///
    /// Equal digests mean bit-identical replay.
    pub fn digest(&self) -> Result<String, serde_json::Error> {
        let mut hasher = blake3::Hasher::new();
        serde_json::to_writer(&mut hasher, &self.trades)?;
        serde_json::to_writer(&mut hasher, &self.snapshots)?;
        let metrics: BTreeMap<&str, MetricValue> = self
            .metrics
            .iter()
            .map(|(k, v)| (k.as_str(), MetricValue::from(*v)))
            .collect();
        serde_json::to_writer(&mut hasher, &metrics)?;
        Ok(hasher.finalize().to_hex().to_string())
    }
}

/// On-disk form of one metric value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
enum MetricValue {
    Number(f64),
    Text(String),
}

impl From<f64> for MetricValue {
    fn from(value: f64) -> Self {
        if value.is_finite() {
            MetricValue::Number(value)
        } else if value.is_nan() {
            MetricValue::Text("nan".into())
        } else if value > 0.0 {
            MetricValue::Text("inf".into())
        } else {
            MetricValue::Text("-inf".into())
        }
    }
}

/// Parse the text form written for a non-finite metric.
pub fn parse_metric_text(text: &str) -> Option<f64> {
    match text {
        "inf" => Some(f64::INFINITY),
        "-inf" => Some(f64::NEG_INFINITY),
        "nan" => Some(f64::NAN),
        _ => text.parse().ok(),
    }
}

/// Human-readable metric value (`inf` for the infinite sentinel).
pub fn format_metric(value: f64) -> String {
    match MetricValue::from(value) {
        MetricValue::Number(v) => format!("{v:.4}"),
        MetricValue::Text(text) => text,
    }
}

mod metric_values {
    use std::collections::BTreeMap;

    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    use super::{parse_metric_text, MetricValue};

    pub fn serialize<S: Serializer>(
        metrics: &BTreeMap<String, f64>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        let encoded: BTreeMap<&str, MetricValue> = metrics
            .iter()
            .map(|(k, v)| (k.as_str(), MetricValue::from(*v)))
            .collect();
        encoded.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<BTreeMap<String, f64>, D::Error> {
        let encoded = BTreeMap::<String, MetricValue>::deserialize(deserializer)?;
        encoded
            .into_iter()
            .map(|(name, value)| {
                let v = match value {
                    MetricValue::Number(v) => v,
                    MetricValue::Text(text) => parse_metric_text(&text).ok_or_else(|| {
                        D::Error::custom(format!("invalid value for metric {name}: {text}"))
                    })?,
                };
                Ok((name, v))
            })
            .collect()
    }
}
