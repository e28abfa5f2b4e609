//! TOML backtest configuration.
//!
//! Every table and field is optional; a missing value takes its default, so
//! an empty file is a valid configuration:
//!
//! ```toml
//! [backtest]
//! initial_capital = 100000.0
//! max_positions = 5
//! allow_short = false
//! history_window = 250
//!
//! [lot]
//! asset_type = "stock"
//! sizing_mode = "fixed"
//! base_lot_size = 100.0
//!
//! [execution]
//! market_price = "close"
//! slippage_rate = 0.001
//! commission_rate = 0.001
//!
//! [analytics]
//! risk_free_rate = 0.02
//! periods_per_year = 252.0
//!
//! [strategy]
//! type = "ma_crossover"
//! short_window = 10
//! long_window = 30
//! lots = 1.0
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tradesim_core::engine::{EngineConfig, EngineConfigError};
use tradesim_core::orders::ExecutionConfig;
use tradesim_core::portfolio::PortfolioConfig;
use tradesim_core::sizing::LotConfig;
use tradesim_core::strategy::{BuyAndHold, MovingAverageCrossover, Strategy, StrategyError};

use crate::metrics::AnalyticsConfig;

/// Errors from loading or validating a configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid engine settings: {0}")]
    Engine(#[from] EngineConfigError),

    #[error("invalid strategy: {0}")]
    Strategy(#[from] StrategyError),

    #[error("invalid analytics settings: {0}")]
    Analytics(String),
}

/// Top-level configuration for one backtest.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BacktestConfig {
    pub backtest: BacktestSection,
    pub lot: LotConfig,
    pub execution: ExecutionConfig,
    pub analytics: AnalyticsConfig,
    pub strategy: StrategyConfig,
}

/// Portfolio-level settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BacktestSection {
    pub initial_capital: f64,
    pub max_positions: usize,
    pub allow_short: bool,
    pub history_window: Option<usize>,
}

impl Default for BacktestSection {
    fn default() -> Self {
        let portfolio = PortfolioConfig::default();
        Self {
            initial_capital: portfolio.initial_capital,
            max_positions: portfolio.max_positions,
            allow_short: portfolio.allow_short,
            history_window: None,
        }
    }
}

/// Which reference strategy to run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StrategyConfig {
    BuyAndHold {
        #[serde(default = "default_lots")]
        lots: f64,
    },
    MaCrossover {
        short_window: usize,
        long_window: usize,
        #[serde(default = "default_lots")]
        lots: f64,
    },
}

fn default_lots() -> f64 {
    1.0
}

impl Default for StrategyConfig {
    fn default() -> Self {
        StrategyConfig::BuyAndHold { lots: 1.0 }
    }
}

impl StrategyConfig {
    /// Instantiate the configured strategy.
    pub fn build(&self) -> Result<Box<dyn Strategy>, StrategyError> {
        match *self {
            StrategyConfig::BuyAndHold { lots } => Ok(Box::new(BuyAndHold::new(lots))),
            StrategyConfig::MaCrossover {
                short_window,
                long_window,
                lots,
            } => Ok(Box::new(MovingAverageCrossover::new(
                short_window,
                long_window,
                lots,
            )?)),
        }
    }
}

impl BacktestConfig {
    /// Parse a configuration from TOML text and validate it.
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a TOML configuration file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml(&text)
    }

    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    /// Engine settings for the core backtester.
    pub fn to_engine_config(&self) -> EngineConfig {
        EngineConfig {
            portfolio: PortfolioConfig {
                initial_capital: self.backtest.initial_capital,
                max_positions: self.backtest.max_positions,
                allow_short: self.backtest.allow_short,
            },
            lot: self.lot.clone(),
            execution: self.execution.clone(),
            history_window: self.backtest.history_window,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.to_engine_config().validate()?;
        let ppy = self.analytics.periods_per_year;
        if !ppy.is_finite() || ppy <= 0.0 {
            return Err(ConfigError::Analytics(format!(
                "periods_per_year must be positive, got {ppy}"
            )));
        }
        if !self.analytics.risk_free_rate.is_finite() {
            return Err(ConfigError::Analytics("risk_free_rate must be finite".into()));
        }
        let confidence = self.analytics.var_confidence;
        if !(confidence > 0.0 && confidence < 1.0) {
            return Err(ConfigError::Analytics(format!(
                "var_confidence must be in (0, 1), got {confidence}"
            )));
        }
        self.strategy.build()?;
        Ok(())
    }

    /// Deterministic content hash identifying this configuration.
    ///
    /// Two configurations with equal field values share a fingerprint.
    pub fn fingerprint(&self) -> String {
        let json = serde_json::to_string(self).unwrap_or_else(|_| format!("{self:?}"));
        blake3::hash(json.as_bytes()).to_hex().to_string()
    }
}
