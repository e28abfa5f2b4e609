//! Lot configuration and the lots → units conversion.
//!
//! Two modes:
//! 1. **Fixed**: `units = lots * base_lot_size`, independent of price and cash
//! 2. **Variable**: units target `cash * capital_percentage` of notional, floored
//!    to the configured granularity and clamped to `[min_lot_size, max_lot_size]`

use serde::{Deserialize, Serialize};

use super::SizingError;

/// Tolerance added before flooring so that exact multiples survive
/// floating-point division (e.g. `0.3 / 0.1`).
const FLOOR_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetType {
    Stock,
    Crypto,
    Forex,
    Custom,
}

impl AssetType {
    /// Conventional units per standard lot.
    pub fn standard_lot_units(self) -> f64 {
        match self {
            AssetType::Stock => 100.0,
            AssetType::Crypto => 1.0,
            AssetType::Forex => 100_000.0,
            AssetType::Custom => 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SizingMode {
    Fixed,
    Variable,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LotConfig {
    pub asset_type: AssetType,
    pub sizing_mode: SizingMode,
    /// Units per lot.
    pub base_lot_size: f64,
    /// Fraction of cash targeted per order in variable mode.
    pub capital_percentage: f64,
    /// Lower unit bound applied in variable mode.
    pub min_lot_size: f64,
    /// Upper unit bound applied in variable mode.
    pub max_lot_size: f64,
    /// Unit rounding step.
    pub granularity: f64,
}

impl Default for LotConfig {
    fn default() -> Self {
        Self {
            asset_type: AssetType::Custom,
            sizing_mode: SizingMode::Fixed,
            base_lot_size: 1.0,
            capital_percentage: 0.1,
            min_lot_size: 0.0,
            max_lot_size: f64::MAX,
            granularity: 1e-8,
        }
    }
}

impl LotConfig {
    /// Equities: 100-share lots, whole shares.
    pub fn stock() -> Self {
        Self {
            asset_type: AssetType::Stock,
            base_lot_size: AssetType::Stock.standard_lot_units(),
            min_lot_size: 1.0,
            max_lot_size: 1_000_000.0,
            granularity: 1.0,
            ..Self::default()
        }
    }

    /// Crypto: one coin per lot, 0.0001 coin steps.
    pub fn crypto() -> Self {
        Self {
            asset_type: AssetType::Crypto,
            base_lot_size: AssetType::Crypto.standard_lot_units(),
            min_lot_size: 0.0001,
            max_lot_size: 1_000.0,
            granularity: 0.0001,
            ..Self::default()
        }
    }

    /// Forex: 100k-unit standard lots, micro-lot steps.
    pub fn forex() -> Self {
        Self {
            asset_type: AssetType::Forex,
            base_lot_size: AssetType::Forex.standard_lot_units(),
            min_lot_size: 1_000.0,
            max_lot_size: 10_000_000.0,
            granularity: 1_000.0,
            ..Self::default()
        }
    }

    pub fn with_mode(mut self, mode: SizingMode) -> Self {
        self.sizing_mode = mode;
        self
    }

    pub fn with_capital_percentage(mut self, pct: f64) -> Self {
        self.capital_percentage = pct;
        self
    }

    pub fn validate(&self) -> Result<(), SizingError> {
        if !(self.base_lot_size.is_finite() && self.base_lot_size > 0.0) {
            return Err(SizingError::InvalidConfig(format!(
                "base_lot_size must be positive, got {}",
                self.base_lot_size
            )));
        }
        if !(self.granularity.is_finite() && self.granularity > 0.0) {
            return Err(SizingError::InvalidConfig(format!(
                "granularity must be positive, got {}",
                self.granularity
            )));
        }
        if !(self.capital_percentage > 0.0 && self.capital_percentage <= 1.0) {
            return Err(SizingError::InvalidConfig(format!(
                "capital_percentage must be in (0, 1], got {}",
                self.capital_percentage
            )));
        }
        if !(self.min_lot_size >= 0.0 && self.min_lot_size <= self.max_lot_size) {
            return Err(SizingError::InvalidConfig(format!(
                "lot bounds must satisfy 0 <= min ({}) <= max ({})",
                self.min_lot_size, self.max_lot_size
            )));
        }
        Ok(())
    }
}

/// Convert a lot count into units for an order executing at `price` with
/// `cash` available.
pub fn lots_to_units(
    lots: f64,
    price: f64,
    cash: f64,
    config: &LotConfig,
) -> Result<f64, SizingError> {
    if !lots.is_finite() || lots <= 0.0 {
        return Err(SizingError::NonPositiveLots(lots));
    }
    let units = match config.sizing_mode {
        SizingMode::Fixed => lots * config.base_lot_size,
        SizingMode::Variable => {
            if !price.is_finite() || price <= 0.0 {
                return Err(SizingError::InvalidPrice(price));
            }
            let target_notional = cash.max(0.0) * config.capital_percentage;
            let mut floored = round_to_granularity(target_notional / price, config);
            if floored * price > target_notional {
                // steps / (1 / g) is exact for decimal steps such as 0.1; if the
                // notional still overshoots, the floor tolerance rounded up a step.
                let steps = (floored / config.granularity).round();
                let per_unit = config.granularity.recip();
                floored = steps / per_unit;
                if floored * price > target_notional {
                    floored = ((steps - 1.0) / per_unit).max(0.0);
                }
            }
            floored.clamp(config.min_lot_size, config.max_lot_size)
        }
    };
    if !units.is_finite() || units <= 0.0 {
        return Err(SizingError::NonPositiveUnits(units));
    }
    Ok(units)
}

/// Floor `units` to a whole number of granularity steps.
pub fn round_to_granularity(units: f64, config: &LotConfig) -> f64 {
    if config.granularity <= 0.0 {
        return units;
    }
    let steps = (units / config.granularity + FLOOR_EPSILON).floor();
    steps * config.granularity
}

/// Express a unit count in lots, for reporting.
pub fn units_to_lots(units: f64, config: &LotConfig) -> f64 {
    if config.base_lot_size <= 0.0 {
        return 0.0;
    }
    units / config.base_lot_size
}
