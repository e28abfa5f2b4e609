//! Portfolio manager — cash, bounded position slots, realized P&L.
//!
//! `execute` applies one priced order and reports what happened:
//! - no slot for (symbol, tag): open a position if a slot is free
//! - same direction as the slot: pyramid, re-weighting the average entry
//! - opposite direction: reduce or close, emitting a `Trade`
//!
//! Every rejection leaves cash, positions and trades untouched. After any
//! accepted order `cash >= 0` and `cash + Σ quantity * price == equity`.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::{
    Fill, IdSequence, Order, OrderId, OrderSide, OrderSize, PortfolioSnapshot, Position,
    PositionFill, PositionId, PositionSide, RejectReason, Trade, ValidationError,
};
use crate::orders::CostModel;
use crate::sizing::{lots_to_units, LotConfig};

/// Relative tolerance used to snap a reducing order to a full close.
const CLOSE_TOLERANCE: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PortfolioConfig {
    pub initial_capital: f64,
    pub max_positions: usize,
    pub allow_short: bool,
}

impl Default for PortfolioConfig {
    fn default() -> Self {
        Self {
            initial_capital: 100_000.0,
            max_positions: 5,
            allow_short: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ExecutionOutcome {
    Opened {
        position_id: PositionId,
        units: f64,
        price: f64,
    },
    Added {
        position_id: PositionId,
        units: f64,
        avg_entry_price: f64,
    },
    Reduced {
        position_id: PositionId,
        trade: Trade,
    },
    Closed {
        position_id: PositionId,
        trade: Trade,
    },
    Rejected(RejectReason),
}

impl ExecutionOutcome {
    pub fn is_rejected(&self) -> bool {
        matches!(self, ExecutionOutcome::Rejected(_))
    }

    pub fn trade(&self) -> Option<&Trade> {
        match self {
            ExecutionOutcome::Reduced { trade, .. } | ExecutionOutcome::Closed { trade, .. } => {
                Some(trade)
            }
            _ => None,
        }
    }

    pub fn rejection(&self) -> Option<&RejectReason> {
        match self {
            ExecutionOutcome::Rejected(reason) => Some(reason),
            _ => None,
        }
    }
}

/// Reporting view of one open position at a mark price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionSummary {
    pub position_id: PositionId,
    pub symbol: String,
    pub tag: Option<String>,
    pub side: PositionSide,
    pub units: f64,
    pub avg_entry_price: f64,
    pub mark_price: f64,
    pub market_value: f64,
    pub unrealized_pnl: f64,
}

#[derive(Debug, Clone)]
pub struct PortfolioManager {
    config: PortfolioConfig,
    lot_config: LotConfig,
    cost: CostModel,
    cash: f64,
    positions: BTreeMap<PositionId, Position>,
    ids: IdSequence,
    trades: Vec<Trade>,
    realized_pnl: f64,
    total_commission: f64,
}

impl PortfolioManager {
    pub fn new(config: PortfolioConfig, lot_config: LotConfig, cost: CostModel) -> Self {
        let cash = config.initial_capital;
        Self {
            config,
            lot_config,
            cost,
            cash,
            positions: BTreeMap::new(),
            ids: IdSequence::new(),
            trades: Vec::new(),
            realized_pnl: 0.0,
            total_commission: 0.0,
        }
    }

    // ── Execution ──────────────────────────────────────────────────────

    /// Apply a fill produced by the order manager.
    pub fn apply_fill(&mut self, fill: &Fill) -> ExecutionOutcome {
        self.execute_inner(&fill.order, Some(fill.order_id), fill.price, fill.timestamp)
    }

    /// Apply `order` at `fill_price`.
    pub fn execute(
        &mut self,
        order: &Order,
        fill_price: f64,
        timestamp: DateTime<Utc>,
    ) -> ExecutionOutcome {
        self.execute_inner(order, None, fill_price, timestamp)
    }

    fn execute_inner(
        &mut self,
        order: &Order,
        order_id: Option<OrderId>,
        price: f64,
        timestamp: DateTime<Utc>,
    ) -> ExecutionOutcome {
        let result = self.try_execute(order, order_id, price, timestamp);
        let outcome = result.unwrap_or_else(ExecutionOutcome::Rejected);
        match &outcome {
            ExecutionOutcome::Rejected(reason) => {
                debug!(symbol = %order.symbol, code = reason.code(), %reason, "execution rejected");
            }
            other => {
                debug!(symbol = %order.symbol, price, cash = self.cash, outcome = ?other, "executed");
            }
        }
        debug_assert!(self.cash >= -1e-9, "cash went negative: {}", self.cash);
        debug_assert!(self.positions.len() <= self.config.max_positions);
        outcome
    }

    fn try_execute(
        &mut self,
        order: &Order,
        order_id: Option<OrderId>,
        price: f64,
        timestamp: DateTime<Utc>,
    ) -> Result<ExecutionOutcome, RejectReason> {
        order.validate()?;
        if !price.is_finite() || price <= 0.0 {
            return Err(ValidationError::InvalidFillPrice(price).into());
        }

        let Some((id, pos_side)) = self.find_slot(&order.symbol, order.position_tag.as_deref())
        else {
            let side = match order.side {
                OrderSide::Buy => PositionSide::Long,
                OrderSide::Sell if self.config.allow_short => PositionSide::Short,
                OrderSide::Sell => {
                    return Err(RejectReason::InsufficientPosition {
                        requested: self.requested_units(order),
                        held: 0.0,
                    })
                }
            };
            return self.open(order, order_id, side, price, timestamp);
        };

        if order.side == pos_side.opening_order_side() {
            self.add(id, order, order_id, price, timestamp)
        } else {
            self.reduce(id, order, order_id, price, timestamp)
        }
    }

    fn open(
        &mut self,
        order: &Order,
        order_id: Option<OrderId>,
        side: PositionSide,
        price: f64,
        timestamp: DateTime<Utc>,
    ) -> Result<ExecutionOutcome, RejectReason> {
        let lots = opening_lots(order)?;
        if self.positions.len() >= self.config.max_positions {
            return Err(RejectReason::PositionLimitExceeded {
                max_positions: self.config.max_positions,
            });
        }
        let units = lots_to_units(lots, price, self.cash, &self.lot_config)
            .map_err(ValidationError::from)?;
        let commission = self.cost.commission(price, units);
        settle_opening(&mut self.cash, side, units, price, commission)?;

        let position_id = self.ids.next_position_id();
        self.positions.insert(
            position_id,
            Position {
                position_id,
                symbol: order.symbol.clone(),
                tag: order.position_tag.clone(),
                quantity: side.sign() * units,
                avg_entry_price: price,
                entry_timestamp: timestamp,
                fills: vec![PositionFill {
                    order_id,
                    timestamp,
                    side: order.side,
                    price,
                    units,
                    commission,
                }],
                open_commission: commission,
            },
        );
        self.total_commission += commission;
        Ok(ExecutionOutcome::Opened {
            position_id,
            units,
            price,
        })
    }

    fn add(
        &mut self,
        id: PositionId,
        order: &Order,
        order_id: Option<OrderId>,
        price: f64,
        timestamp: DateTime<Utc>,
    ) -> Result<ExecutionOutcome, RejectReason> {
        let lots = opening_lots(order)?;
        let Some(pos) = self.positions.get_mut(&id) else {
            return Err(missing_slot());
        };
        let units = lots_to_units(lots, price, self.cash, &self.lot_config)
            .map_err(ValidationError::from)?;
        let commission = self.cost.commission(price, units);
        settle_opening(&mut self.cash, pos.side(), units, price, commission)?;
        self.total_commission += commission;

        pos.add_units(units, price);
        pos.open_commission += commission;
        pos.fills.push(PositionFill {
            order_id,
            timestamp,
            side: order.side,
            price,
            units,
            commission,
        });
        Ok(ExecutionOutcome::Added {
            position_id: id,
            units,
            avg_entry_price: pos.avg_entry_price,
        })
    }

    fn reduce(
        &mut self,
        id: PositionId,
        order: &Order,
        order_id: Option<OrderId>,
        price: f64,
        timestamp: DateTime<Utc>,
    ) -> Result<ExecutionOutcome, RejectReason> {
        let Some(pos) = self.positions.get_mut(&id) else {
            return Err(missing_slot());
        };
        let held = pos.units();
        let side = pos.side();
        let requested = match order.size {
            OrderSize::All => held,
            OrderSize::Lots(lots) => lots * self.lot_config.base_lot_size,
        };
        let tolerance = CLOSE_TOLERANCE * held.max(1.0);
        if requested > held + tolerance {
            return Err(RejectReason::InsufficientPosition { requested, held });
        }
        let full_close = requested >= held - tolerance;
        let units = if full_close { held } else { requested };

        let commission = self.cost.commission(price, units);
        match side {
            PositionSide::Long => self.cash += units * price - commission,
            PositionSide::Short => {
                let required = units * price + commission;
                if required > self.cash {
                    return Err(RejectReason::InsufficientFunds {
                        required,
                        available: self.cash,
                    });
                }
                self.cash -= required;
            }
        }
        self.total_commission += commission;

        let allocated_entry = pos.open_commission * (units / held);
        let trade = Trade::new(
            id,
            pos.symbol.clone(),
            side,
            pos.avg_entry_price,
            price,
            units,
            pos.entry_timestamp,
            timestamp,
            allocated_entry + commission,
            !full_close,
        );

        if full_close {
            self.positions.remove(&id);
        } else {
            pos.open_commission -= allocated_entry;
            pos.quantity = side.sign() * (held - units);
            pos.fills.push(PositionFill {
                order_id,
                timestamp,
                side: order.side,
                price,
                units,
                commission,
            });
        }
        self.realized_pnl += trade.pnl;
        self.trades.push(trade.clone());

        Ok(if full_close {
            ExecutionOutcome::Closed {
                position_id: id,
                trade,
            }
        } else {
            ExecutionOutcome::Reduced {
                position_id: id,
                trade,
            }
        })
    }

    fn find_slot(&self, symbol: &str, tag: Option<&str>) -> Option<(PositionId, PositionSide)> {
        self.positions
            .values()
            .find(|p| p.symbol == symbol && p.tag.as_deref() == tag)
            .map(|p| (p.position_id, p.side()))
    }

    fn requested_units(&self, order: &Order) -> f64 {
        match order.size {
            OrderSize::Lots(lots) => lots * self.lot_config.base_lot_size,
            OrderSize::All => 0.0,
        }
    }

    // ── Valuation ──────────────────────────────────────────────────────

    /// Σ quantity * price over open positions; unquoted symbols are marked
    /// at their average entry price.
    pub fn positions_value(&self, prices: &HashMap<String, f64>) -> f64 {
        self.positions
            .values()
            .map(|p| p.market_value(mark_price(p, prices)))
            .sum()
    }

    /// Cash plus mark-to-market value of all open positions.
    pub fn get_portfolio_value(&self, prices: &HashMap<String, f64>) -> f64 {
        self.cash + self.positions_value(prices)
    }

    pub fn unrealized_pnl(&self, prices: &HashMap<String, f64>) -> f64 {
        self.positions
            .values()
            .map(|p| p.unrealized_pnl(mark_price(p, prices)))
            .sum()
    }

    pub fn snapshot(
        &self,
        timestamp: DateTime<Utc>,
        prices: &HashMap<String, f64>,
    ) -> PortfolioSnapshot {
        PortfolioSnapshot::new(
            timestamp,
            self.cash,
            self.positions_value(prices),
            self.positions.len(),
            self.realized_pnl,
        )
    }

    pub fn positions_summary(&self, prices: &HashMap<String, f64>) -> Vec<PositionSummary> {
        self.positions
            .values()
            .map(|p| {
                let mark = mark_price(p, prices);
                PositionSummary {
                    position_id: p.position_id,
                    symbol: p.symbol.clone(),
                    tag: p.tag.clone(),
                    side: p.side(),
                    units: p.units(),
                    avg_entry_price: p.avg_entry_price,
                    mark_price: mark,
                    market_value: p.market_value(mark),
                    unrealized_pnl: p.unrealized_pnl(mark),
                }
            })
            .collect()
    }

    // ── Accessors ──────────────────────────────────────────────────────

    pub fn cash(&self) -> f64 {
        self.cash
    }

    pub fn initial_capital(&self) -> f64 {
        self.config.initial_capital
    }

    pub fn config(&self) -> &PortfolioConfig {
        &self.config
    }

    pub fn lot_config(&self) -> &LotConfig {
        &self.lot_config
    }

    pub fn positions(&self) -> impl Iterator<Item = &Position> {
        self.positions.values()
    }

    pub fn position(&self, id: PositionId) -> Option<&Position> {
        self.positions.get(&id)
    }

    pub fn open_position_count(&self) -> usize {
        self.positions.len()
    }

    pub fn get_available_slots(&self) -> usize {
        self.config.max_positions.saturating_sub(self.positions.len())
    }

    pub fn can_open_new_position(&self) -> bool {
        self.get_available_slots() > 0
    }

    pub fn trades(&self) -> &[Trade] {
        &self.trades
    }

    pub fn realized_pnl(&self) -> f64 {
        self.realized_pnl
    }

    pub fn total_commission(&self) -> f64 {
        self.total_commission
    }

    /// Drop all state and return to the initial capital.
    pub fn reset(&mut self) {
        self.cash = self.config.initial_capital;
        self.positions.clear();
        self.ids = IdSequence::new();
        self.trades.clear();
        self.realized_pnl = 0.0;
        self.total_commission = 0.0;
    }
}

/// Move cash for a position-growing fill, or reject without touching it.
fn settle_opening(
    cash: &mut f64,
    side: PositionSide,
    units: f64,
    price: f64,
    commission: f64,
) -> Result<(), RejectReason> {
    match side {
        PositionSide::Long => {
            let required = units * price + commission;
            if required > *cash {
                return Err(RejectReason::InsufficientFunds {
                    required,
                    available: *cash,
                });
            }
            *cash -= required;
        }
        PositionSide::Short => *cash += units * price - commission,
    }
    Ok(())
}

fn missing_slot() -> RejectReason {
    RejectReason::InsufficientPosition {
        requested: 0.0,
        held: 0.0,
    }
}

fn opening_lots(order: &Order) -> Result<f64, RejectReason> {
    match order.size {
        OrderSize::Lots(lots) => Ok(lots),
        OrderSize::All => Err(ValidationError::UnsupportedShape(
            "close-all order cannot open or grow a position".into(),
        )
        .into()),
    }
}

fn mark_price(position: &Position, prices: &HashMap<String, f64>) -> f64 {
    prices
        .get(&position.symbol)
        .copied()
        .filter(|p| p.is_finite())
        .unwrap_or(position.avg_entry_price)
}
