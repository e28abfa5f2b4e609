//! Order manager — FIFO queue of working orders.
//!
//! - `submit` validates and enqueues; invalid orders come back as `Rejected`
//! - `process(bar)` fills every triggered order in submission order and keeps
//!   the rest queued in their original relative order
//! - an audit trail records every lifecycle transition
//!
//! The order manager prices fills but does not size them: units and
//! commission depend on portfolio cash and are applied by the portfolio.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::{
    Fill, IdSequence, MarketBar, Order, OrderId, OrderKind, OrderSide, RejectReason,
};

use super::cost_model::{CostModel, ExecutionConfig};
use super::trigger::{check_trigger, TriggerResult};

#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    Accepted(OrderId),
    Rejected(RejectReason),
}

impl SubmitOutcome {
    pub fn order_id(&self) -> Option<OrderId> {
        match self {
            SubmitOutcome::Accepted(id) => Some(*id),
            SubmitOutcome::Rejected(_) => None,
        }
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self, SubmitOutcome::Accepted(_))
    }
}

/// An accepted order waiting for a trigger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingOrder {
    pub id: OrderId,
    pub order: Order,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    Pending,
    Filled,
    Cancelled,
    Rejected { code: String },
}

/// One lifecycle transition in the audit trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderEvent {
    /// `None` for orders rejected at submission.
    pub order_id: Option<OrderId>,
    pub status: OrderStatus,
    pub timestamp: DateTime<Utc>,
    pub price: Option<f64>,
}

/// Aggregate counters over the manager's lifetime.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrderStats {
    pub submitted: usize,
    pub accepted: usize,
    pub rejected: usize,
    pub filled: usize,
    pub cancelled: usize,
    pub pending: usize,
    pub buy_orders: usize,
    pub sell_orders: usize,
    pub market_orders: usize,
    pub limit_orders: usize,
}

impl OrderStats {
    /// Filled orders as a fraction of accepted orders.
    pub fn fill_rate(&self) -> f64 {
        if self.accepted == 0 {
            return 0.0;
        }
        self.filled as f64 / self.accepted as f64
    }
}

#[derive(Debug, Clone)]
pub struct OrderManager {
    config: ExecutionConfig,
    cost: CostModel,
    ids: IdSequence,
    queue: VecDeque<PendingOrder>,
    history: Vec<OrderEvent>,
    stats: OrderStats,
}

impl OrderManager {
    pub fn new(config: ExecutionConfig) -> Self {
        let cost = config.cost_model();
        Self {
            config,
            cost,
            ids: IdSequence::new(),
            queue: VecDeque::new(),
            history: Vec::new(),
            stats: OrderStats::default(),
        }
    }

    pub fn config(&self) -> &ExecutionConfig {
        &self.config
    }

    pub fn cost_model(&self) -> CostModel {
        self.cost
    }

    /// Validate and enqueue an order.
    pub fn submit(&mut self, order: Order) -> SubmitOutcome {
        self.stats.submitted += 1;
        match order.side {
            OrderSide::Buy => self.stats.buy_orders += 1,
            OrderSide::Sell => self.stats.sell_orders += 1,
        }
        match order.kind {
            OrderKind::Market => self.stats.market_orders += 1,
            OrderKind::Limit { .. } => self.stats.limit_orders += 1,
        }

        if let Err(err) = order.validate() {
            let reason = RejectReason::from(err);
            debug!(code = reason.code(), %reason, "order rejected at submission");
            self.stats.rejected += 1;
            self.history.push(OrderEvent {
                order_id: None,
                status: OrderStatus::Rejected {
                    code: reason.code().to_string(),
                },
                timestamp: order.timestamp,
                price: order.limit_price(),
            });
            return SubmitOutcome::Rejected(reason);
        }

        let id = self.ids.next_order_id();
        self.stats.accepted += 1;
        self.history.push(OrderEvent {
            order_id: Some(id),
            status: OrderStatus::Pending,
            timestamp: order.timestamp,
            price: order.limit_price(),
        });
        self.queue.push_back(PendingOrder { id, order });
        SubmitOutcome::Accepted(id)
    }

    /// Fill every order that triggers on `bar`, in FIFO order.
    pub fn process(&mut self, bar: &MarketBar) -> Vec<Fill> {
        let mut fills = Vec::new();
        let mut still_working = VecDeque::with_capacity(self.queue.len());

        while let Some(pending) = self.queue.pop_front() {
            if pending.order.symbol != bar.symbol {
                still_working.push_back(pending);
                continue;
            }
            match check_trigger(&pending.order, bar, self.config.market_price) {
                TriggerResult::NoTrigger => still_working.push_back(pending),
                TriggerResult::Fill { reference_price } => {
                    let price = self.fill_price(&pending.order, reference_price);
                    debug!(order_id = %pending.id, price, "order filled");
                    self.stats.filled += 1;
                    self.history.push(OrderEvent {
                        order_id: Some(pending.id),
                        status: OrderStatus::Filled,
                        timestamp: bar.timestamp,
                        price: Some(price),
                    });
                    fills.push(Fill {
                        order_id: pending.id,
                        order: pending.order,
                        price,
                        reference_price,
                        timestamp: bar.timestamp,
                    });
                }
            }
        }

        self.queue = still_working;
        fills
    }

    /// Cancel a working order. Returns false if it is not pending.
    pub fn cancel(&mut self, id: OrderId, timestamp: DateTime<Utc>) -> bool {
        let Some(idx) = self.queue.iter().position(|p| p.id == id) else {
            return false;
        };
        self.queue.remove(idx);
        self.record_cancel(id, timestamp);
        true
    }

    /// Cancel every working order, returning how many were cancelled.
    pub fn cancel_all(&mut self, timestamp: DateTime<Utc>) -> usize {
        let ids: Vec<OrderId> = self.queue.drain(..).map(|p| p.id).collect();
        for id in &ids {
            self.record_cancel(*id, timestamp);
        }
        ids.len()
    }

    pub fn pending(&self) -> impl Iterator<Item = &PendingOrder> {
        self.queue.iter()
    }

    pub fn pending_count(&self) -> usize {
        self.queue.len()
    }

    pub fn history(&self) -> &[OrderEvent] {
        &self.history
    }

    pub fn statistics(&self) -> OrderStats {
        OrderStats {
            pending: self.queue.len(),
            ..self.stats.clone()
        }
    }

    /// Reclassify a triggered order the portfolio refused to execute:
    /// it counts as rejected, not filled.
    pub fn record_execution_rejection(
        &mut self,
        id: OrderId,
        reason: &RejectReason,
        timestamp: DateTime<Utc>,
    ) {
        debug!(order_id = %id, code = reason.code(), %reason, "fill rejected by portfolio");
        self.stats.filled = self.stats.filled.saturating_sub(1);
        self.stats.rejected += 1;
        self.history.push(OrderEvent {
            order_id: Some(id),
            status: OrderStatus::Rejected {
                code: reason.code().to_string(),
            },
            timestamp,
            price: None,
        });
    }

    fn fill_price(&self, order: &Order, reference_price: f64) -> f64 {
        match order.kind {
            OrderKind::Market => self.cost.apply_slippage(reference_price, order.side),
            OrderKind::Limit { .. } if self.config.slip_limit_orders => {
                self.cost.apply_slippage(reference_price, order.side)
            }
            OrderKind::Limit { .. } => reference_price,
        }
    }

    fn record_cancel(&mut self, id: OrderId, timestamp: DateTime<Utc>) {
        self.stats.cancelled += 1;
        self.history.push(OrderEvent {
            order_id: Some(id),
            status: OrderStatus::Cancelled,
            timestamp,
            price: None,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ValidationError;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap()
    }

    fn bar(day: i64, high: f64, low: f64, close: f64) -> MarketBar {
        MarketBar::new(
            "SPY",
            t0() + Duration::days(day),
            close,
            high,
            low,
            close,
            1_000.0,
        )
    }

    #[test]
    fn market_order_fills_at_close_same_bar() {
        let mut om = OrderManager::new(ExecutionConfig::frictionless());
        let outcome = om.submit(Order::market("SPY", OrderSide::Buy, 1.0, t0()));
        assert!(outcome.is_accepted());

        let fills = om.process(&bar(0, 101.0, 99.0, 100.0));
        assert_eq!(fills.len(), 1);
        assert_eq!(fills[0].price, 100.0);
        assert_eq!(om.pending_count(), 0);
    }

    #[test]
    fn market_order_pays_slippage() {
        let mut om = OrderManager::new(ExecutionConfig {
            slippage_rate: 0.01,
            ..ExecutionConfig::frictionless()
        });
        om.submit(Order::market("SPY", OrderSide::Buy, 1.0, t0()));
        let fills = om.process(&bar(0, 101.0, 99.0, 100.0));
        assert!((fills[0].price - 101.0).abs() < 1e-10);
        assert!((fills[0].slippage_per_unit() - 1.0).abs() < 1e-10);
    }

    #[test]
    fn limit_buy_waits_then_fills_at_limit() {
        let mut om = OrderManager::new(ExecutionConfig::realistic());
        om.submit(Order::limit("SPY", OrderSide::Buy, 1.0, 95.0, t0()));

        assert!(om.process(&bar(0, 99.0, 96.0, 97.0)).is_empty());
        assert_eq!(om.pending_count(), 1);

        let fills = om.process(&bar(1, 97.0, 94.0, 96.0));
        assert_eq!(fills.len(), 1);
        assert_eq!(fills[0].price, 95.0);
    }

    #[test]
    fn limit_slippage_is_opt_in() {
        let mut om = OrderManager::new(ExecutionConfig {
            slippage_rate: 0.01,
            slip_limit_orders: true,
            ..ExecutionConfig::frictionless()
        });
        om.submit(Order::limit("SPY", OrderSide::Sell, 1.0, 100.0, t0()));
        let fills = om.process(&bar(0, 101.0, 98.0, 99.0));
        assert!((fills[0].price - 99.0).abs() < 1e-10);
    }

    #[test]
    fn triggered_orders_fill_in_fifo_order() {
        let mut om = OrderManager::new(ExecutionConfig::frictionless());
        let a = om.submit(Order::limit("SPY", OrderSide::Buy, 1.0, 90.0, t0()));
        let b = om.submit(Order::market("SPY", OrderSide::Buy, 1.0, t0()));
        let c = om.submit(Order::limit("SPY", OrderSide::Buy, 1.0, 98.0, t0()));

        let fills = om.process(&bar(0, 101.0, 97.0, 100.0));
        let ids: Vec<_> = fills.iter().map(|f| f.order_id).collect();
        assert_eq!(ids, vec![b.order_id().unwrap(), c.order_id().unwrap()]);

        let still: Vec<_> = om.pending().map(|p| p.id).collect();
        assert_eq!(still, vec![a.order_id().unwrap()]);
    }

    #[test]
    fn orders_ignore_bars_of_other_symbols() {
        let mut om = OrderManager::new(ExecutionConfig::frictionless());
        om.submit(Order::market("QQQ", OrderSide::Buy, 1.0, t0()));
        assert!(om.process(&bar(0, 101.0, 99.0, 100.0)).is_empty());
        assert_eq!(om.pending_count(), 1);
    }

    #[test]
    fn invalid_order_is_rejected_not_queued() {
        let mut om = OrderManager::new(ExecutionConfig::frictionless());
        let outcome = om.submit(Order::market("SPY", OrderSide::Buy, -2.0, t0()));
        assert_eq!(
            outcome,
            SubmitOutcome::Rejected(RejectReason::Validation(ValidationError::InvalidLots(
                -2.0
            )))
        );
        assert_eq!(om.pending_count(), 0);
        assert_eq!(om.statistics().rejected, 1);
    }

    #[test]
    fn cancel_removes_working_order() {
        let mut om = OrderManager::new(ExecutionConfig::frictionless());
        let id = om
            .submit(Order::limit("SPY", OrderSide::Buy, 1.0, 50.0, t0()))
            .order_id()
            .unwrap();
        om.submit(Order::limit("SPY", OrderSide::Buy, 1.0, 40.0, t0()));

        assert!(om.cancel(id, t0()));
        assert!(!om.cancel(id, t0()));
        assert_eq!(om.pending_count(), 1);
        assert_eq!(om.cancel_all(t0()), 1);
        assert_eq!(om.pending_count(), 0);
        assert_eq!(om.statistics().cancelled, 2);
    }

    #[test]
    fn statistics_track_lifecycle() {
        let mut om = OrderManager::new(ExecutionConfig::frictionless());
        om.submit(Order::market("SPY", OrderSide::Buy, 1.0, t0()));
        om.submit(Order::limit("SPY", OrderSide::Sell, 1.0, 200.0, t0()));
        om.submit(Order::market("SPY", OrderSide::Sell, 0.0, t0()));
        om.process(&bar(0, 101.0, 99.0, 100.0));

        let stats = om.statistics();
        assert_eq!(stats.submitted, 3);
        assert_eq!(stats.accepted, 2);
        assert_eq!(stats.rejected, 1);
        assert_eq!(stats.filled, 1);
        assert_eq!(stats.pending, 1);
        assert_eq!(stats.buy_orders, 1);
        assert_eq!(stats.sell_orders, 2);
        assert_eq!(stats.limit_orders, 1);
        assert!((stats.fill_rate() - 0.5).abs() < 1e-10);
        assert_eq!(om.history().len(), 4);
    }

    #[test]
    fn execution_rejection_moves_fill_to_rejected() {
        let mut om = OrderManager::new(ExecutionConfig::frictionless());
        om.submit(Order::market("SPY", OrderSide::Buy, 1.0, t0()));
        let fills = om.process(&bar(0, 101.0, 99.0, 100.0));
        let reason = RejectReason::InsufficientFunds {
            required: 100.0,
            available: 10.0,
        };
        om.record_execution_rejection(fills[0].order_id, &reason, t0());

        let stats = om.statistics();
        assert_eq!(stats.filled, 0);
        assert_eq!(stats.rejected, 1);
        assert_eq!(stats.fill_rate(), 0.0);
        assert_eq!(
            om.history().last().map(|e| e.status.clone()),
            Some(OrderStatus::Rejected {
                code: "INSUFFICIENT_FUNDS".into()
            })
        );
    }
}
