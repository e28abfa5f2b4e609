//! Order handling: execution settings, trigger rules and the order manager.

pub mod cost_model;
pub mod manager;
pub mod trigger;

pub use cost_model::{CostModel, ExecutionConfig, MarketPriceBasis};
pub use manager::{OrderEvent, OrderManager, OrderStats, OrderStatus, PendingOrder, SubmitOutcome};
pub use trigger::{check_trigger, TriggerResult};
