//! Domain types for the simulation core.

pub mod bar;
pub mod fill;
pub mod ids;
pub mod order;
pub mod position;
pub mod rejection;
pub mod snapshot;
pub mod trade;

pub use bar::{BarError, MarketBar};
pub use fill::Fill;
pub use ids::{IdSequence, OrderId, PositionId};
pub use order::{Order, OrderKind, OrderSide, OrderSize};
pub use position::{Position, PositionFill, PositionSide};
pub use rejection::{RejectReason, ValidationError};
pub use snapshot::PortfolioSnapshot;
pub use trade::Trade;
