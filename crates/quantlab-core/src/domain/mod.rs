//! 핵심 도메인 타입.

pub mod candle;
pub mod portfolio;
pub mod position;
pub mod risk;
pub mod side;
pub mod timeframe;
pub mod trade;

pub use candle::{Candle, PriceSource};
pub use portfolio::Portfolio;
pub use position::{unrealized_pnl, Position, TrailingState};
pub use risk::{StopLossRule, StopMode, TakeProfitMode, TakeProfitRule, TrailingRule};
pub use side::{ExitReason, Side, SignalKind};
pub use timeframe::Timeframe;
pub use trade::Trade;
