//! 백테스팅 엔진 핵심 도메인 크레이트.
//!
//! 캔들, 타임프레임, 포지션, 거래, 포트폴리오 등 파이프라인 전체가
//! 공유하는 값 타입을 정의합니다. 이 크레이트는 I/O를 수행하지 않습니다.

pub mod domain;
pub mod progress;

pub use domain::{
    unrealized_pnl, Candle, ExitReason, Portfolio, Position, PriceSource, Side, SignalKind,
    StopLossRule, StopMode, TakeProfitMode, TakeProfitRule, Timeframe, Trade, TrailingRule,
    TrailingState,
};
pub use progress::{DownloadEvent, DownloadEventKind, ProgressEvent};
