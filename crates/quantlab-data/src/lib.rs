//! 시장 데이터 계층.
//!
//! 영속 캔들 캐시(`store`), 캐시 기반 제공자(`provider`), 누락 구간
//! 탐색(`missing`), 1분봉 집계(`aggregate`), 합성 데이터 생성기
//! (`synthetic`)를 제공합니다.
//!
//! # 데이터 흐름
//!
//! ```text
//! 요청 → CachedCandleProvider → CandleStore (Postgres/메모리)
//!                     │                ▲
//!                     ▼                │ 일괄 저장
//!             MarketDataProvider ──────┘
//!             (거래소 / SyntheticExchange)
//! ```

pub mod aggregate;
pub mod error;
pub mod missing;
pub mod provider;
pub mod store;
pub mod synthetic;

pub use aggregate::{aggregate_candles, aggregate_with_dynamics, CandleDynamics};
pub use error::DataError;
pub use missing::{expected_count, missing_ranges, TimeRange};
pub use provider::{
    CachedCandleProvider, DownloadState, DownloadStatus, FetchOutcome, FetchStats,
    FLUSH_THRESHOLD,
};
pub use store::{CandleMetadata, CandleStore, InMemoryCandleStore, PostgresCandleStore};
pub use synthetic::{SyntheticExchange, SyntheticMarketGenerator};
