//! 캔들 캐시 저장소 추상화.
//!
//! (symbol, timeframe, timestamp)를 키로 하는 영속 정렬 집합입니다.
//! 싱글턴이 아니라 명시적 의존성으로 주입되며, 테스트는 인메모리
//! 구현을 사용합니다.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use quantlab_core::{Candle, Timeframe};

use crate::error::Result;

pub use memory::InMemoryCandleStore;
pub use postgres::PostgresCandleStore;

/// (symbol, timeframe)별 캐시 메타데이터.
#[derive(Debug, Clone, PartialEq)]
pub struct CandleMetadata {
    pub symbol: String,
    pub timeframe: Timeframe,
    /// 가장 오래된 캔들 시각
    pub first_time: DateTime<Utc>,
    /// 가장 최근 캔들 시각
    pub last_time: DateTime<Utc>,
    /// 캔들 수
    pub candle_count: i64,
    /// 마지막 저장 시각
    pub updated_at: DateTime<Utc>,
}

/// 캔들 캐시 저장소 계약.
///
/// `upsert_many`는 (symbol, timeframe, timestamp) 기준으로 멱등이며,
/// 저장할 때마다 메타데이터(min/max/count)를 함께 갱신합니다.
#[async_trait]
pub trait CandleStore: Send + Sync {
    /// `[start, end]` 구간 조회 (시간 오름차순, 중복 없음).
    async fn read_range(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Candle>>;

    /// 일괄 업서트. 새로 삽입된 수를 반환합니다.
    async fn upsert_many(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        candles: &[Candle],
    ) -> Result<usize>;

    /// 부분 필터 삭제 (None이면 해당 축 전체).
    async fn delete_many(
        &self,
        symbol: Option<&str>,
        timeframe: Option<Timeframe>,
    ) -> Result<u64>;

    /// (symbol, timeframe)의 캔들 수.
    async fn count(&self, symbol: &str, timeframe: Timeframe) -> Result<i64>;

    /// 메타데이터 조회 (저장된 캔들이 없으면 None).
    async fn metadata(
        &self,
        symbol: &str,
        timeframe: Timeframe,
    ) -> Result<Option<CandleMetadata>>;
}
