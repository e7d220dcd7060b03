//! 거래소 중립 시세 제공자 인터페이스.
//!
//! 구체 거래소 SDK는 이 저장소의 범위 밖이며, 읽기 인터페이스만
//! 정의합니다. 구간 다운로드는 `since = 마지막 ts + Δ`로 페이지를
//! 넘기고 페이지 사이에 100ms 이상 대기합니다.

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use quantlab_core::{Candle, Timeframe};
use std::time::Duration;
use tracing::debug;

use crate::error::ExchangeError;
use crate::retry::{with_retry, RetryConfig};

/// 요청당 최대 캔들 수.
pub const MAX_FETCH_LIMIT: usize = 200;

/// 페이지 사이 최소 대기 시간.
pub const PAGE_DELAY: Duration = Duration::from_millis(100);

/// 기본 요청 타임아웃 (초). 구현체가 HTTP 클라이언트에 적용합니다.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// 거래소 중립 시세 읽기 인터페이스.
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// 제공자 이름 (로그/통계용).
    fn name(&self) -> &str;

    /// OHLCV 조회.
    ///
    /// `since` 이후(포함)의 캔들을 시간 오름차순으로 최대 `limit`개
    /// 반환합니다. `limit`은 [`MAX_FETCH_LIMIT`] 이하로 절단됩니다.
    async fn fetch_ohlcv(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        since: Option<DateTime<Utc>>,
        limit: usize,
    ) -> Result<Vec<Candle>, ExchangeError>;

    /// 구간 전체 다운로드 (페이지네이션).
    ///
    /// `[start, end]` 구간의 캔들을 배치 단위로 받아 `on_batch`에
    /// 전달하고 전체를 반환합니다. 일시적 오류는 배치 단위로
    /// 재시도합니다.
    async fn fetch_historical_ohlcv(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        on_batch: &mut (dyn for<'b> FnMut(&'b [Candle]) + Send),
    ) -> Result<Vec<Candle>, ExchangeError> {
        let retry = RetryConfig::default();
        let step = ChronoDuration::milliseconds(timeframe.duration_ms());
        let mut since = start;
        let mut all: Vec<Candle> = Vec::new();

        loop {
            let batch = with_retry(&retry, || {
                self.fetch_ohlcv(symbol, timeframe, Some(since), MAX_FETCH_LIMIT)
            })
            .await?;
            if batch.is_empty() {
                break;
            }

            let last_ts = batch.last().map(|c| c.open_time).unwrap_or(end);
            let filtered: Vec<Candle> = batch
                .into_iter()
                .filter(|c| c.open_time >= start && c.open_time <= end)
                .collect();
            if !filtered.is_empty() {
                on_batch(&filtered);
                all.extend(filtered);
            }

            if last_ts >= end {
                break;
            }
            since = last_ts + step;

            debug!(
                symbol = %symbol,
                loaded = all.len(),
                next_since = %since,
                "다음 페이지 요청 대기"
            );
            tokio::time::sleep(PAGE_DELAY).await;
        }

        Ok(all)
    }
}
