//! 캐시 기반 캔들 제공자.
//!
//! "구간 [t₀, t₁]의 1분봉을 달라"는 요청을 최소한의 API 호출로
//! 처리합니다.
//!
//! # 동작 흐름
//!
//! ```text
//! 요청 (symbol, timeframe, start, end)
//!         │
//!         ▼
//! ┌─────────────────────┐
//! │ 1. 심볼별 단일 다운로드 락 │ ← 같은 심볼은 한 번에 하나만
//! └──────────┬──────────┘
//!            ▼
//! ┌─────────────────────┐
//! │ 2. 캐시 조회 + 누락 구간 │
//! └──────────┬──────────┘
//!      누락 없음 │ 누락 있음
//!            │      ▼
//!            │ ┌─────────────────────────┐
//!            │ │ 3. 거래소 페이지 다운로드    │ ← 배치 ≤ 200, 간격 ≥ 100ms
//!            │ │ 4. 버퍼 ≥ 1000 → 일괄 저장 │
//!            │ └──────────┬──────────────┘
//!            ▼            ▼
//!      ┌─────────────────────┐
//!      │ 5. 전체 구간 재조회 반환 │ ← 정렬·중복 제거 보장
//!      └─────────────────────┘
//! ```
//!
//! 캐시를 읽을 수 없으면 거래소 직접 조회로 폴백하고, 쓰기 실패는
//! 경고만 남기고 계속 진행합니다 (호출자는 캔들을 이미 가짐).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use quantlab_core::{Candle, Timeframe};
use quantlab_exchange::{with_retry, MarketDataProvider, RetryConfig, MAX_FETCH_LIMIT, PAGE_DELAY};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::error::{DataError, Result};
use crate::missing::{expected_count, missing_ranges, TimeRange};
use crate::store::CandleStore;

/// 버퍼가 이 수를 넘으면 저장소에 일괄 기록합니다.
pub const FLUSH_THRESHOLD: usize = 1_000;

/// 조회 통계.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchStats {
    /// 캐시에서 읽은 수
    pub from_cache: usize,
    /// API에서 받은 수
    pub from_api: usize,
    /// 캐시에 새로 저장한 수
    pub saved_to_cache: usize,
    /// 전체 소요 시간 (밀리초)
    pub total_time_ms: u64,
    /// 캐시 미사용 여부 (폴백 포함)
    pub cache_bypassed: bool,
}

/// 조회 결과.
#[derive(Debug, Clone)]
pub struct FetchOutcome {
    /// 정렬·중복 제거된 캔들
    pub candles: Vec<Candle>,
    /// 통계
    pub stats: FetchStats,
}

/// 다운로드 상태.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadState {
    Running,
    Completed,
    Failed,
}

/// 심볼별 다운로드 현황.
#[derive(Debug, Clone)]
pub struct DownloadStatus {
    pub state: DownloadState,
    pub loaded: usize,
    pub total: Option<usize>,
    pub message: String,
}

/// 캐시 기반 캔들 제공자.
pub struct CachedCandleProvider {
    store: Option<Arc<dyn CandleStore>>,
    exchange: Arc<dyn MarketDataProvider>,
    /// 심볼별 단일 다운로드 락
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    /// 심볼별 다운로드 현황 (조회용)
    statuses: std::sync::Mutex<HashMap<String, DownloadStatus>>,
}

impl CachedCandleProvider {
    /// 캐시 저장소와 거래소로 제공자를 생성합니다.
    pub fn new(store: Arc<dyn CandleStore>, exchange: Arc<dyn MarketDataProvider>) -> Self {
        Self {
            store: Some(store),
            exchange,
            locks: Mutex::new(HashMap::new()),
            statuses: std::sync::Mutex::new(HashMap::new()),
        }
    }

    /// 캐시 없이 거래소 직접 조회만 수행하는 제공자.
    pub fn without_cache(exchange: Arc<dyn MarketDataProvider>) -> Self {
        Self {
            store: None,
            exchange,
            locks: Mutex::new(HashMap::new()),
            statuses: std::sync::Mutex::new(HashMap::new()),
        }
    }

    /// 심볼의 다운로드 현황.
    pub fn download_status(&self, symbol: &str) -> Option<DownloadStatus> {
        self.statuses
            .lock()
            .ok()
            .and_then(|map| map.get(symbol).cloned())
    }

    /// `[start, end]` 구간 캔들 조회.
    ///
    /// 캐시에 있는 데이터는 재사용하고 누락 구간만 거래소에서 받아
    /// 저장한 뒤, 전체 구간을 다시 읽어 정렬·중복 제거된 결과를
    /// 반환합니다. `on_progress`는 배치마다 호출됩니다.
    #[instrument(skip(self, on_progress), fields(exchange = self.exchange.name()))]
    pub async fn fetch_candles<F>(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        use_cache: bool,
        mut on_progress: F,
    ) -> Result<FetchOutcome>
    where
        F: FnMut(&str, Option<usize>, Option<usize>) + Send,
    {
        if start > end {
            return Err(DataError::InvalidRange(format!(
                "start({start}) > end({end})"
            )));
        }
        let timer = Instant::now();
        let start = timeframe.align_down(start);

        let store = match (&self.store, use_cache) {
            (Some(store), true) => Arc::clone(store),
            _ => {
                return self
                    .fetch_direct(symbol, timeframe, start, end, timer, &mut on_progress)
                    .await;
            }
        };

        // 같은 심볼의 동시 요청은 진행 중인 다운로드에 합류합니다
        // (락 해제 후 캐시에서 바로 읽게 됨).
        let lock = self.symbol_lock(symbol).await;
        let _guard = lock.lock().await;

        let cached = match store.read_range(symbol, timeframe, start, end).await {
            Ok(cached) => cached,
            Err(e) => {
                warn!(error = %e, "캐시 조회 실패, 거래소 직접 조회로 폴백");
                return self
                    .fetch_direct(symbol, timeframe, start, end, timer, &mut on_progress)
                    .await;
            }
        };

        let missing = missing_ranges(&cached, timeframe, start, end);
        if missing.is_empty() {
            self.set_status(
                symbol,
                DownloadStatus {
                    state: DownloadState::Completed,
                    loaded: cached.len(),
                    total: Some(cached.len()),
                    message: "캐시 적중".to_string(),
                },
            );
            debug!(count = cached.len(), "누락 구간 없음, 캐시만으로 응답");
            return Ok(FetchOutcome {
                stats: FetchStats {
                    from_cache: cached.len(),
                    total_time_ms: timer.elapsed().as_millis() as u64,
                    ..Default::default()
                },
                candles: cached,
            });
        }

        let expected = expected_count(timeframe, start, end);
        self.set_status(
            symbol,
            DownloadStatus {
                state: DownloadState::Running,
                loaded: cached.len(),
                total: Some(expected),
                message: format!("누락 구간 {}개 다운로드 시작", missing.len()),
            },
        );

        let mut buffer: Vec<Candle> = Vec::new();
        let mut fetched: Vec<Candle> = Vec::new();
        let mut saved = 0usize;
        let mut loaded = cached.len();

        for range in &missing {
            let result = self
                .download_range(
                    symbol,
                    timeframe,
                    *range,
                    expected,
                    &mut buffer,
                    &mut fetched,
                    &mut saved,
                    &mut loaded,
                    &mut on_progress,
                )
                .await;
            if let Err(e) = result {
                self.set_status(
                    symbol,
                    DownloadStatus {
                        state: DownloadState::Failed,
                        loaded,
                        total: Some(expected),
                        message: e.to_string(),
                    },
                );
                return Err(e);
            }
        }
        if !buffer.is_empty() {
            saved += self.flush(&store, symbol, timeframe, &mut buffer).await;
        }

        // 전체 구간 재조회: 정렬·중복 제거는 저장소가 보장
        let final_candles = match store.read_range(symbol, timeframe, start, end).await {
            Ok(candles) if !candles.is_empty() => candles,
            _ => {
                // 재조회 실패 시 수동 병합
                warn!("캐시 재조회 실패, 수동 병합으로 응답");
                let mut merged = cached.clone();
                merged.extend(fetched.iter().cloned());
                merged.sort_by_key(Candle::open_time_ms);
                merged.dedup_by_key(|c| c.open_time_ms());
                merged
            }
        };

        self.set_status(
            symbol,
            DownloadStatus {
                state: DownloadState::Completed,
                loaded: final_candles.len(),
                total: Some(expected),
                message: "다운로드 완료".to_string(),
            },
        );
        info!(
            from_cache = cached.len(),
            from_api = fetched.len(),
            saved,
            total = final_candles.len(),
            "캔들 조회 완료"
        );

        Ok(FetchOutcome {
            stats: FetchStats {
                from_cache: cached.len(),
                from_api: fetched.len(),
                saved_to_cache: saved,
                total_time_ms: timer.elapsed().as_millis() as u64,
                cache_bypassed: false,
            },
            candles: final_candles,
        })
    }

    /// 누락 구간 하나를 페이지 단위로 다운로드합니다.
    #[allow(clippy::too_many_arguments)]
    async fn download_range<F>(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        range: TimeRange,
        expected: usize,
        buffer: &mut Vec<Candle>,
        fetched: &mut Vec<Candle>,
        saved: &mut usize,
        loaded: &mut usize,
        on_progress: &mut F,
    ) -> Result<()>
    where
        F: FnMut(&str, Option<usize>, Option<usize>) + Send,
    {
        let retry = RetryConfig::default();
        let step = ChronoDuration::milliseconds(timeframe.duration_ms());
        let mut since = range.start;

        loop {
            let batch = with_retry(&retry, || {
                self.exchange
                    .fetch_ohlcv(symbol, timeframe, Some(since), MAX_FETCH_LIMIT)
            })
            .await?;
            if batch.is_empty() {
                break;
            }
            let last_ts = batch.last().map(|c| c.open_time).unwrap_or(range.end);

            let filtered: Vec<Candle> = batch
                .into_iter()
                .filter(|c| c.open_time >= range.start && c.open_time <= range.end)
                .collect();
            *loaded += filtered.len();
            fetched.extend(filtered.iter().cloned());
            buffer.extend(filtered);

            if buffer.len() >= FLUSH_THRESHOLD {
                if let Some(store) = &self.store {
                    *saved += self.flush(store, symbol, timeframe, buffer).await;
                }
            }

            on_progress("캔들 수신 중", Some(*loaded), Some(expected));
            self.set_status(
                symbol,
                DownloadStatus {
                    state: DownloadState::Running,
                    loaded: *loaded,
                    total: Some(expected),
                    message: "캔들 수신 중".to_string(),
                },
            );

            if last_ts >= range.end {
                break;
            }
            since = last_ts + step;
            tokio::time::sleep(PAGE_DELAY).await;
        }
        Ok(())
    }

    /// 버퍼를 저장소에 기록합니다. 실패해도 중단하지 않습니다.
    async fn flush(
        &self,
        store: &Arc<dyn CandleStore>,
        symbol: &str,
        timeframe: Timeframe,
        buffer: &mut Vec<Candle>,
    ) -> usize {
        match store.upsert_many(symbol, timeframe, buffer).await {
            Ok(inserted) => {
                debug!(flushed = buffer.len(), inserted, "버퍼 저장 완료");
                buffer.clear();
                inserted
            }
            Err(e) => {
                warn!(error = %e, "캐시 저장 실패, 저장 없이 계속 진행");
                buffer.clear();
                0
            }
        }
    }

    /// 캐시 없이 거래소에서 직접 스트리밍합니다.
    async fn fetch_direct<F>(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        timer: Instant,
        on_progress: &mut F,
    ) -> Result<FetchOutcome>
    where
        F: FnMut(&str, Option<usize>, Option<usize>) + Send,
    {
        let expected = expected_count(timeframe, start, end);
        let mut loaded = 0usize;
        let candles = self
            .exchange
            .fetch_historical_ohlcv(symbol, timeframe, start, end, &mut |batch: &[Candle]| {
                loaded += batch.len();
                on_progress("거래소 직접 조회", Some(loaded), Some(expected));
            })
            .await?;

        Ok(FetchOutcome {
            stats: FetchStats {
                from_api: candles.len(),
                total_time_ms: timer.elapsed().as_millis() as u64,
                cache_bypassed: true,
                ..Default::default()
            },
            candles,
        })
    }

    async fn symbol_lock(&self, symbol: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks
            .entry(symbol.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    fn set_status(&self, symbol: &str, status: DownloadStatus) {
        if let Ok(mut map) = self.statuses.lock() {
            map.insert(symbol.to_string(), status);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryCandleStore;
    use crate::synthetic::SyntheticExchange;
    use chrono::TimeZone;

    fn setup(minutes: usize) -> (Arc<InMemoryCandleStore>, Arc<SyntheticExchange>, DateTime<Utc>) {
        let origin = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let store = Arc::new(InMemoryCandleStore::new());
        let exchange = Arc::new(SyntheticExchange::new(42, 50_000.0, origin, minutes));
        (store, exchange, origin)
    }

    #[tokio::test]
    async fn test_first_fetch_downloads_second_hits_cache() {
        let (store, exchange, origin) = setup(600);
        let provider = CachedCandleProvider::new(store, exchange);
        let end = origin + ChronoDuration::minutes(599);

        let first = provider
            .fetch_candles("BTCUSDT", Timeframe::M1, origin, end, true, |_, _, _| {})
            .await
            .unwrap();
        assert_eq!(first.candles.len(), 600);
        assert_eq!(first.stats.from_cache, 0);
        assert_eq!(first.stats.from_api, 600);
        assert_eq!(first.stats.saved_to_cache, 600);

        // 두 번째 호출: 전부 캐시에서
        let second = provider
            .fetch_candles("BTCUSDT", Timeframe::M1, origin, end, true, |_, _, _| {})
            .await
            .unwrap();
        assert_eq!(second.stats.from_cache, second.candles.len());
        assert_eq!(second.stats.from_api, 0);
        assert_eq!(second.candles, first.candles);
    }

    #[tokio::test]
    async fn test_partial_cache_fetches_only_missing() {
        let (store, exchange, origin) = setup(300);
        // 앞 100분만 미리 캐시
        store
            .upsert_many("BTCUSDT", Timeframe::M1, &exchange.candles()[..100])
            .await
            .unwrap();

        let provider = CachedCandleProvider::new(store, exchange);
        let end = origin + ChronoDuration::minutes(299);
        let outcome = provider
            .fetch_candles("BTCUSDT", Timeframe::M1, origin, end, true, |_, _, _| {})
            .await
            .unwrap();

        assert_eq!(outcome.candles.len(), 300);
        assert_eq!(outcome.stats.from_cache, 100);
        assert_eq!(outcome.stats.from_api, 200);
        // 정렬 확인
        assert!(outcome
            .candles
            .windows(2)
            .all(|w| w[0].open_time < w[1].open_time));
    }

    #[tokio::test]
    async fn test_cache_disabled_streams_directly() {
        let (store, exchange, origin) = setup(250);
        let provider = CachedCandleProvider::new(store.clone(), exchange);
        let end = origin + ChronoDuration::minutes(249);

        let outcome = provider
            .fetch_candles("BTCUSDT", Timeframe::M1, origin, end, false, |_, _, _| {})
            .await
            .unwrap();
        assert_eq!(outcome.candles.len(), 250);
        assert!(outcome.stats.cache_bypassed);
        // 캐시에 저장되지 않음
        assert_eq!(store.count("BTCUSDT", Timeframe::M1).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_download_status_is_queryable() {
        let (store, exchange, origin) = setup(120);
        let provider = CachedCandleProvider::new(store, exchange);
        let end = origin + ChronoDuration::minutes(119);

        provider
            .fetch_candles("BTCUSDT", Timeframe::M1, origin, end, true, |_, _, _| {})
            .await
            .unwrap();
        let status = provider.download_status("BTCUSDT").unwrap();
        assert_eq!(status.state, DownloadState::Completed);
        assert_eq!(status.loaded, 120);
    }
}
