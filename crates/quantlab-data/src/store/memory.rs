//! 인메모리 캔들 저장소.
//!
//! 테스트와 오프라인 실행에서 Postgres 구현을 대체합니다.
//! 같은 계약을 만족하며 타임스탬프 정렬은 BTreeMap이 보장합니다.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use quantlab_core::{Candle, Timeframe};
use tokio::sync::RwLock;

use crate::error::Result;
use crate::store::{CandleMetadata, CandleStore};

type Key = (String, Timeframe);

/// 인메모리 캔들 저장소.
#[derive(Default)]
pub struct InMemoryCandleStore {
    inner: RwLock<HashMap<Key, BTreeMap<i64, Candle>>>,
}

impl InMemoryCandleStore {
    /// 빈 저장소.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CandleStore for InMemoryCandleStore {
    async fn read_range(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Candle>> {
        let inner = self.inner.read().await;
        let Some(candles) = inner.get(&(symbol.to_string(), timeframe)) else {
            return Ok(Vec::new());
        };
        Ok(candles
            .range(start.timestamp_millis()..=end.timestamp_millis())
            .map(|(_, c)| c.clone())
            .collect())
    }

    async fn upsert_many(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        candles: &[Candle],
    ) -> Result<usize> {
        let mut inner = self.inner.write().await;
        let entry = inner
            .entry((symbol.to_string(), timeframe))
            .or_default();
        let mut inserted = 0;
        for candle in candles {
            if entry.insert(candle.open_time_ms(), candle.clone()).is_none() {
                inserted += 1;
            }
        }
        Ok(inserted)
    }

    async fn delete_many(
        &self,
        symbol: Option<&str>,
        timeframe: Option<Timeframe>,
    ) -> Result<u64> {
        let mut inner = self.inner.write().await;
        let mut deleted = 0u64;
        inner.retain(|(s, tf), candles| {
            let matches = symbol.map_or(true, |sym| s == sym)
                && timeframe.map_or(true, |t| *tf == t);
            if matches {
                deleted += candles.len() as u64;
            }
            !matches
        });
        Ok(deleted)
    }

    async fn count(&self, symbol: &str, timeframe: Timeframe) -> Result<i64> {
        let inner = self.inner.read().await;
        Ok(inner
            .get(&(symbol.to_string(), timeframe))
            .map(|c| c.len() as i64)
            .unwrap_or(0))
    }

    async fn metadata(
        &self,
        symbol: &str,
        timeframe: Timeframe,
    ) -> Result<Option<CandleMetadata>> {
        let inner = self.inner.read().await;
        let Some(candles) = inner.get(&(symbol.to_string(), timeframe)) else {
            return Ok(None);
        };
        let (Some((&first, _)), Some((&last, _))) =
            (candles.first_key_value(), candles.last_key_value())
        else {
            return Ok(None);
        };
        Ok(Some(CandleMetadata {
            symbol: symbol.to_string(),
            timeframe,
            first_time: Utc.timestamp_millis_opt(first).single().unwrap_or_default(),
            last_time: Utc.timestamp_millis_opt(last).single().unwrap_or_default(),
            candle_count: candles.len() as i64,
            updated_at: Utc::now(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rust_decimal::Decimal;

    fn minute_candles(start: DateTime<Utc>, n: usize) -> Vec<Candle> {
        (0..n)
            .map(|i| {
                let price = Decimal::from(100 + i as i64);
                Candle::new(
                    start + Duration::minutes(i as i64),
                    price,
                    price,
                    price,
                    price,
                    Decimal::ONE,
                )
            })
            .collect()
    }

    #[tokio::test]
    async fn test_roundtrip_sorted_and_deduped() {
        let store = InMemoryCandleStore::new();
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let candles = minute_candles(start, 10);

        // 역순 + 중복 저장
        let mut shuffled: Vec<Candle> = candles.iter().rev().cloned().collect();
        shuffled.extend(candles.iter().cloned());
        store
            .upsert_many("BTCUSDT", Timeframe::M1, &shuffled)
            .await
            .unwrap();

        let read = store
            .read_range(
                "BTCUSDT",
                Timeframe::M1,
                start,
                start + Duration::minutes(9),
            )
            .await
            .unwrap();
        assert_eq!(read, candles);
        assert_eq!(store.count("BTCUSDT", Timeframe::M1).await.unwrap(), 10);
    }

    #[tokio::test]
    async fn test_metadata_tracks_bounds() {
        let store = InMemoryCandleStore::new();
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        store
            .upsert_many("BTCUSDT", Timeframe::M1, &minute_candles(start, 5))
            .await
            .unwrap();

        let meta = store
            .metadata("BTCUSDT", Timeframe::M1)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(meta.first_time, start);
        assert_eq!(meta.last_time, start + Duration::minutes(4));
        assert_eq!(meta.candle_count, 5);
    }

    #[tokio::test]
    async fn test_partial_delete_filters() {
        let store = InMemoryCandleStore::new();
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        store
            .upsert_many("BTCUSDT", Timeframe::M1, &minute_candles(start, 3))
            .await
            .unwrap();
        store
            .upsert_many("ETHUSDT", Timeframe::M1, &minute_candles(start, 3))
            .await
            .unwrap();

        let deleted = store.delete_many(Some("BTCUSDT"), None).await.unwrap();
        assert_eq!(deleted, 3);
        assert_eq!(store.count("BTCUSDT", Timeframe::M1).await.unwrap(), 0);
        assert_eq!(store.count("ETHUSDT", Timeframe::M1).await.unwrap(), 3);
    }
}
