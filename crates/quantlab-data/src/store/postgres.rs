//! Postgres 캔들 저장소.
//!
//! `candles` 테이블은 (symbol, timeframe, timestamp) 유니크 인덱스를
//! 가지며, 업서트 시 `candle_metadata`의 min/max/count를 같은 트랜잭션
//! 안에서 갱신합니다. 타임스탬프는 epoch 밀리초(BIGINT)로 저장합니다.

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use quantlab_core::{Candle, Timeframe};
use rust_decimal::Decimal;
use sqlx::postgres::PgPool;
use sqlx::{FromRow, Row};
use tracing::{info, instrument};

use crate::error::{DataError, Result};
use crate::store::{CandleMetadata, CandleStore};

/// 업서트 청크 크기. 바인딩 수 제한을 피하기 위해 분할합니다.
const UPSERT_CHUNK_SIZE: usize = 1_000;

/// 캔들 테이블 레코드.
#[derive(Debug, Clone, FromRow)]
struct CandleRow {
    timestamp: i64,
    open: Decimal,
    high: Decimal,
    low: Decimal,
    close: Decimal,
    volume: Decimal,
}

impl CandleRow {
    fn into_candle(self) -> Candle {
        Candle {
            open_time: Utc
                .timestamp_millis_opt(self.timestamp)
                .single()
                .unwrap_or_default(),
            open: self.open,
            high: self.high,
            low: self.low,
            close: self.close,
            volume: self.volume,
        }
    }
}

/// Postgres 캔들 저장소.
#[derive(Clone)]
pub struct PostgresCandleStore {
    pool: PgPool,
}

impl PostgresCandleStore {
    /// 커넥션 풀로 저장소를 생성합니다.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// 테이블과 인덱스를 생성합니다 (이미 있으면 무시).
    #[instrument(skip(self))]
    pub async fn ensure_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS candles (
                symbol      TEXT        NOT NULL,
                timeframe   TEXT        NOT NULL,
                timestamp   BIGINT      NOT NULL,
                open        NUMERIC     NOT NULL,
                high        NUMERIC     NOT NULL,
                low         NUMERIC     NOT NULL,
                close       NUMERIC     NOT NULL,
                volume      NUMERIC     NOT NULL,
                created_at  TIMESTAMPTZ NOT NULL DEFAULT now(),
                UNIQUE (symbol, timeframe, timestamp)
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| DataError::Query(e.to_string()))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS candle_metadata (
                symbol          TEXT        NOT NULL,
                timeframe       TEXT        NOT NULL,
                first_timestamp BIGINT      NOT NULL,
                last_timestamp  BIGINT      NOT NULL,
                candle_count    BIGINT      NOT NULL,
                updated_at      TIMESTAMPTZ NOT NULL DEFAULT now(),
                UNIQUE (symbol, timeframe)
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| DataError::Query(e.to_string()))?;

        info!("캔들 캐시 스키마 준비 완료");
        Ok(())
    }
}

#[async_trait]
impl CandleStore for PostgresCandleStore {
    #[instrument(skip(self))]
    async fn read_range(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Candle>> {
        let rows: Vec<CandleRow> = sqlx::query_as(
            r#"
            SELECT timestamp, open, high, low, close, volume
            FROM candles
            WHERE symbol = $1 AND timeframe = $2 AND timestamp BETWEEN $3 AND $4
            ORDER BY timestamp ASC
            "#,
        )
        .bind(symbol)
        .bind(timeframe.as_str())
        .bind(start.timestamp_millis())
        .bind(end.timestamp_millis())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DataError::Query(e.to_string()))?;

        Ok(rows.into_iter().map(CandleRow::into_candle).collect())
    }

    #[instrument(skip(self, candles), fields(count = candles.len()))]
    async fn upsert_many(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        candles: &[Candle],
    ) -> Result<usize> {
        if candles.is_empty() {
            return Ok(0);
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DataError::Query(e.to_string()))?;

        let mut inserted = 0usize;
        for chunk in candles.chunks(UPSERT_CHUNK_SIZE) {
            let timestamps: Vec<i64> = chunk.iter().map(Candle::open_time_ms).collect();
            let opens: Vec<Decimal> = chunk.iter().map(|c| c.open).collect();
            let highs: Vec<Decimal> = chunk.iter().map(|c| c.high).collect();
            let lows: Vec<Decimal> = chunk.iter().map(|c| c.low).collect();
            let closes: Vec<Decimal> = chunk.iter().map(|c| c.close).collect();
            let volumes: Vec<Decimal> = chunk.iter().map(|c| c.volume).collect();

            let result = sqlx::query(
                r#"
                INSERT INTO candles (symbol, timeframe, timestamp, open, high, low, close, volume)
                SELECT $1, $2, t.ts, t.o, t.h, t.l, t.c, t.v
                FROM UNNEST($3::BIGINT[], $4::NUMERIC[], $5::NUMERIC[], $6::NUMERIC[], $7::NUMERIC[], $8::NUMERIC[])
                    AS t(ts, o, h, l, c, v)
                ON CONFLICT (symbol, timeframe, timestamp) DO UPDATE SET
                    open = EXCLUDED.open,
                    high = EXCLUDED.high,
                    low = EXCLUDED.low,
                    close = EXCLUDED.close,
                    volume = EXCLUDED.volume
                "#,
            )
            .bind(symbol)
            .bind(timeframe.as_str())
            .bind(&timestamps)
            .bind(&opens)
            .bind(&highs)
            .bind(&lows)
            .bind(&closes)
            .bind(&volumes)
            .execute(&mut *tx)
            .await
            .map_err(|e| DataError::Query(e.to_string()))?;
            inserted += result.rows_affected() as usize;
        }

        // 메타데이터는 실제 테이블 집계로 갱신 (업서트 멱등성 유지)
        sqlx::query(
            r#"
            INSERT INTO candle_metadata (symbol, timeframe, first_timestamp, last_timestamp, candle_count, updated_at)
            SELECT symbol, timeframe, MIN(timestamp), MAX(timestamp), COUNT(*), now()
            FROM candles
            WHERE symbol = $1 AND timeframe = $2
            GROUP BY symbol, timeframe
            ON CONFLICT (symbol, timeframe) DO UPDATE SET
                first_timestamp = EXCLUDED.first_timestamp,
                last_timestamp = EXCLUDED.last_timestamp,
                candle_count = EXCLUDED.candle_count,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(symbol)
        .bind(timeframe.as_str())
        .execute(&mut *tx)
        .await
        .map_err(|e| DataError::Query(e.to_string()))?;

        tx.commit()
            .await
            .map_err(|e| DataError::Query(e.to_string()))?;
        Ok(inserted)
    }

    #[instrument(skip(self))]
    async fn delete_many(
        &self,
        symbol: Option<&str>,
        timeframe: Option<Timeframe>,
    ) -> Result<u64> {
        let timeframe = timeframe.map(|tf| tf.as_str().to_string());
        let result = sqlx::query(
            r#"
            DELETE FROM candles
            WHERE ($1::TEXT IS NULL OR symbol = $1)
              AND ($2::TEXT IS NULL OR timeframe = $2)
            "#,
        )
        .bind(symbol)
        .bind(timeframe.as_deref())
        .execute(&self.pool)
        .await
        .map_err(|e| DataError::Query(e.to_string()))?;

        sqlx::query(
            r#"
            DELETE FROM candle_metadata
            WHERE ($1::TEXT IS NULL OR symbol = $1)
              AND ($2::TEXT IS NULL OR timeframe = $2)
            "#,
        )
        .bind(symbol)
        .bind(timeframe.as_deref())
        .execute(&self.pool)
        .await
        .map_err(|e| DataError::Query(e.to_string()))?;

        Ok(result.rows_affected())
    }

    async fn count(&self, symbol: &str, timeframe: Timeframe) -> Result<i64> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS cnt FROM candles WHERE symbol = $1 AND timeframe = $2",
        )
        .bind(symbol)
        .bind(timeframe.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| DataError::Query(e.to_string()))?;
        row.try_get::<i64, _>("cnt")
            .map_err(|e| DataError::Query(e.to_string()))
    }

    async fn metadata(
        &self,
        symbol: &str,
        timeframe: Timeframe,
    ) -> Result<Option<CandleMetadata>> {
        let row = sqlx::query(
            r#"
            SELECT first_timestamp, last_timestamp, candle_count, updated_at
            FROM candle_metadata
            WHERE symbol = $1 AND timeframe = $2
            "#,
        )
        .bind(symbol)
        .bind(timeframe.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DataError::Query(e.to_string()))?;

        let Some(row) = row else {
            return Ok(None);
        };
        let first: i64 = row
            .try_get("first_timestamp")
            .map_err(|e| DataError::Query(e.to_string()))?;
        let last: i64 = row
            .try_get("last_timestamp")
            .map_err(|e| DataError::Query(e.to_string()))?;
        let count: i64 = row
            .try_get("candle_count")
            .map_err(|e| DataError::Query(e.to_string()))?;
        let updated_at: DateTime<Utc> = row
            .try_get("updated_at")
            .map_err(|e| DataError::Query(e.to_string()))?;

        Ok(Some(CandleMetadata {
            symbol: symbol.to_string(),
            timeframe,
            first_time: Utc.timestamp_millis_opt(first).single().unwrap_or_default(),
            last_time: Utc.timestamp_millis_opt(last).single().unwrap_or_default(),
            candle_count: count,
            updated_at,
        }))
    }
}
