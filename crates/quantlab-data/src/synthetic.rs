//! 합성 시장 데이터 생성기.
//!
//! 실데이터가 없거나 거래소에 접근할 수 없을 때 사용하는 레짐 전환
//! 기하 랜덤워크입니다. 시드가 같으면 시퀀스가 완전히 동일하므로
//! 테스트와 재현 실행에 적합합니다. 외부 난수 크레이트 대신 고정
//! 상수 LCG를 사용해 결정성을 보장합니다.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use quantlab_core::{Candle, Timeframe};
use quantlab_exchange::{ExchangeError, MarketDataProvider, MAX_FETCH_LIMIT};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;

/// 변동성 레짐.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Regime {
    Calm,
    Normal,
    Volatile,
}

impl Regime {
    /// 분당 수익률 변동성 (σ).
    fn volatility(self) -> f64 {
        match self {
            Regime::Calm => 0.0004,
            Regime::Normal => 0.0012,
            Regime::Volatile => 0.0035,
        }
    }

    fn next(self) -> Self {
        match self {
            Regime::Calm => Regime::Normal,
            Regime::Normal => Regime::Volatile,
            Regime::Volatile => Regime::Calm,
        }
    }
}

/// 시드 기반 합성 캔들 생성기.
#[derive(Debug, Clone)]
pub struct SyntheticMarketGenerator {
    seed: u32,
    /// Box-Muller 여분 가우시안
    spare: Option<f64>,
    price: f64,
    regime: Regime,
    trend: f64,
}

impl SyntheticMarketGenerator {
    /// 시드와 시작 가격으로 생성기를 만듭니다.
    pub fn new(seed: u32, initial_price: f64) -> Self {
        Self {
            seed,
            spare: None,
            price: initial_price,
            regime: Regime::Normal,
            trend: 0.0,
        }
    }

    /// LCG 한 스텝: `seed ← seed·1_664_525 + 1_013_904_223 (mod 2³²)`.
    fn next_u32(&mut self) -> u32 {
        self.seed = self
            .seed
            .wrapping_mul(1_664_525)
            .wrapping_add(1_013_904_223);
        self.seed
    }

    /// [0, 1) 균등 난수.
    fn next_f64(&mut self) -> f64 {
        self.next_u32() as f64 / (u32::MAX as f64 + 1.0)
    }

    /// 표준 정규 난수 (Box-Muller).
    fn gaussian(&mut self) -> f64 {
        if let Some(spare) = self.spare.take() {
            return spare;
        }
        let mut u1 = self.next_f64();
        if u1 <= f64::EPSILON {
            u1 = f64::EPSILON;
        }
        let u2 = self.next_f64();
        let radius = (-2.0 * u1.ln()).sqrt();
        let theta = 2.0 * std::f64::consts::PI * u2;
        self.spare = Some(radius * theta.sin());
        radius * theta.cos()
    }

    /// `start`부터 1분봉 `count`개를 생성합니다.
    pub fn generate(&mut self, start: DateTime<Utc>, count: usize) -> Vec<Candle> {
        let mut candles = Vec::with_capacity(count);
        for i in 0..count {
            // 가끔 레짐 전환 (약 1/240 확률)
            if self.next_f64() < 1.0 / 240.0 {
                self.regime = self.regime.next();
            }
            // 가끔 추세 강도 변경 (약 1/360 확률)
            if self.next_f64() < 1.0 / 360.0 {
                self.trend = (self.next_f64() - 0.5) * 0.0006;
            }

            let vol = self.regime.volatility();
            let ret = self.trend + vol * self.gaussian();

            let open = self.price;
            let close = open * (1.0 + ret);
            let wick = vol * open * self.next_f64();
            let high = open.max(close) + wick;
            let low = (open.min(close) - wick).max(open.min(close) * 0.5);
            let volume = 50.0 + 1000.0 * vol * 100.0 * (1.0 + self.next_f64());

            candles.push(Candle {
                open_time: start + Duration::minutes(i as i64),
                open: to_decimal(open),
                high: to_decimal(high),
                low: to_decimal(low),
                close: to_decimal(close),
                volume: to_decimal(volume),
            });
            self.price = close;
        }
        candles
    }
}

fn to_decimal(value: f64) -> Decimal {
    Decimal::from_f64(value)
        .unwrap_or_default()
        .round_dp(8)
}

/// 합성 데이터 거래소.
///
/// 생성 구간을 미리 만들어 두고 [`MarketDataProvider`] 인터페이스로
/// 페이지 단위 조회를 제공합니다. 오프라인 테스트에서 실거래소
/// 자리에 주입합니다.
pub struct SyntheticExchange {
    name: String,
    candles: Vec<Candle>,
}

impl SyntheticExchange {
    /// `origin`부터 `minutes`개 1분봉을 시드로 생성합니다.
    pub fn new(seed: u32, initial_price: f64, origin: DateTime<Utc>, minutes: usize) -> Self {
        let mut generator = SyntheticMarketGenerator::new(seed, initial_price);
        Self {
            name: format!("synthetic(seed={seed})"),
            candles: generator.generate(origin, minutes),
        }
    }

    /// 생성된 전체 시퀀스.
    pub fn candles(&self) -> &[Candle] {
        &self.candles
    }
}

#[async_trait]
impl MarketDataProvider for SyntheticExchange {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch_ohlcv(
        &self,
        _symbol: &str,
        _timeframe: Timeframe,
        since: Option<DateTime<Utc>>,
        limit: usize,
    ) -> Result<Vec<Candle>, ExchangeError> {
        let limit = limit.min(MAX_FETCH_LIMIT);
        let candles = match since {
            Some(since) => self
                .candles
                .iter()
                .filter(|c| c.open_time >= since)
                .take(limit)
                .cloned()
                .collect(),
            None => self.candles.iter().take(limit).cloned().collect(),
        };
        Ok(candles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_same_seed_identical_series() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let a = SyntheticMarketGenerator::new(42, 50_000.0).generate(start, 500);
        let b = SyntheticMarketGenerator::new(42, 50_000.0).generate(start, 500);
        assert_eq!(a, b);
    }

    #[test]
    fn test_different_seed_differs() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let a = SyntheticMarketGenerator::new(42, 50_000.0).generate(start, 100);
        let b = SyntheticMarketGenerator::new(43, 50_000.0).generate(start, 100);
        assert_ne!(a, b);
    }

    #[test]
    fn test_generated_candles_are_valid() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let candles = SyntheticMarketGenerator::new(7, 100.0).generate(start, 2_000);
        assert!(candles.iter().all(Candle::is_valid));
        // 1분 간격 연속
        assert!(candles
            .windows(2)
            .all(|w| w[1].open_time - w[0].open_time == Duration::minutes(1)));
    }

    #[tokio::test]
    async fn test_exchange_pagination() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let exchange = SyntheticExchange::new(42, 50_000.0, start, 300);

        let first = exchange
            .fetch_ohlcv("BTCUSDT", Timeframe::M1, Some(start), 200)
            .await
            .unwrap();
        assert_eq!(first.len(), 200);

        let next_since = first.last().unwrap().open_time + Duration::minutes(1);
        let second = exchange
            .fetch_ohlcv("BTCUSDT", Timeframe::M1, Some(next_since), 200)
            .await
            .unwrap();
        assert_eq!(second.len(), 100);
    }
}
