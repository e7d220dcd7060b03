//! OHLCV 캔들 도메인 타입.
//!
//! 백테스팅 파이프라인 전체(캐시, 집계, 지표, 시뮬레이터)가 공유하는
//! 거래소 중립 캔들 표현입니다. 생성 이후 불변으로 취급합니다.

use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// 거래소 중립 OHLCV 캔들.
///
/// `open_time`은 해당 타임프레임 구간의 시작 시각에 정렬되어 있어야 합니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    /// 구간 시작 시각 (타임프레임 정렬)
    pub open_time: DateTime<Utc>,
    /// 시가
    pub open: Decimal,
    /// 고가
    pub high: Decimal,
    /// 저가
    pub low: Decimal,
    /// 종가
    pub close: Decimal,
    /// 거래량
    pub volume: Decimal,
}

impl Candle {
    /// 새 캔들을 생성합니다.
    pub fn new(
        open_time: DateTime<Utc>,
        open: Decimal,
        high: Decimal,
        low: Decimal,
        close: Decimal,
        volume: Decimal,
    ) -> Self {
        Self {
            open_time,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    /// 캔들 불변 조건 검증.
    ///
    /// `low ≤ open,close ≤ high`, `volume ≥ 0`.
    pub fn is_valid(&self) -> bool {
        self.low <= self.open
            && self.low <= self.close
            && self.open <= self.high
            && self.close <= self.high
            && self.low <= self.high
            && self.volume >= Decimal::ZERO
    }

    /// 구간 시작 시각 (epoch 밀리초).
    pub fn open_time_ms(&self) -> i64 {
        self.open_time.timestamp_millis()
    }

    /// 가격 소스 선택 값.
    pub fn price(&self, source: PriceSource) -> Decimal {
        let two = Decimal::from(2);
        let three = Decimal::from(3);
        let four = Decimal::from(4);
        match source {
            PriceSource::Open => self.open,
            PriceSource::High => self.high,
            PriceSource::Low => self.low,
            PriceSource::Close => self.close,
            PriceSource::Volume => self.volume,
            PriceSource::Hl2 => (self.high + self.low) / two,
            PriceSource::Hlc3 => (self.high + self.low + self.close) / three,
            PriceSource::Ohlc4 => (self.open + self.high + self.low + self.close) / four,
        }
    }

    /// 가격 소스 선택 값 (f64, 지표 계산용).
    pub fn price_f64(&self, source: PriceSource) -> f64 {
        self.price(source).to_f64().unwrap_or(f64::NAN)
    }

    /// 종가 (f64).
    pub fn close_f64(&self) -> f64 {
        self.close.to_f64().unwrap_or(f64::NAN)
    }

    /// 고가 (f64).
    pub fn high_f64(&self) -> f64 {
        self.high.to_f64().unwrap_or(f64::NAN)
    }

    /// 저가 (f64).
    pub fn low_f64(&self) -> f64 {
        self.low.to_f64().unwrap_or(f64::NAN)
    }

    /// 시가 (f64).
    pub fn open_f64(&self) -> f64 {
        self.open.to_f64().unwrap_or(f64::NAN)
    }

    /// 거래량 (f64).
    pub fn volume_f64(&self) -> f64 {
        self.volume.to_f64().unwrap_or(f64::NAN)
    }
}

/// 지표 입력 가격 소스.
///
/// 기본 OHLCV 필드와 파생 가격(hl2, hlc3, ohlc4)을 지원합니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriceSource {
    Open,
    High,
    Low,
    #[default]
    Close,
    Volume,
    Hl2,
    Hlc3,
    Ohlc4,
}

impl FromStr for PriceSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "open" => Ok(Self::Open),
            "high" => Ok(Self::High),
            "low" => Ok(Self::Low),
            "close" => Ok(Self::Close),
            "volume" => Ok(Self::Volume),
            "hl2" => Ok(Self::Hl2),
            "hlc3" => Ok(Self::Hlc3),
            "ohlc4" => Ok(Self::Ohlc4),
            other => Err(format!("알 수 없는 가격 소스: {other}")),
        }
    }
}
