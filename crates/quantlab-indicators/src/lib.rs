//! 기술적 지표 라이브러리.
//!
//! 모든 지표는 `Indicator` trait을 구현하며, 입력 캔들 시퀀스와 같은
//! 길이의 정렬된 출력 시퀀스를 반환합니다. 워밍업 구간(`required_warmup`
//! 미만)은 None입니다.
//!
//! # 사용 예시
//!
//! ```rust,ignore
//! use quantlab_indicators::{IndicatorRegistry, Params};
//!
//! let registry = IndicatorRegistry::with_builtins();
//! let rsi = registry.get("RSI").unwrap();
//! let params = Params::empty().with("period", 14);
//! let values = rsi.calculate(&candles, &params);
//! ```

pub mod params;
pub mod registry;
pub mod util;
pub mod value;

mod adx;
mod atr;
mod bollinger;
mod ema;
mod macd;
mod obv;
mod pivot;
mod rsi;
mod sma;
mod smma;
mod stochastic;
mod volume_sma;

pub use adx::Adx;
pub use atr::Atr;
pub use bollinger::Bollinger;
pub use ema::Ema;
pub use macd::Macd;
pub use obv::Obv;
pub use params::{ParamDefault, ParamKind, ParamSpec, Params};
pub use pivot::PivotPoints;
pub use registry::IndicatorRegistry;
pub use rsi::Rsi;
pub use sma::Sma;
pub use smma::Smma;
pub use stochastic::Stochastic;
pub use value::{IndicatorValue, MultiValue};
pub use volume_sma::VolumeSma;

use quantlab_core::Candle;

/// 기술적 지표 공통 인터페이스.
///
/// 구현체는 상태를 가지지 않으며(`calculate`는 순수 함수), 레지스트리에
/// `Arc<dyn Indicator>`로 등록됩니다.
pub trait Indicator: Send + Sync {
    /// 지표 이름 (레지스트리 키, 대소문자 무관 조회).
    fn name(&self) -> &'static str;

    /// 파라미터 명세 목록.
    fn parameters(&self) -> &[ParamSpec];

    /// 파라미터 검증. 기본 구현은 `parameters()` 명세로 타입/범위를 확인합니다.
    fn validate(&self, params: &Params) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();
        for spec in self.parameters() {
            spec.check(params, &mut errors);
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// 첫 유효 출력까지 필요한 최소 캔들 수.
    fn required_warmup(&self, params: &Params) -> usize;

    /// 전체 시퀀스 계산. 반환 길이는 입력 길이와 같습니다.
    fn calculate(&self, series: &[Candle], params: &Params) -> Vec<Option<IndicatorValue>>;
}

#[cfg(test)]
pub(crate) mod testing {
    use chrono::{TimeZone, Utc};
    use quantlab_core::{Candle, Timeframe};
    use rust_decimal::prelude::FromPrimitive;
    use rust_decimal::Decimal;

    /// 테스트용 캔들 시퀀스 생성 (1분 간격).
    pub fn candles_from_closes(closes: &[f64]) -> Vec<Candle> {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        closes
            .iter()
            .enumerate()
            .map(|(i, &close)| {
                let c = Decimal::from_f64(close).unwrap();
                Candle::new(
                    start + chrono::Duration::milliseconds(i as i64 * Timeframe::M1.duration_ms()),
                    c,
                    c,
                    c,
                    c,
                    Decimal::from(100),
                )
            })
            .collect()
    }

    /// 테스트용 OHLC 캔들 시퀀스 생성.
    pub fn candles_from_ohlc(rows: &[(f64, f64, f64, f64)]) -> Vec<Candle> {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        rows.iter()
            .enumerate()
            .map(|(i, &(o, h, l, c))| {
                Candle::new(
                    start + chrono::Duration::milliseconds(i as i64 * Timeframe::M1.duration_ms()),
                    Decimal::from_f64(o).unwrap(),
                    Decimal::from_f64(h).unwrap(),
                    Decimal::from_f64(l).unwrap(),
                    Decimal::from_f64(c).unwrap(),
                    Decimal::from(100),
                )
            })
            .collect()
    }
}
