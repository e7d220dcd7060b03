//! 단순 이동평균 (SMA).

use quantlab_core::Candle;

use crate::params::{ParamSpec, Params};
use crate::util;
use crate::value::IndicatorValue;
use crate::Indicator;

const PARAMS: &[ParamSpec] = &[
    ParamSpec::integer("period", 20, 1.0, 500.0),
    ParamSpec::choice(
        "source",
        "close",
        &["open", "high", "low", "close", "volume", "hl2", "hlc3", "ohlc4"],
    ),
];

/// 선택한 가격 소스의 최근 `period`개 산술 평균.
pub struct Sma;

impl Indicator for Sma {
    fn name(&self) -> &'static str {
        "sma"
    }

    fn parameters(&self) -> &[ParamSpec] {
        PARAMS
    }

    fn required_warmup(&self, params: &Params) -> usize {
        params.usize_or("period", 20)
    }

    fn calculate(&self, series: &[Candle], params: &Params) -> Vec<Option<IndicatorValue>> {
        let period = params.usize_or("period", 20);
        let source = params.price_source();
        let prices: Vec<f64> = series.iter().map(|c| c.price_f64(source)).collect();
        util::sma(&prices, period)
            .into_iter()
            .map(|v| v.map(IndicatorValue::Scalar))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::candles_from_closes;

    #[test]
    fn test_sma_alignment_and_warmup() {
        let candles = candles_from_closes(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        let params = Params::empty().with("period", 3);
        let out = Sma.calculate(&candles, &params);

        assert_eq!(out.len(), 5);
        assert!(out[1].is_none());
        assert_eq!(out[2].as_ref().and_then(IndicatorValue::primary), Some(2.0));
        assert_eq!(out[4].as_ref().and_then(IndicatorValue::primary), Some(4.0));
    }

    #[test]
    fn test_sma_invalid_period_rejected() {
        let params = Params::empty().with("period", 0);
        assert!(Sma.validate(&params).is_err());
    }
}
