//! 평활 이동평균 (SMMA, Wilder MA).

use quantlab_core::Candle;

use crate::params::{ParamSpec, Params};
use crate::util;
use crate::value::IndicatorValue;
use crate::Indicator;

const PARAMS: &[ParamSpec] = &[
    ParamSpec::integer("period", 14, 1.0, 500.0),
    ParamSpec::choice(
        "source",
        "close",
        &["open", "high", "low", "close", "volume", "hl2", "hlc3", "ohlc4"],
    ),
];

/// SMA(period)로 시드 후 `smma = (smma_prev·(period−1) + x)/period`.
pub struct Smma;

impl Indicator for Smma {
    fn name(&self) -> &'static str {
        "smma"
    }

    fn parameters(&self) -> &[ParamSpec] {
        PARAMS
    }

    fn required_warmup(&self, params: &Params) -> usize {
        params.usize_or("period", 14)
    }

    fn calculate(&self, series: &[Candle], params: &Params) -> Vec<Option<IndicatorValue>> {
        let period = params.usize_or("period", 14);
        let source = params.price_source();
        let prices: Vec<f64> = series.iter().map(|c| c.price_f64(source)).collect();
        util::smma(&prices, period)
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
    fn test_smma_warmup() {
        let candles = candles_from_closes(&[3.0, 3.0, 3.0, 6.0]);
        let params = Params::empty().with("period", 3);
        let out = Smma.calculate(&candles, &params);

        assert!(out[1].is_none());
        assert_eq!(out[2].as_ref().and_then(IndicatorValue::primary), Some(3.0));
        // (3·2 + 6)/3 = 4
        assert_eq!(out[3].as_ref().and_then(IndicatorValue::primary), Some(4.0));
    }
}
