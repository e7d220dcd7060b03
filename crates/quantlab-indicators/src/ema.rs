//! 지수 이동평균 (EMA).

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

/// SMA(period)로 시드 후 `ema = α·x + (1−α)·ema_prev`, α = 2/(period+1).
pub struct Ema;

impl Indicator for Ema {
    fn name(&self) -> &'static str {
        "ema"
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
        util::ema(&prices, period)
            .into_iter()
            .map(|v| v.map(IndicatorValue::Scalar))
            .collect()
    }
}
