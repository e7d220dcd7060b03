//! 볼린저 밴드.

use quantlab_core::Candle;

use crate::params::{ParamSpec, Params};
use crate::util;
use crate::value::{IndicatorValue, MultiValue};
use crate::Indicator;

const PARAMS: &[ParamSpec] = &[
    ParamSpec::integer("period", 20, 2.0, 500.0),
    ParamSpec::number("multiplier", 2.0, 0.1, 10.0, 0.1),
    ParamSpec::choice(
        "source",
        "close",
        &["open", "high", "low", "close", "hl2", "hlc3", "ohlc4"],
    ),
];

/// `middle = SMA(period)`, `band = middle ± k·σ` (모집단 표준편차),
/// `bandwidth = (upper−lower)/middle·100`, `%B = (price−lower)/(upper−lower)`.
///
/// 라인: middle(대표), upper, lower, bandwidth, percentB.
pub struct Bollinger;

impl Indicator for Bollinger {
    fn name(&self) -> &'static str {
        "bollinger"
    }

    fn parameters(&self) -> &[ParamSpec] {
        PARAMS
    }

    fn required_warmup(&self, params: &Params) -> usize {
        params.usize_or("period", 20)
    }

    fn calculate(&self, series: &[Candle], params: &Params) -> Vec<Option<IndicatorValue>> {
        let period = params.usize_or("period", 20);
        let multiplier = params.f64_or("multiplier", 2.0);
        let source = params.price_source();
        let prices: Vec<f64> = series.iter().map(|c| c.price_f64(source)).collect();

        let middles = util::sma(&prices, period);
        prices
            .iter()
            .enumerate()
            .map(|(i, &price)| {
                let middle = middles[i]?;
                let sd = util::stddev_population(&prices[i + 1 - period..=i]);
                let upper = middle + multiplier * sd;
                let lower = middle - multiplier * sd;
                let bandwidth = if middle != 0.0 {
                    (upper - lower) / middle * 100.0
                } else {
                    0.0
                };
                let range = upper - lower;
                let percent_b = if range != 0.0 {
                    (price - lower) / range
                } else {
                    0.5
                };
                Some(IndicatorValue::Multi(
                    MultiValue::new()
                        .with("middle", middle)
                        .with("upper", upper)
                        .with("lower", lower)
                        .with("bandwidth", bandwidth)
                        .with("percentB", percent_b),
                ))
            })
            .collect()
    }
}
