//! 스토캐스틱 오실레이터.

use quantlab_core::Candle;

use crate::params::{ParamSpec, Params};
use crate::util;
use crate::value::{IndicatorValue, MultiValue};
use crate::Indicator;

const PARAMS: &[ParamSpec] = &[
    ParamSpec::integer("k_period", 14, 1.0, 500.0),
    ParamSpec::integer("d_period", 3, 1.0, 200.0),
    ParamSpec::integer("smooth", 3, 1.0, 200.0),
];

/// `raw %K = (close − minLow)/(maxHigh − minLow)·100` (범위 0이면 50),
/// `%K = SMA(raw %K, smooth)`, `%D = SMA(%K, d_period)`.
///
/// 라인: k(대표), d.
pub struct Stochastic;

impl Indicator for Stochastic {
    fn name(&self) -> &'static str {
        "stochastic"
    }

    fn parameters(&self) -> &[ParamSpec] {
        PARAMS
    }

    fn required_warmup(&self, params: &Params) -> usize {
        let k = params.usize_or("k_period", 14);
        let d = params.usize_or("d_period", 3);
        let smooth = params.usize_or("smooth", 3);
        k + smooth + d - 2
    }

    fn calculate(&self, series: &[Candle], params: &Params) -> Vec<Option<IndicatorValue>> {
        let k_period = params.usize_or("k_period", 14);
        let d_period = params.usize_or("d_period", 3);
        let smooth = params.usize_or("smooth", 3);

        let mut raw_k = vec![None; series.len()];
        if k_period == 0 || series.len() < k_period {
            return vec![None; series.len()];
        }
        for i in k_period - 1..series.len() {
            let window = &series[i + 1 - k_period..=i];
            let max_high = window
                .iter()
                .map(Candle::high_f64)
                .fold(f64::NEG_INFINITY, f64::max);
            let min_low = window
                .iter()
                .map(Candle::low_f64)
                .fold(f64::INFINITY, f64::min);
            let range = max_high - min_low;
            raw_k[i] = Some(if range != 0.0 {
                (series[i].close_f64() - min_low) / range * 100.0
            } else {
                50.0
            });
        }

        let k_line = util::sma_over_options(&raw_k, smooth);
        let d_line = util::sma_over_options(&k_line, d_period);

        k_line
            .iter()
            .zip(d_line.iter())
            .map(|(k, d)| {
                let k = (*k)?;
                let mut record = MultiValue::new().with("k", k);
                if let Some(d) = *d {
                    record = record.with("d", d);
                }
                Some(IndicatorValue::Multi(record))
            })
            .collect()
    }
}
