//! 평균 실질 변동폭 (ATR, Wilder).

use quantlab_core::Candle;

use crate::params::{ParamSpec, Params};
use crate::value::IndicatorValue;
use crate::Indicator;

const PARAMS: &[ParamSpec] = &[ParamSpec::integer("period", 14, 1.0, 500.0)];

/// `tr = max(high−low, |high−prevClose|, |low−prevClose|)`의 Wilder 평활.
///
/// TR은 직전 종가가 필요하므로 워밍업은 `period + 1`입니다.
pub struct Atr;

impl Indicator for Atr {
    fn name(&self) -> &'static str {
        "atr"
    }

    fn parameters(&self) -> &[ParamSpec] {
        PARAMS
    }

    fn required_warmup(&self, params: &Params) -> usize {
        params.usize_or("period", 14) + 1
    }

    fn calculate(&self, series: &[Candle], params: &Params) -> Vec<Option<IndicatorValue>> {
        let period = params.usize_or("period", 14);
        let mut out = vec![None; series.len()];
        if period == 0 || series.len() < period + 1 {
            return out;
        }

        // tr[i]는 캔들 i 기준 (i ≥ 1)
        let tr: Vec<f64> = (1..series.len())
            .map(|i| true_range(&series[i], series[i - 1].close_f64()))
            .collect();

        let mut atr = tr[..period].iter().sum::<f64>() / period as f64;
        out[period] = Some(IndicatorValue::Scalar(atr));

        let n = period as f64;
        for i in period + 1..series.len() {
            atr = (atr * (n - 1.0) + tr[i - 1]) / n;
            out[i] = Some(IndicatorValue::Scalar(atr));
        }
        out
    }
}

/// 실질 변동폭.
pub fn true_range(candle: &Candle, prev_close: f64) -> f64 {
    let high = candle.high_f64();
    let low = candle.low_f64();
    (high - low)
        .max((high - prev_close).abs())
        .max((low - prev_close).abs())
}
