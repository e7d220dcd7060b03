//! 온밸런스 볼륨 (OBV).

use quantlab_core::Candle;

use crate::params::{ParamSpec, Params};
use crate::util;
use crate::value::{IndicatorValue, MultiValue};
use crate::Indicator;

const PARAMS: &[ParamSpec] = &[ParamSpec::integer("signal_period", 0, 0.0, 500.0)];

/// 부호 있는 거래량의 누적 합 (종가 상승 +, 하락 −, 보합 0).
///
/// `signal_period > 0`이면 OBV의 SMA를 signal 라인으로 추가합니다.
/// 라인: obv(대표), signal.
pub struct Obv;

impl Indicator for Obv {
    fn name(&self) -> &'static str {
        "obv"
    }

    fn parameters(&self) -> &[ParamSpec] {
        PARAMS
    }

    fn required_warmup(&self, params: &Params) -> usize {
        let signal = params.usize_or("signal_period", 0);
        if signal > 0 {
            signal
        } else {
            1
        }
    }

    fn calculate(&self, series: &[Candle], params: &Params) -> Vec<Option<IndicatorValue>> {
        let signal_period = params.usize_or("signal_period", 0);

        let mut obv_values = Vec::with_capacity(series.len());
        let mut obv = 0.0;
        for (i, candle) in series.iter().enumerate() {
            if i > 0 {
                let change = candle.close_f64() - series[i - 1].close_f64();
                if change > 0.0 {
                    obv += candle.volume_f64();
                } else if change < 0.0 {
                    obv -= candle.volume_f64();
                }
            }
            obv_values.push(obv);
        }

        let signal_line = if signal_period > 0 {
            util::sma(&obv_values, signal_period)
        } else {
            vec![None; series.len()]
        };

        obv_values
            .iter()
            .zip(signal_line.iter())
            .map(|(&obv, signal)| {
                let mut record = MultiValue::new().with("obv", obv);
                if let Some(signal) = *signal {
                    record = record.with("signal", signal);
                }
                Some(IndicatorValue::Multi(record))
            })
            .collect()
    }
}
