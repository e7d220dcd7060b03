//! 상대강도지수 (RSI, Wilder).

use quantlab_core::Candle;

use crate::params::{ParamSpec, Params};
use crate::value::IndicatorValue;
use crate::Indicator;

const PARAMS: &[ParamSpec] = &[
    ParamSpec::integer("period", 14, 2.0, 500.0),
    ParamSpec::choice(
        "source",
        "close",
        &["open", "high", "low", "close", "hl2", "hlc3", "ohlc4"],
    ),
];

/// Wilder 평활로 평균 상승/하락폭을 구한 뒤
/// `RSI = 100 − 100/(1 + avgGain/avgLoss)`. 평균 하락폭이 0이면 100.
///
/// 변화량은 `period + 1`개의 캔들이 있어야 `period`개가 나오므로
/// 워밍업은 `period + 1`입니다.
pub struct Rsi;

impl Indicator for Rsi {
    fn name(&self) -> &'static str {
        "rsi"
    }

    fn parameters(&self) -> &[ParamSpec] {
        PARAMS
    }

    fn required_warmup(&self, params: &Params) -> usize {
        params.usize_or("period", 14) + 1
    }

    fn calculate(&self, series: &[Candle], params: &Params) -> Vec<Option<IndicatorValue>> {
        let period = params.usize_or("period", 14);
        let source = params.price_source();
        let prices: Vec<f64> = series.iter().map(|c| c.price_f64(source)).collect();

        let mut out = vec![None; prices.len()];
        if period == 0 || prices.len() < period + 1 {
            return out;
        }

        // 초기 평균: 첫 period개 변화량의 단순 평균
        let mut avg_gain = 0.0;
        let mut avg_loss = 0.0;
        for i in 1..=period {
            let change = prices[i] - prices[i - 1];
            if change > 0.0 {
                avg_gain += change;
            } else {
                avg_loss += -change;
            }
        }
        avg_gain /= period as f64;
        avg_loss /= period as f64;
        out[period] = Some(IndicatorValue::Scalar(rsi_value(avg_gain, avg_loss)));

        let n = period as f64;
        for i in period + 1..prices.len() {
            let change = prices[i] - prices[i - 1];
            let (gain, loss) = if change > 0.0 {
                (change, 0.0)
            } else {
                (0.0, -change)
            };
            avg_gain = (avg_gain * (n - 1.0) + gain) / n;
            avg_loss = (avg_loss * (n - 1.0) + loss) / n;
            out[i] = Some(IndicatorValue::Scalar(rsi_value(avg_gain, avg_loss)));
        }
        out
    }
}

fn rsi_value(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        100.0
    } else {
        100.0 - 100.0 / (1.0 + avg_gain / avg_loss)
    }
}
