//! MACD (이동평균 수렴확산).

use quantlab_core::Candle;

use crate::params::{ParamSpec, Params};
use crate::util;
use crate::value::{IndicatorValue, MultiValue};
use crate::Indicator;

const PARAMS: &[ParamSpec] = &[
    ParamSpec::integer("fast", 12, 1.0, 200.0),
    ParamSpec::integer("slow", 26, 2.0, 500.0),
    ParamSpec::integer("signal", 9, 1.0, 200.0),
    ParamSpec::choice(
        "source",
        "close",
        &["open", "high", "low", "close", "hl2", "hlc3", "ohlc4"],
    ),
];

/// `macd = EMA(fast) − EMA(slow)`, `signal = EMA(signal, macd)`,
/// `histogram = macd − signal`.
///
/// 라인: macd(대표), signal, histogram. signal이 아직 정의되지 않은
/// 구간에서는 macd 라인만 포함됩니다.
pub struct Macd;

impl Macd {
    fn periods(params: &Params) -> (usize, usize, usize) {
        (
            params.usize_or("fast", 12),
            params.usize_or("slow", 26),
            params.usize_or("signal", 9),
        )
    }
}

impl Indicator for Macd {
    fn name(&self) -> &'static str {
        "macd"
    }

    fn parameters(&self) -> &[ParamSpec] {
        PARAMS
    }

    fn validate(&self, params: &Params) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();
        for spec in self.parameters() {
            spec.check(params, &mut errors);
        }
        let (fast, slow, _) = Self::periods(params);
        if fast >= slow {
            errors.push(format!("fast({fast})는 slow({slow})보다 작아야 합니다"));
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    fn required_warmup(&self, params: &Params) -> usize {
        let (_, slow, signal) = Self::periods(params);
        slow + signal - 1
    }

    fn calculate(&self, series: &[Candle], params: &Params) -> Vec<Option<IndicatorValue>> {
        let (fast, slow, signal_period) = Self::periods(params);
        let source = params.price_source();
        let prices: Vec<f64> = series.iter().map(|c| c.price_f64(source)).collect();

        let fast_ema = util::ema(&prices, fast);
        let slow_ema = util::ema(&prices, slow);

        let macd_line: Vec<Option<f64>> = fast_ema
            .iter()
            .zip(slow_ema.iter())
            .map(|(f, s)| match (f, s) {
                (Some(f), Some(s)) => Some(f - s),
                _ => None,
            })
            .collect();
        let signal_line = util::ema_over_options(&macd_line, signal_period);

        macd_line
            .iter()
            .zip(signal_line.iter())
            .map(|(macd, signal)| {
                let macd = (*macd)?;
                let mut record = MultiValue::new().with("macd", macd);
                if let Some(signal) = *signal {
                    record = record
                        .with("signal", signal)
                        .with("histogram", macd - signal);
                }
                Some(IndicatorValue::Multi(record))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::candles_from_closes;

    #[test]
    fn test_macd_line_availability() {
        let closes: Vec<f64> = (1..=20).map(|i| i as f64).collect();
        let candles = candles_from_closes(&closes);
        let params = Params::empty()
            .with("fast", 3)
            .with("slow", 5)
            .with("signal", 3);
        let out = Macd.calculate(&candles, &params);

        // slow EMA가 정의되는 인덱스 4부터 macd 라인 존재
        assert!(out[3].is_none());
        let first = out[4].as_ref().unwrap();
        assert!(first.line("macd").is_some());
        assert!(first.line("signal").is_none());

        // signal은 인덱스 4 + (3-1) = 6부터
        let with_signal = out[6].as_ref().unwrap();
        assert!(with_signal.line("signal").is_some());
        let macd = with_signal.line("macd").unwrap();
        let signal = with_signal.line("signal").unwrap();
        assert!((with_signal.line("histogram").unwrap() - (macd - signal)).abs() < 1e-12);
    }

    #[test]
    fn test_macd_fast_must_be_less_than_slow() {
        let params = Params::empty().with("fast", 26).with("slow", 12);
        assert!(Macd.validate(&params).is_err());
    }

    #[test]
    fn test_macd_primary_is_macd_line() {
        let closes: Vec<f64> = (1..=30).map(|i| i as f64).collect();
        let candles = candles_from_closes(&closes);
        let params = Params::empty();
        let out = Macd.calculate(&candles, &params);
        let last = out.last().unwrap().as_ref().unwrap();
        assert_eq!(last.primary(), last.line("macd"));
    }
}
