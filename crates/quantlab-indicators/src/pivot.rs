//! 피봇 포인트.
//!
//! 직전 캔들의 고가/저가/종가(데마크는 시가 포함)로 지지/저항 레벨을
//! 계산합니다. traditional/fibonacci/camarilla/woodie는 R5/S5까지
//! 연장하고, demark는 PP/R1/S1만 정의합니다.

use quantlab_core::Candle;

use crate::params::{ParamSpec, Params};
use crate::value::{IndicatorValue, MultiValue};
use crate::Indicator;

const PARAMS: &[ParamSpec] = &[ParamSpec::choice(
    "variant",
    "traditional",
    &["traditional", "fibonacci", "camarilla", "woodie", "demark"],
)];

/// 피봇 포인트 지표. 라인: PP(대표), R1..R5, S1..S5.
pub struct PivotPoints;

impl Indicator for PivotPoints {
    fn name(&self) -> &'static str {
        "pivot"
    }

    fn parameters(&self) -> &[ParamSpec] {
        PARAMS
    }

    fn required_warmup(&self, _params: &Params) -> usize {
        // 직전 캔들이 필요하므로 첫 출력은 인덱스 1
        2
    }

    fn calculate(&self, series: &[Candle], params: &Params) -> Vec<Option<IndicatorValue>> {
        let variant = params.text_or("variant", "traditional").to_lowercase();
        let mut out = vec![None; series.len()];
        for i in 1..series.len() {
            let prev = &series[i - 1];
            let record = match variant.as_str() {
                "fibonacci" => fibonacci(prev),
                "camarilla" => camarilla(prev),
                "woodie" => woodie(prev),
                "demark" => demark(prev),
                _ => traditional(prev),
            };
            out[i] = Some(IndicatorValue::Multi(record));
        }
        out
    }
}

fn traditional(prev: &Candle) -> MultiValue {
    let (h, l, c) = (prev.high_f64(), prev.low_f64(), prev.close_f64());
    let pp = (h + l + c) / 3.0;
    let range = h - l;
    let r1 = 2.0 * pp - l;
    let s1 = 2.0 * pp - h;
    let r2 = pp + range;
    let s2 = pp - range;
    let r3 = h + 2.0 * (pp - l);
    let s3 = l - 2.0 * (h - pp);
    with_extended_levels(pp, r1, r2, r3, s1, s2, s3, range)
}

fn fibonacci(prev: &Candle) -> MultiValue {
    let (h, l, c) = (prev.high_f64(), prev.low_f64(), prev.close_f64());
    let pp = (h + l + c) / 3.0;
    let range = h - l;
    MultiValue::new()
        .with("PP", pp)
        .with("R1", pp + 0.382 * range)
        .with("R2", pp + 0.618 * range)
        .with("R3", pp + range)
        .with("R4", pp + 1.382 * range)
        .with("R5", pp + 1.618 * range)
        .with("S1", pp - 0.382 * range)
        .with("S2", pp - 0.618 * range)
        .with("S3", pp - range)
        .with("S4", pp - 1.382 * range)
        .with("S5", pp - 1.618 * range)
}

fn camarilla(prev: &Candle) -> MultiValue {
    let (h, l, c) = (prev.high_f64(), prev.low_f64(), prev.close_f64());
    let pp = (h + l + c) / 3.0;
    let range = h - l;
    let r5 = if l != 0.0 { h / l * c } else { c };
    MultiValue::new()
        .with("PP", pp)
        .with("R1", c + range * 1.1 / 12.0)
        .with("R2", c + range * 1.1 / 6.0)
        .with("R3", c + range * 1.1 / 4.0)
        .with("R4", c + range * 1.1 / 2.0)
        .with("R5", r5)
        .with("S1", c - range * 1.1 / 12.0)
        .with("S2", c - range * 1.1 / 6.0)
        .with("S3", c - range * 1.1 / 4.0)
        .with("S4", c - range * 1.1 / 2.0)
        .with("S5", c - (r5 - c))
}

fn woodie(prev: &Candle) -> MultiValue {
    let (h, l, c) = (prev.high_f64(), prev.low_f64(), prev.close_f64());
    let pp = (h + l + 2.0 * c) / 4.0;
    let range = h - l;
    let r1 = 2.0 * pp - l;
    let s1 = 2.0 * pp - h;
    let r2 = pp + range;
    let s2 = pp - range;
    let r3 = h + 2.0 * (pp - l);
    let s3 = l - 2.0 * (h - pp);
    with_extended_levels(pp, r1, r2, r3, s1, s2, s3, range)
}

fn demark(prev: &Candle) -> MultiValue {
    let (o, h, l, c) = (
        prev.open_f64(),
        prev.high_f64(),
        prev.low_f64(),
        prev.close_f64(),
    );
    let x = if c < o {
        h + 2.0 * l + c
    } else if c > o {
        2.0 * h + l + c
    } else {
        h + l + 2.0 * c
    };
    MultiValue::new()
        .with("PP", x / 4.0)
        .with("R1", x / 2.0 - l)
        .with("S1", x / 2.0 - h)
}

/// R4/R5, S4/S5를 구간 폭만큼 연장해 채웁니다.
#[allow(clippy::too_many_arguments)]
fn with_extended_levels(
    pp: f64,
    r1: f64,
    r2: f64,
    r3: f64,
    s1: f64,
    s2: f64,
    s3: f64,
    range: f64,
) -> MultiValue {
    MultiValue::new()
        .with("PP", pp)
        .with("R1", r1)
        .with("R2", r2)
        .with("R3", r3)
        .with("R4", r3 + range)
        .with("R5", r3 + 2.0 * range)
        .with("S1", s1)
        .with("S2", s2)
        .with("S3", s3)
        .with("S4", s3 - range)
        .with("S5", s3 - 2.0 * range)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::candles_from_ohlc;

    #[test]
    fn test_traditional_levels_from_prev_candle() {
        let candles = candles_from_ohlc(&[(10.0, 12.0, 8.0, 11.0), (11.0, 13.0, 10.0, 12.0)]);
        let params = Params::empty();
        let out = PivotPoints.calculate(&candles, &params);

        assert!(out[0].is_none());
        let value = out[1].as_ref().unwrap();
        // PP = (12+8+11)/3
        let pp = (12.0 + 8.0 + 11.0) / 3.0;
        assert!((value.line("PP").unwrap() - pp).abs() < 1e-12);
        assert!((value.line("R1").unwrap() - (2.0 * pp - 8.0)).abs() < 1e-12);
        assert!((value.line("S1").unwrap() - (2.0 * pp - 12.0)).abs() < 1e-12);
        assert!(value.line("R5").is_some());
        assert!(value.line("S5").is_some());
    }

    #[test]
    fn test_demark_has_only_three_levels() {
        let candles = candles_from_ohlc(&[(10.0, 12.0, 8.0, 11.0), (11.0, 13.0, 10.0, 12.0)]);
        let params = Params::empty().with("variant", "demark");
        let out = PivotPoints.calculate(&candles, &params);

        let value = out[1].as_ref().unwrap();
        assert!(value.line("PP").is_some());
        assert!(value.line("R1").is_some());
        assert!(value.line("S1").is_some());
        assert!(value.line("R2").is_none());
        // close(11) > open(10) → X = 2H + L + C
        let x = 2.0 * 12.0 + 8.0 + 11.0;
        assert!((value.line("PP").unwrap() - x / 4.0).abs() < 1e-12);
    }

    #[test]
    fn test_pivot_primary_is_pp() {
        let candles = candles_from_ohlc(&[(10.0, 12.0, 8.0, 11.0), (11.0, 13.0, 10.0, 12.0)]);
        let out = PivotPoints.calculate(&candles, &Params::empty());
        let value = out[1].as_ref().unwrap();
        assert_eq!(value.primary(), value.line("PP"));
    }
}
