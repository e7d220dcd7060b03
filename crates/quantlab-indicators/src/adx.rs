//! 평균 방향성 지수 (ADX, Wilder).

use quantlab_core::Candle;

use crate::atr::true_range;
use crate::params::{ParamSpec, Params};
use crate::value::{IndicatorValue, MultiValue};
use crate::Indicator;

const PARAMS: &[ParamSpec] = &[ParamSpec::integer("period", 14, 2.0, 500.0)];

/// Wilder 평활한 +DM/−DM/TR로 +DI/−DI를 구하고,
/// `DX = |+DI − −DI|/(+DI + −DI)·100`의 Wilder 평활이 ADX입니다.
///
/// 라인: adx(대표), plusDI, minusDI. 대표 라인인 adx가 정의되는
/// `2·period`부터 레코드를 내보내며, DI만 계산된 구간은 None입니다.
pub struct Adx;

impl Indicator for Adx {
    fn name(&self) -> &'static str {
        "adx"
    }

    fn parameters(&self) -> &[ParamSpec] {
        PARAMS
    }

    fn required_warmup(&self, params: &Params) -> usize {
        2 * params.usize_or("period", 14)
    }

    fn calculate(&self, series: &[Candle], params: &Params) -> Vec<Option<IndicatorValue>> {
        let period = params.usize_or("period", 14);
        let mut out = vec![None; series.len()];
        if period == 0 || series.len() < period + 1 {
            return out;
        }

        // 인덱스 1부터의 +DM/−DM/TR
        let len = series.len() - 1;
        let mut plus_dm = vec![0.0; len];
        let mut minus_dm = vec![0.0; len];
        let mut tr = vec![0.0; len];
        for i in 1..series.len() {
            let up = series[i].high_f64() - series[i - 1].high_f64();
            let down = series[i - 1].low_f64() - series[i].low_f64();
            if up > down && up > 0.0 {
                plus_dm[i - 1] = up;
            }
            if down > up && down > 0.0 {
                minus_dm[i - 1] = down;
            }
            tr[i - 1] = true_range(&series[i], series[i - 1].close_f64());
        }

        // Wilder 평활 (합계 기반)
        let mut smoothed_plus: f64 = plus_dm[..period].iter().sum();
        let mut smoothed_minus: f64 = minus_dm[..period].iter().sum();
        let mut smoothed_tr: f64 = tr[..period].iter().sum();

        let mut dx_values: Vec<f64> = Vec::new();
        let mut adx: Option<f64> = None;
        let n = period as f64;

        for i in period..=len {
            if i > period {
                let j = i - 1;
                smoothed_plus = smoothed_plus - smoothed_plus / n + plus_dm[j];
                smoothed_minus = smoothed_minus - smoothed_minus / n + minus_dm[j];
                smoothed_tr = smoothed_tr - smoothed_tr / n + tr[j];
            }

            let (plus_di, minus_di) = if smoothed_tr > 0.0 {
                (
                    smoothed_plus / smoothed_tr * 100.0,
                    smoothed_minus / smoothed_tr * 100.0,
                )
            } else {
                (0.0, 0.0)
            };
            let di_sum = plus_di + minus_di;
            let dx = if di_sum > 0.0 {
                (plus_di - minus_di).abs() / di_sum * 100.0
            } else {
                0.0
            };
            dx_values.push(dx);

            // ADX: 첫 period개 DX의 평균으로 시드 후 Wilder 반복
            if dx_values.len() == period {
                adx = Some(dx_values.iter().sum::<f64>() / n);
            } else if dx_values.len() > period {
                adx = adx.map(|prev| (prev * (n - 1.0) + dx) / n);
            }

            // 대표 라인(adx)이 준비되기 전에는 레코드를 내보내지 않음
            out[i] = adx.map(|adx_value| {
                IndicatorValue::Multi(
                    MultiValue::new()
                        .with("adx", adx_value)
                        .with("plusDI", plus_di)
                        .with("minusDI", minus_di),
                )
            });
        }
        out
    }
}
