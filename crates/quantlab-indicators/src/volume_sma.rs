//! 거래량 단순 이동평균.

use quantlab_core::Candle;

use crate::params::{ParamSpec, Params};
use crate::util;
use crate::value::IndicatorValue;
use crate::Indicator;

const PARAMS: &[ParamSpec] = &[ParamSpec::integer("period", 20, 1.0, 500.0)];

/// 거래량의 SMA. 거래량 급증 필터에 사용합니다.
pub struct VolumeSma;

impl Indicator for VolumeSma {
    fn name(&self) -> &'static str {
        "volume_sma"
    }

    fn parameters(&self) -> &[ParamSpec] {
        PARAMS
    }

    fn required_warmup(&self, params: &Params) -> usize {
        params.usize_or("period", 20)
    }

    fn calculate(&self, series: &[Candle], params: &Params) -> Vec<Option<IndicatorValue>> {
        let period = params.usize_or("period", 20);
        let volumes: Vec<f64> = series.iter().map(Candle::volume_f64).collect();
        util::sma(&volumes, period)
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
    fn test_volume_sma_constant_volume() {
        let candles = candles_from_closes(&[1.0, 2.0, 3.0]);
        let params = Params::empty().with("period", 2);
        let out = VolumeSma.calculate(&candles, &params);
        // 테스트 캔들의 거래량은 항상 100
        assert_eq!(
            out[2].as_ref().and_then(IndicatorValue::primary),
            Some(100.0)
        );
    }
}
