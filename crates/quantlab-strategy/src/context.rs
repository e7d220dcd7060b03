//! 조건/표현식 평가 컨텍스트.
//!
//! 캔들 하나에 대한 지표 값, 계산 변수 값, 가격 필드를 담습니다.
//! 교차/방향 판정을 위해 직전 캔들 컨텍스트를 한 단계 중첩합니다.

use std::collections::HashMap;

use quantlab_core::Candle;
use quantlab_indicators::IndicatorValue;

/// 현재 캔들의 가격 필드.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PriceFields {
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl From<&Candle> for PriceFields {
    fn from(candle: &Candle) -> Self {
        Self {
            open: candle.open_f64(),
            high: candle.high_f64(),
            low: candle.low_f64(),
            close: candle.close_f64(),
            volume: candle.volume_f64(),
        }
    }
}

/// 캔들 하나의 평가 컨텍스트.
#[derive(Debug, Clone, Default)]
pub struct EvalContext {
    /// 지표 ID → 값 (워밍업 구간은 None)
    pub indicators: HashMap<String, Option<IndicatorValue>>,
    /// 변수 ID → 값
    pub variables: HashMap<String, Option<f64>>,
    /// 가격 필드
    pub prices: PriceFields,
    /// 직전 캔들 컨텍스트 (한 단계만)
    pub previous: Option<Box<EvalContext>>,
}

impl EvalContext {
    /// 참조 문자열을 해석합니다.
    ///
    /// 해석 순서: 숫자 리터럴 → `X.Y` 다중 라인 접근 → 가격 필드 →
    /// 지표 ID(대표 라인) → 변수 ID. 모두 실패하면 None.
    pub fn resolve(&self, reference: &str) -> Option<f64> {
        let reference = reference.trim();
        if let Ok(n) = reference.parse::<f64>() {
            return Some(n);
        }
        if let Some((base, field)) = reference.split_once('.') {
            return self.indicator_line(base, field);
        }
        self.resolve_bare(reference)
    }

    /// 점 접근이 없는 이름을 해석합니다 (가격 → 지표 → 변수 순).
    pub fn resolve_bare(&self, name: &str) -> Option<f64> {
        if let Some(price) = self.price_field(name) {
            return Some(price);
        }
        if let Some(value) = self.indicators.get(name) {
            return value.as_ref()?.primary();
        }
        if let Some(value) = self.variables.get(name) {
            return *value;
        }
        name.parse::<f64>().ok()
    }

    /// 다중 라인 지표의 특정 라인.
    pub fn indicator_line(&self, id: &str, line: &str) -> Option<f64> {
        self.indicators.get(id)?.as_ref()?.line(line)
    }

    /// 가격 필드 조회.
    pub fn price_field(&self, name: &str) -> Option<f64> {
        match name {
            "open" => Some(self.prices.open),
            "high" => Some(self.prices.high),
            "low" => Some(self.prices.low),
            "close" => Some(self.prices.close),
            "volume" => Some(self.prices.volume),
            _ => None,
        }
    }

    /// 직전 컨텍스트에서 같은 참조를 해석합니다.
    pub fn resolve_previous(&self, reference: &str) -> Option<f64> {
        self.previous.as_ref()?.resolve(reference)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quantlab_indicators::MultiValue;

    fn sample_ctx() -> EvalContext {
        let mut ctx = EvalContext {
            prices: PriceFields {
                open: 10.0,
                high: 12.0,
                low: 9.0,
                close: 11.0,
                volume: 500.0,
            },
            ..Default::default()
        };
        ctx.indicators
            .insert("rsi14".to_string(), Some(IndicatorValue::Scalar(65.0)));
        ctx.indicators.insert(
            "macd_main".to_string(),
            Some(IndicatorValue::Multi(
                MultiValue::new()
                    .with("macd", 1.5)
                    .with("signal", 1.2)
                    .with("histogram", 0.3),
            )),
        );
        ctx.indicators.insert("warming".to_string(), None);
        ctx.variables.insert("spread".to_string(), Some(0.4));
        ctx
    }

    #[test]
    fn test_resolution_order() {
        let ctx = sample_ctx();
        assert_eq!(ctx.resolve("42.5"), Some(42.5));
        assert_eq!(ctx.resolve("close"), Some(11.0));
        assert_eq!(ctx.resolve("rsi14"), Some(65.0));
        assert_eq!(ctx.resolve("macd_main.histogram"), Some(0.3));
        // 다중 라인 지표의 단독 참조는 대표(첫) 라인
        assert_eq!(ctx.resolve("macd_main"), Some(1.5));
        assert_eq!(ctx.resolve("spread"), Some(0.4));
        assert_eq!(ctx.resolve("unknown"), None);
    }

    #[test]
    fn test_warming_indicator_is_none() {
        let ctx = sample_ctx();
        assert_eq!(ctx.resolve("warming"), None);
        assert_eq!(ctx.resolve("warming.line"), None);
    }

    #[test]
    fn test_previous_resolution() {
        let mut prev = sample_ctx();
        prev.prices.close = 10.0;
        let mut ctx = sample_ctx();
        ctx.previous = Some(Box::new(prev));

        assert_eq!(ctx.resolve("close"), Some(11.0));
        assert_eq!(ctx.resolve_previous("close"), Some(10.0));
    }
}
