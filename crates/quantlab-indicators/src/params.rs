//! 지표 파라미터 정의와 검증.
//!
//! 전략 스키마는 지표 파라미터를 JSON 객체로 전달하며, 각 지표는
//! 자신이 선언한 `ParamSpec` 목록으로 타입과 범위를 검증합니다.

use quantlab_core::PriceSource;
use serde_json::{Map, Value};

/// 파라미터 값 종류.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParamKind {
    /// 정수 (기간 등)
    Integer,
    /// 실수 (배수 등)
    Number,
    /// 고정 선택지 문자열
    Choice(&'static [&'static str]),
}

/// 파라미터 기본값.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParamDefault {
    Int(i64),
    Num(f64),
    Text(&'static str),
}

/// 지표가 선언하는 파라미터 명세.
#[derive(Debug, Clone)]
pub struct ParamSpec {
    /// 파라미터 이름
    pub name: &'static str,
    /// 값 종류
    pub kind: ParamKind,
    /// 기본값
    pub default: ParamDefault,
    /// 최소값 (숫자 전용)
    pub min: Option<f64>,
    /// 최대값 (숫자 전용)
    pub max: Option<f64>,
    /// 증분 (UI 힌트)
    pub step: Option<f64>,
}

impl ParamSpec {
    /// 정수 파라미터 명세.
    pub const fn integer(name: &'static str, default: i64, min: f64, max: f64) -> Self {
        Self {
            name,
            kind: ParamKind::Integer,
            default: ParamDefault::Int(default),
            min: Some(min),
            max: Some(max),
            step: Some(1.0),
        }
    }

    /// 실수 파라미터 명세.
    pub const fn number(name: &'static str, default: f64, min: f64, max: f64, step: f64) -> Self {
        Self {
            name,
            kind: ParamKind::Number,
            default: ParamDefault::Num(default),
            min: Some(min),
            max: Some(max),
            step: Some(step),
        }
    }

    /// 선택지 파라미터 명세.
    pub const fn choice(
        name: &'static str,
        default: &'static str,
        choices: &'static [&'static str],
    ) -> Self {
        Self {
            name,
            kind: ParamKind::Choice(choices),
            default: ParamDefault::Text(default),
            min: None,
            max: None,
            step: None,
        }
    }

    /// 전달된 파라미터를 이 명세로 검증하고 오류를 누적합니다.
    pub fn check(&self, params: &Params, errors: &mut Vec<String>) {
        let Some(value) = params.get(self.name) else {
            return; // 없으면 기본값 사용
        };

        match self.kind {
            ParamKind::Integer | ParamKind::Number => {
                let Some(n) = value.as_f64() else {
                    errors.push(format!("{}: 숫자가 아닙니다", self.name));
                    return;
                };
                if self.kind == ParamKind::Integer && n.fract() != 0.0 {
                    errors.push(format!("{}: 정수가 아닙니다", self.name));
                }
                if let Some(min) = self.min {
                    if n < min {
                        errors.push(format!("{}: {n} < 최소값 {min}", self.name));
                    }
                }
                if let Some(max) = self.max {
                    if n > max {
                        errors.push(format!("{}: {n} > 최대값 {max}", self.name));
                    }
                }
            }
            ParamKind::Choice(choices) => {
                let Some(s) = value.as_str() else {
                    errors.push(format!("{}: 문자열이 아닙니다", self.name));
                    return;
                };
                if !choices.iter().any(|c| c.eq_ignore_ascii_case(s)) {
                    errors.push(format!(
                        "{}: '{s}'은(는) {choices:?} 중 하나가 아닙니다",
                        self.name
                    ));
                }
            }
        }
    }
}

/// 지표 파라미터 맵.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Params(Map<String, Value>);

impl Params {
    /// 빈 파라미터.
    pub fn empty() -> Self {
        Self(Map::new())
    }

    /// JSON 객체에서 생성합니다. 객체가 아니면 빈 파라미터를 반환합니다.
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Object(map) => Self(map.clone()),
            _ => Self::empty(),
        }
    }

    /// 키-값 추가 (빌더 패턴, 테스트 편의).
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.0.insert(key.to_string(), value.into());
        self
    }

    /// 원시 값 조회.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// usize 조회 (없거나 형식이 다르면 기본값).
    pub fn usize_or(&self, key: &str, default: usize) -> usize {
        self.0
            .get(key)
            .and_then(Value::as_f64)
            .filter(|n| *n >= 0.0 && n.fract() == 0.0)
            .map(|n| n as usize)
            .unwrap_or(default)
    }

    /// f64 조회 (없거나 형식이 다르면 기본값).
    pub fn f64_or(&self, key: &str, default: f64) -> f64 {
        self.0.get(key).and_then(Value::as_f64).unwrap_or(default)
    }

    /// 문자열 조회 (없으면 기본값).
    pub fn text_or(&self, key: &str, default: &str) -> String {
        self.0
            .get(key)
            .and_then(Value::as_str)
            .unwrap_or(default)
            .to_string()
    }

    /// 가격 소스 조회 (`source` 키, 기본 close).
    pub fn price_source(&self) -> PriceSource {
        self.0
            .get("source")
            .and_then(Value::as_str)
            .and_then(|s| s.parse().ok())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_spec_rejects_out_of_range() {
        let spec = ParamSpec::integer("period", 14, 2.0, 500.0);
        let params = Params::empty().with("period", 1);
        let mut errors = Vec::new();
        spec.check(&params, &mut errors);
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn test_choice_spec_case_insensitive() {
        let spec = ParamSpec::choice("variant", "traditional", &["traditional", "fibonacci"]);
        let params = Params::empty().with("variant", "Fibonacci");
        let mut errors = Vec::new();
        spec.check(&params, &mut errors);
        assert!(errors.is_empty());
    }

    #[test]
    fn test_missing_param_uses_default() {
        let params = Params::empty();
        assert_eq!(params.usize_or("period", 14), 14);
        assert_eq!(params.f64_or("multiplier", 2.0), 2.0);
    }
}
