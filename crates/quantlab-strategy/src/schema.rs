//! 선언적 전략 스키마.
//!
//! 전략은 코드가 아니라 데이터입니다: 지표 정의, 계산 변수, 진입/청산
//! 조건 트리, 리스크 정책을 JSON으로 기술하고 실행기가 해석합니다.

use quantlab_core::{StopLossRule, TakeProfitRule, Timeframe, TrailingRule};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::condition::ConditionNode;

/// 전략 상태.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyStatus {
    #[default]
    Draft,
    Active,
    Archived,
}

/// 데이터 요구 사항.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataRequirements {
    /// 신호를 평가하는 기준 타임프레임
    pub primary_timeframe: Timeframe,
    /// 추가(상위) 타임프레임
    #[serde(default)]
    pub additional_timeframes: Vec<Timeframe>,
    /// 최소 과거 캔들 수
    #[serde(default = "default_lookback")]
    pub lookback: usize,
    /// 대상 심볼
    #[serde(default)]
    pub symbols: Vec<String>,
}

fn default_lookback() -> usize {
    100
}

/// 지표 정의.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorDef {
    /// 전략 내 고유 ID (조건에서 참조)
    pub id: String,
    /// 지표 종류 (레지스트리 이름, 대소문자 무관)
    #[serde(rename = "type")]
    pub kind: String,
    /// 지표 파라미터
    #[serde(default)]
    pub params: Value,
    /// 타임프레임 오버라이드 (없으면 primary)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeframe: Option<Timeframe>,
    /// 가격 소스 오버라이드 (없으면 지표 기본값)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

/// 계산 변수 정의.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableDef {
    /// 전략 내 고유 ID
    pub id: String,
    /// 산술 표현식 (지표 ID / 가격 필드 참조)
    pub expression: String,
}

/// 진입/청산 신호 정의.
///
/// `filters`는 `conditions`가 참일 때만 평가됩니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalDef {
    /// 필수 조건 트리
    pub conditions: ConditionNode,
    /// 보조 필터 트리
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filters: Option<ConditionNode>,
}

/// 진입 신호 묶음.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntrySignals {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub long: Option<SignalDef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub short: Option<SignalDef>,
}

/// 청산 정책.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExitPolicy {
    /// 손절 규칙
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_loss: Option<StopLossRule>,
    /// 익절 규칙
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub take_profit: Option<TakeProfitRule>,
    /// 트레일링 스탑 규칙
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trailing: Option<TrailingRule>,
    /// 조건 기반 청산 신호
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signal_exit: Option<SignalDef>,
    /// 최대 보유 캔들 수
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_candles: Option<usize>,
}

/// 리스크 정책.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskPolicy {
    /// 거래당 리스크 비율 (%)
    #[serde(default = "default_risk_per_trade")]
    pub risk_per_trade_pct: Decimal,
    /// 최대 동시 포지션 수
    #[serde(default = "default_max_open_positions")]
    pub max_open_positions: usize,
    /// 레버리지 (정보성, 사이징에 미적용)
    #[serde(default = "default_leverage")]
    pub leverage: Decimal,
}

fn default_risk_per_trade() -> Decimal {
    dec!(1)
}

fn default_max_open_positions() -> usize {
    1
}

fn default_leverage() -> Decimal {
    dec!(1)
}

impl Default for RiskPolicy {
    fn default() -> Self {
        Self {
            risk_per_trade_pct: default_risk_per_trade(),
            max_open_positions: default_max_open_positions(),
            leverage: default_leverage(),
        }
    }
}

/// 선언적 전략 스키마.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategySchema {
    /// 전략 ID
    pub id: String,
    /// 이름
    pub name: String,
    /// 버전 (MAJOR.MINOR.PATCH)
    #[serde(default = "default_version")]
    pub version: String,
    /// 상태
    #[serde(default)]
    pub status: StrategyStatus,
    /// 데이터 요구 사항
    pub data: DataRequirements,
    /// 지표 정의
    #[serde(default)]
    pub indicators: Vec<IndicatorDef>,
    /// 계산 변수
    #[serde(default)]
    pub variables: Vec<VariableDef>,
    /// 진입 신호
    #[serde(default)]
    pub entry: EntrySignals,
    /// 청산 정책
    #[serde(default)]
    pub exit: ExitPolicy,
    /// 리스크 정책
    #[serde(default)]
    pub risk: RiskPolicy,
}

fn default_version() -> String {
    "1.0.0".to_string()
}

impl StrategySchema {
    /// 지표가 사용하는 모든 타임프레임 (primary 포함).
    pub fn used_timeframes(&self) -> Vec<Timeframe> {
        let mut timeframes = vec![self.data.primary_timeframe];
        for def in &self.indicators {
            if let Some(tf) = def.timeframe {
                if !timeframes.contains(&tf) {
                    timeframes.push(tf);
                }
            }
        }
        timeframes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_roundtrip_with_defaults() {
        let json = serde_json::json!({
            "id": "s1",
            "name": "골든 크로스",
            "data": { "primary_timeframe": "1h" },
            "indicators": [
                { "id": "fast", "type": "sma", "params": { "period": 20 } },
                { "id": "slow", "type": "sma", "params": { "period": 50 }, "timeframe": "4h" }
            ]
        });
        let schema: StrategySchema = serde_json::from_value(json).unwrap();

        assert_eq!(schema.version, "1.0.0");
        assert_eq!(schema.status, StrategyStatus::Draft);
        assert_eq!(schema.data.lookback, 100);
        assert_eq!(schema.risk.max_open_positions, 1);
        assert_eq!(
            schema.used_timeframes(),
            vec![Timeframe::H1, Timeframe::H4]
        );
    }
}
