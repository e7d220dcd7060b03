//! 청산 규칙과 리스크 정책.
//!
//! 전략 스키마와 시뮬레이터가 공유하는 설정 타입입니다.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// 손절 거리 계산 방식.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopMode {
    /// 진입가 대비 고정 비율 (%)
    FixedPercent,
    /// 절대 가격 레벨
    FixedPrice,
    /// ATR 배수
    AtrMultiple,
}

/// 익절 거리 계산 방식. 손절 방식에 `risk_reward`가 추가됩니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TakeProfitMode {
    FixedPercent,
    FixedPrice,
    AtrMultiple,
    /// 손절 거리의 배수 (`v · |entry − SL|`)
    RiskReward,
}

/// 손절 규칙.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StopLossRule {
    /// 거리 계산 방식
    pub mode: StopMode,
    /// 방식별 값 (%, 가격, 배수)
    pub value: Decimal,
}

/// 익절 규칙.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TakeProfitRule {
    /// 거리 계산 방식
    pub mode: TakeProfitMode,
    /// 방식별 값
    pub value: Decimal,
}

/// 트레일링 스탑 규칙.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrailingRule {
    /// 활성화 수익률 (%)
    pub activation_pct: Decimal,
    /// 추적 거리 (%)
    pub trail_pct: Decimal,
}
