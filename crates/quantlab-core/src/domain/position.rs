//! 포지션 도메인 타입.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::side::Side;

/// 트레일링 스탑 상태.
///
/// 진입 시 비활성으로 시작하며, 진입 이후 수익률이 `activation_pct`에
/// 도달하면 활성화됩니다. 활성화 후 스탑은 유리한 방향으로만 이동합니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrailingState {
    /// 활성화 여부
    pub activated: bool,
    /// 관측된 최고가(롱) / 최저가(숏)
    pub peak_price: Decimal,
    /// 현재 스탑 레벨 (활성화 전 None)
    pub current_stop: Option<Decimal>,
    /// 활성화 수익률 (%)
    pub activation_pct: Decimal,
    /// 추적 거리 (%)
    pub trail_pct: Decimal,
}

impl TrailingState {
    /// 진입 시점의 초기 상태.
    pub fn new(entry_price: Decimal, activation_pct: Decimal, trail_pct: Decimal) -> Self {
        Self {
            activated: false,
            peak_price: entry_price,
            current_stop: None,
            activation_pct,
            trail_pct,
        }
    }
}

/// 열린 포지션.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// 포지션 고유 ID
    pub id: Uuid,
    /// 심볼
    pub symbol: String,
    /// 방향
    pub side: Side,
    /// 진입가 (슬리피지 반영)
    pub entry_price: Decimal,
    /// 수량
    pub quantity: Decimal,
    /// 진입 시각
    pub entry_time: DateTime<Utc>,
    /// 손절가
    pub stop_loss: Option<Decimal>,
    /// 익절가
    pub take_profit: Option<Decimal>,
    /// 트레일링 스탑 상태
    pub trailing: Option<TrailingState>,
    /// 미실현 손익 (종가 기준)
    pub unrealized_pnl: Decimal,
}

impl Position {
    /// 포지션 명목 가치 (진입가 기준).
    pub fn notional(&self) -> Decimal {
        self.entry_price * self.quantity
    }

    /// 현재가 기준 미실현 손익.
    pub fn unrealized_at(&self, price: Decimal) -> Decimal {
        unrealized_pnl(self.entry_price, price, self.quantity, self.side)
    }
}

/// 미실현 손익 계산.
pub fn unrealized_pnl(entry: Decimal, current: Decimal, quantity: Decimal, side: Side) -> Decimal {
    match side {
        Side::Long => (current - entry) * quantity,
        Side::Short => (entry - current) * quantity,
    }
}
