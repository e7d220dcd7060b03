//! 체결 완료된 거래 기록.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::side::{ExitReason, Side};

/// 청산 완료된 거래 (라운드트립).
///
/// `net_pnl = gross_pnl - commission`, `holding_ms = exit_time - entry_time ≥ 0`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    /// 거래 고유 ID
    pub id: Uuid,
    /// 심볼
    pub symbol: String,
    /// 방향
    pub side: Side,
    /// 진입가
    pub entry_price: Decimal,
    /// 청산가
    pub exit_price: Decimal,
    /// 진입 시각
    pub entry_time: DateTime<Utc>,
    /// 청산 시각
    pub exit_time: DateTime<Utc>,
    /// 수량
    pub quantity: Decimal,
    /// 총손익 (가격 단위)
    pub gross_pnl: Decimal,
    /// 총손익률 (%)
    pub gross_pnl_pct: Decimal,
    /// 수수료 (진입 + 청산)
    pub commission: Decimal,
    /// 순손익
    pub net_pnl: Decimal,
    /// 청산 사유
    pub exit_reason: ExitReason,
    /// 보유 기간 (밀리초)
    pub holding_ms: i64,
}

impl Trade {
    /// 순손익이 양수인 거래인지 확인.
    pub fn is_winner(&self) -> bool {
        self.net_pnl > Decimal::ZERO
    }

    /// 보유 기간 (분).
    pub fn holding_minutes(&self) -> f64 {
        self.holding_ms as f64 / 60_000.0
    }
}
