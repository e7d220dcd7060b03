//! 포지션 방향과 청산 사유.

use serde::{Deserialize, Serialize};
use std::fmt;

/// 포지션 방향.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    /// 매수 (롱)
    Long,
    /// 매도 (숏)
    Short,
}

impl Side {
    /// 반대 방향.
    pub fn opposite(self) -> Self {
        match self {
            Side::Long => Side::Short,
            Side::Short => Side::Long,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Long => write!(f, "long"),
            Side::Short => write!(f, "short"),
        }
    }
}

/// 포지션 청산 사유.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    /// 손절가 도달
    StopLoss,
    /// 익절가 도달
    TakeProfit,
    /// 트레일링 스탑 도달
    TrailingStop,
    /// 전략 청산 신호
    Signal,
    /// 강제 청산 (기간 종료, 취소)
    Manual,
    /// 보유 기간 초과
    Timeout,
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self {
            ExitReason::StopLoss => "stop_loss",
            ExitReason::TakeProfit => "take_profit",
            ExitReason::TrailingStop => "trailing_stop",
            ExitReason::Signal => "signal",
            ExitReason::Manual => "manual",
            ExitReason::Timeout => "timeout",
        };
        f.write_str(tag)
    }
}

/// 전략 실행기가 캔들마다 발행하는 신호 종류.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalKind {
    /// 롱 진입
    EntryLong,
    /// 숏 진입
    EntryShort,
    /// 롱 청산
    ExitLong,
    /// 숏 청산
    ExitShort,
    /// 신호 없음
    #[default]
    None,
}

impl SignalKind {
    /// 진입 신호 여부.
    pub fn is_entry(self) -> bool {
        matches!(self, SignalKind::EntryLong | SignalKind::EntryShort)
    }

    /// 청산 신호 여부.
    pub fn is_exit(self) -> bool {
        matches!(self, SignalKind::ExitLong | SignalKind::ExitShort)
    }
}
