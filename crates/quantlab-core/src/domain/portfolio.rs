//! 포트폴리오 상태.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// 백테스트 1회 실행 동안 유지되는 포트폴리오 상태.
///
/// `available_capital`은 열린 포지션의 명목 가치를 차감한 주문 가능
/// 금액이며 항상 0 이상이어야 합니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Portfolio {
    /// 초기 자본
    pub initial_capital: Decimal,
    /// 현재 자본 (실현 손익 반영)
    pub current_capital: Decimal,
    /// 주문 가능 자본
    pub available_capital: Decimal,
    /// 누적 실현 손익
    pub cumulative_pnl: Decimal,
    /// 누적 수수료
    pub total_commission: Decimal,
}

impl Portfolio {
    /// 초기 자본으로 새 포트폴리오를 생성합니다.
    pub fn new(initial_capital: Decimal) -> Self {
        Self {
            initial_capital,
            current_capital: initial_capital,
            available_capital: initial_capital,
            cumulative_pnl: Decimal::ZERO,
            total_commission: Decimal::ZERO,
        }
    }

    /// 총자산 = 현재 자본 + 미실현 손익 합.
    pub fn equity(&self, unrealized: Decimal) -> Decimal {
        self.current_capital + unrealized
    }

    /// 초기 상태로 되돌립니다.
    pub fn reset(&mut self, initial_capital: Decimal) {
        *self = Self::new(initial_capital);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_new_portfolio() {
        let p = Portfolio::new(dec!(10000));
        assert_eq!(p.current_capital, dec!(10000));
        assert_eq!(p.available_capital, dec!(10000));
        assert_eq!(p.equity(dec!(150)), dec!(10150));
    }
}
