//! 결정적 마켓 시뮬레이터.
//!
//! 포트폴리오와 거래 기록을 소유하며, 캔들마다 열린 포지션의 청산
//! 조건을 **손절 → 트레일링 → 익절** 우선순위로 검사합니다. 포지션은
//! 연 순서를 유지하는 Vec으로 관리해 순회 순서가 결정적입니다.

use chrono::{DateTime, Utc};
use quantlab_core::{
    Candle, ExitReason, Portfolio, Position, Side, StopLossRule, StopMode, TakeProfitMode,
    TakeProfitRule, Trade, TrailingRule, TrailingState,
};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

/// 체결 모델. `realistic`(종가 ± 슬리피지 1틱)만 규범적이며 나머지는
/// 예약 값입니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FillModel {
    Optimistic,
    Pessimistic,
    #[default]
    Realistic,
}

/// 시뮬레이터 설정.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulatorConfig {
    /// 초기 자본
    pub initial_capital: Decimal,
    /// 체결당 수수료율 (명목 금액의 %, 예: 0.1 = 0.1%)
    #[serde(default)]
    pub commission_pct: Decimal,
    /// 체결당 슬리피지 (가격의 %, 항상 불리한 방향)
    #[serde(default)]
    pub slippage_pct: Decimal,
    /// 최대 동시 포지션 수
    #[serde(default = "default_max_open_positions")]
    pub max_open_positions: usize,
    /// 체결 모델 (예약)
    #[serde(default)]
    pub fill_model: FillModel,
}

fn default_max_open_positions() -> usize {
    1
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            initial_capital: dec!(10_000),
            commission_pct: dec!(0.1),
            slippage_pct: dec!(0.05),
            max_open_positions: 1,
            fill_model: FillModel::Realistic,
        }
    }
}

/// 결정적 마켓 시뮬레이터.
#[derive(Debug)]
pub struct MarketSimulator {
    config: SimulatorConfig,
    portfolio: Portfolio,
    /// 연 순서 유지 (청산 검사도 이 순서)
    positions: Vec<Position>,
    trades: Vec<Trade>,
}

impl MarketSimulator {
    /// 설정으로 시뮬레이터를 생성합니다.
    pub fn new(config: SimulatorConfig) -> Self {
        let portfolio = Portfolio::new(config.initial_capital);
        Self {
            config,
            portfolio,
            positions: Vec::new(),
            trades: Vec::new(),
        }
    }

    /// 상태를 초기화합니다.
    pub fn reset(&mut self) {
        self.portfolio.reset(self.config.initial_capital);
        self.positions.clear();
        self.trades.clear();
    }

    // === 상태 조회 ===

    /// 심볼의 첫 열린 포지션.
    pub fn position(&self, symbol: &str) -> Option<&Position> {
        self.positions.iter().find(|p| p.symbol == symbol)
    }

    /// 심볼의 포지션 보유 여부.
    pub fn has_position(&self, symbol: &str) -> bool {
        self.positions.iter().any(|p| p.symbol == symbol)
    }

    /// 열린 포지션 수.
    pub fn open_position_count(&self) -> usize {
        self.positions.len()
    }

    /// 거래 기록.
    pub fn trades(&self) -> &[Trade] {
        &self.trades
    }

    /// 포트폴리오 상태.
    pub fn portfolio(&self) -> &Portfolio {
        &self.portfolio
    }

    /// 현재가 기준 미실현 손익 합계.
    pub fn unrealized_total(&self, price: Decimal) -> Decimal {
        self.positions.iter().map(|p| p.unrealized_at(price)).sum()
    }

    /// 총자산 = 현재 자본 + 미실현 손익 합.
    pub fn equity(&self, price: Decimal) -> Decimal {
        self.portfolio.equity(self.unrealized_total(price))
    }

    // === 포지션 열기 ===

    /// 신호 캔들의 종가로 포지션을 엽니다.
    ///
    /// 진입가는 종가에 슬리피지를 불리한 방향으로 적용한 값입니다.
    /// 리스크 기반 사이징이 가용 자본을 초과하거나 최대 포지션 수에
    /// 도달하면 None을 반환합니다.
    #[allow(clippy::too_many_arguments)]
    pub fn open_position(
        &mut self,
        side: Side,
        candle: &Candle,
        symbol: &str,
        stop_loss: Option<&StopLossRule>,
        take_profit: Option<&TakeProfitRule>,
        trailing: Option<&TrailingRule>,
        risk_pct: Decimal,
        atr: Option<f64>,
    ) -> Option<Position> {
        if self.positions.len() >= self.config.max_open_positions {
            debug!(max = self.config.max_open_positions, "최대 포지션 수 도달");
            return None;
        }

        let entry = self.apply_entry_slippage(candle.close, side);
        if entry <= Decimal::ZERO {
            return None;
        }

        let sl_level = stop_loss.and_then(|rule| stop_level(rule, entry, side, atr));
        let tp_level =
            take_profit.and_then(|rule| take_profit_level(rule, entry, sl_level, side, atr));

        // 단위당 리스크: |entry − SL|, SL 없으면 entry·2%
        let risk_per_unit = match sl_level {
            Some(sl) => (entry - sl).abs(),
            None => entry * dec!(0.02),
        };
        if risk_per_unit <= Decimal::ZERO {
            return None;
        }
        let quantity = self.portfolio.current_capital * risk_pct / dec!(100) / risk_per_unit;
        if quantity <= Decimal::ZERO {
            return None;
        }

        let notional = quantity * entry;
        if notional > self.portfolio.available_capital {
            debug!(%notional, available = %self.portfolio.available_capital, "가용 자본 부족");
            return None;
        }

        // 진입 명목 가치 차감, 수수료는 누계에만 기록
        self.portfolio.available_capital -= notional;
        self.portfolio.total_commission += notional * self.config.commission_pct / dec!(100);

        let position = Position {
            id: Uuid::new_v4(),
            symbol: symbol.to_string(),
            side,
            entry_price: entry,
            quantity,
            entry_time: candle.open_time,
            stop_loss: sl_level,
            take_profit: tp_level,
            trailing: trailing
                .map(|rule| TrailingState::new(entry, rule.activation_pct, rule.trail_pct)),
            unrealized_pnl: Decimal::ZERO,
        };
        self.positions.push(position.clone());
        Some(position)
    }

    // === 캔들 처리 ===

    /// 캔들 하나를 처리합니다.
    ///
    /// 열린 포지션을 연 순서대로 검사해 **손절 → 트레일링 → 익절**의
    /// 첫 번째 트리거로 청산하고, 트리거가 없으면 트레일링 상태를
    /// 갱신하고 종가 기준 미실현 손익을 기록합니다.
    pub fn process_candle(&mut self, candle: &Candle, symbol: &str) -> Vec<Trade> {
        let mut closed = Vec::new();
        let mut idx = 0;
        while idx < self.positions.len() {
            if self.positions[idx].symbol != symbol {
                idx += 1;
                continue;
            }

            if let Some((price, reason)) = exit_trigger(&self.positions[idx], candle) {
                let trade = self.close_at(idx, price, candle.open_time, reason);
                closed.push(trade);
                // 제거된 자리에 다음 포지션이 당겨지므로 idx 유지
                continue;
            }

            let position = &mut self.positions[idx];
            update_trailing(position, candle);
            position.unrealized_pnl = position.unrealized_at(candle.close);
            idx += 1;
        }
        closed
    }

    /// 심볼의 첫 포지션을 지정 가격으로 청산합니다 (신호/타임아웃 청산용).
    pub fn close_symbol_position(
        &mut self,
        symbol: &str,
        price: Decimal,
        time: DateTime<Utc>,
        reason: ExitReason,
    ) -> Option<Trade> {
        let idx = self.positions.iter().position(|p| p.symbol == symbol)?;
        Some(self.close_at(idx, price, time, reason))
    }

    /// 남은 포지션 전부를 지정 가격으로 강제 청산합니다.
    pub fn force_close_all(
        &mut self,
        price: Decimal,
        time: DateTime<Utc>,
        reason: ExitReason,
    ) -> Vec<Trade> {
        let mut closed = Vec::new();
        while !self.positions.is_empty() {
            closed.push(self.close_at(0, price, time, reason));
        }
        closed
    }

    /// 포지션을 청산하고 거래를 기록합니다.
    ///
    /// 청산가에는 슬리피지가 불리한 방향으로 적용됩니다 (롱 청산 매도
    /// ⇒ −, 숏 청산 매수 ⇒ +).
    fn close_at(
        &mut self,
        idx: usize,
        price: Decimal,
        time: DateTime<Utc>,
        reason: ExitReason,
    ) -> Trade {
        let position = self.positions.remove(idx);
        let exit = self.apply_exit_slippage(price, position.side);

        let gross = match position.side {
            Side::Long => (exit - position.entry_price) * position.quantity,
            Side::Short => (position.entry_price - exit) * position.quantity,
        };
        let pct_raw = if position.entry_price != Decimal::ZERO {
            (exit / position.entry_price - Decimal::ONE) * dec!(100)
        } else {
            Decimal::ZERO
        };
        let gross_pct = match position.side {
            Side::Long => pct_raw,
            Side::Short => -pct_raw,
        };

        let exit_notional = exit * position.quantity;
        let commission = exit_notional * self.config.commission_pct / dec!(100);
        let net = gross - commission;

        self.portfolio.current_capital += net;
        self.portfolio.cumulative_pnl += net;
        self.portfolio.total_commission += commission;
        self.portfolio.available_capital += exit_notional;

        let holding_ms = (time - position.entry_time).num_milliseconds().max(0);
        let trade = Trade {
            id: Uuid::new_v4(),
            symbol: position.symbol,
            side: position.side,
            entry_price: position.entry_price,
            exit_price: exit,
            entry_time: position.entry_time,
            exit_time: time,
            quantity: position.quantity,
            gross_pnl: gross,
            gross_pnl_pct: gross_pct,
            commission,
            net_pnl: net,
            exit_reason: reason,
            holding_ms,
        };
        self.trades.push(trade.clone());
        trade
    }

    /// 진입 슬리피지: 매수 ⇒ +, 매도(숏 진입) ⇒ −.
    fn apply_entry_slippage(&self, price: Decimal, side: Side) -> Decimal {
        let factor = self.config.slippage_pct / dec!(100);
        match side {
            Side::Long => price * (Decimal::ONE + factor),
            Side::Short => price * (Decimal::ONE - factor),
        }
    }

    /// 청산 슬리피지: 롱 청산 매도 ⇒ −, 숏 청산 매수 ⇒ +.
    fn apply_exit_slippage(&self, price: Decimal, side: Side) -> Decimal {
        let factor = self.config.slippage_pct / dec!(100);
        match side {
            Side::Long => price * (Decimal::ONE - factor),
            Side::Short => price * (Decimal::ONE + factor),
        }
    }
}

/// 손절 레벨 계산. 방향이 틀린 레벨은 무시합니다.
fn stop_level(
    rule: &StopLossRule,
    entry: Decimal,
    side: Side,
    atr: Option<f64>,
) -> Option<Decimal> {
    let distance = match rule.mode {
        StopMode::FixedPercent => entry * rule.value / dec!(100),
        StopMode::FixedPrice => {
            let level = rule.value;
            let valid = match side {
                Side::Long => level < entry,
                Side::Short => level > entry,
            };
            if !valid {
                debug!(%level, %entry, "고정 손절가가 진입가의 잘못된 방향에 있어 무시");
                return None;
            }
            return Some(level);
        }
        StopMode::AtrMultiple => {
            let atr = Decimal::from_f64(atr?)?;
            atr * rule.value
        }
    };
    if distance <= Decimal::ZERO {
        return None;
    }
    Some(match side {
        Side::Long => entry - distance,
        Side::Short => entry + distance,
    })
}

/// 익절 레벨 계산.
fn take_profit_level(
    rule: &TakeProfitRule,
    entry: Decimal,
    stop_loss: Option<Decimal>,
    side: Side,
    atr: Option<f64>,
) -> Option<Decimal> {
    let distance = match rule.mode {
        TakeProfitMode::FixedPercent => entry * rule.value / dec!(100),
        TakeProfitMode::FixedPrice => {
            let level = rule.value;
            let valid = match side {
                Side::Long => level > entry,
                Side::Short => level < entry,
            };
            if !valid {
                return None;
            }
            return Some(level);
        }
        TakeProfitMode::AtrMultiple => {
            let atr = Decimal::from_f64(atr?)?;
            atr * rule.value
        }
        TakeProfitMode::RiskReward => {
            let sl = stop_loss?;
            rule.value * (entry - sl).abs()
        }
    };
    if distance <= Decimal::ZERO {
        return None;
    }
    Some(match side {
        Side::Long => entry + distance,
        Side::Short => entry - distance,
    })
}

/// 청산 트리거 검사 (손절 → 트레일링 → 익절).
fn exit_trigger(position: &Position, candle: &Candle) -> Option<(Decimal, ExitReason)> {
    match position.side {
        Side::Long => {
            if let Some(sl) = position.stop_loss {
                if candle.low <= sl {
                    return Some((sl, ExitReason::StopLoss));
                }
            }
            if let Some(stop) = active_trailing_stop(position) {
                if candle.low <= stop {
                    return Some((stop, ExitReason::TrailingStop));
                }
            }
            if let Some(tp) = position.take_profit {
                if candle.high >= tp {
                    return Some((tp, ExitReason::TakeProfit));
                }
            }
        }
        Side::Short => {
            if let Some(sl) = position.stop_loss {
                if candle.high >= sl {
                    return Some((sl, ExitReason::StopLoss));
                }
            }
            if let Some(stop) = active_trailing_stop(position) {
                if candle.high >= stop {
                    return Some((stop, ExitReason::TrailingStop));
                }
            }
            if let Some(tp) = position.take_profit {
                if candle.low <= tp {
                    return Some((tp, ExitReason::TakeProfit));
                }
            }
        }
    }
    None
}

fn active_trailing_stop(position: &Position) -> Option<Decimal> {
    let trailing = position.trailing.as_ref()?;
    if trailing.activated {
        trailing.current_stop
    } else {
        None
    }
}

/// 트레일링 스탑 상태 갱신.
///
/// 피크를 추적하고, 활성화 후에는 스탑을 유리한 방향으로만 이동합니다.
/// 스탑은 본절(진입가)보다 나빠지지 않게 고정됩니다.
fn update_trailing(position: &mut Position, candle: &Candle) {
    let side = position.side;
    let entry = position.entry_price;
    let Some(trailing) = position.trailing.as_mut() else {
        return;
    };

    match side {
        Side::Long => {
            if candle.high > trailing.peak_price {
                trailing.peak_price = candle.high;
            }
            if !trailing.activated && entry > Decimal::ZERO {
                let profit_pct = (trailing.peak_price / entry - Decimal::ONE) * dec!(100);
                if profit_pct >= trailing.activation_pct {
                    trailing.activated = true;
                }
            }
            if trailing.activated {
                let candidate =
                    trailing.peak_price * (Decimal::ONE - trailing.trail_pct / dec!(100));
                let candidate = candidate.max(entry); // 본절 바닥
                let next = match trailing.current_stop {
                    Some(current) => current.max(candidate),
                    None => candidate,
                };
                trailing.current_stop = Some(next);
            }
        }
        Side::Short => {
            if candle.low < trailing.peak_price {
                trailing.peak_price = candle.low;
            }
            if !trailing.activated && trailing.peak_price > Decimal::ZERO {
                let profit_pct = (entry / trailing.peak_price - Decimal::ONE) * dec!(100);
                if profit_pct >= trailing.activation_pct {
                    trailing.activated = true;
                }
            }
            if trailing.activated {
                let candidate =
                    trailing.peak_price * (Decimal::ONE + trailing.trail_pct / dec!(100));
                let candidate = candidate.min(entry); // 본절 천장
                let next = match trailing.current_stop {
                    Some(current) => current.min(candidate),
                    None => candidate,
                };
                trailing.current_stop = Some(next);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn candle(minute: i64, open: Decimal, high: Decimal, low: Decimal, close: Decimal) -> Candle {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        Candle::new(
            start + Duration::minutes(minute),
            open,
            high,
            low,
            close,
            dec!(1000),
        )
    }

    fn no_friction_config() -> SimulatorConfig {
        SimulatorConfig {
            initial_capital: dec!(10_000),
            commission_pct: Decimal::ZERO,
            slippage_pct: Decimal::ZERO,
            max_open_positions: 1,
            fill_model: FillModel::Realistic,
        }
    }

    fn fixed_sl(pct: Decimal) -> StopLossRule {
        StopLossRule {
            mode: StopMode::FixedPercent,
            value: pct,
        }
    }

    #[test]
    fn test_open_long_with_percent_stop() {
        let mut sim = MarketSimulator::new(no_friction_config());
        let entry_candle = candle(0, dec!(100), dec!(100), dec!(100), dec!(100));
        let position = sim
            .open_position(
                Side::Long,
                &entry_candle,
                "BTCUSDT",
                Some(&fixed_sl(dec!(5))),
                None,
                None,
                dec!(1),
                None,
            )
            .unwrap();

        assert_eq!(position.entry_price, dec!(100));
        assert_eq!(position.stop_loss, Some(dec!(95)));
        // 리스크 1% of 10000 = 100, 단위당 리스크 5 → 수량 20
        assert_eq!(position.quantity, dec!(20));
        assert_eq!(sim.portfolio().available_capital, dec!(8000));
    }

    #[test]
    fn test_stop_loss_triggers_before_take_profit() {
        let mut sim = MarketSimulator::new(no_friction_config());
        let entry_candle = candle(0, dec!(100), dec!(100), dec!(100), dec!(100));
        sim.open_position(
            Side::Long,
            &entry_candle,
            "BTCUSDT",
            Some(&fixed_sl(dec!(5))),
            Some(&TakeProfitRule {
                mode: TakeProfitMode::FixedPercent,
                value: dec!(5),
            }),
            None,
            dec!(1),
            None,
        )
        .unwrap();

        // 같은 캔들에서 SL/TP 모두 도달 → SL 우선
        let wide = candle(1, dec!(100), dec!(110), dec!(90), dec!(100));
        let trades = sim.process_candle(&wide, "BTCUSDT");
        assert_eq!(trades.len(), 1);
        assert_eq!(trades[0].exit_reason, ExitReason::StopLoss);
        assert_eq!(trades[0].exit_price, dec!(95));
        assert!(!sim.has_position("BTCUSDT"));
    }

    #[test]
    fn test_short_stop_loss_above_entry() {
        let mut sim = MarketSimulator::new(no_friction_config());
        let entry_candle = candle(0, dec!(100), dec!(100), dec!(100), dec!(100));
        let position = sim
            .open_position(
                Side::Short,
                &entry_candle,
                "BTCUSDT",
                Some(&fixed_sl(dec!(5))),
                None,
                None,
                dec!(1),
                None,
            )
            .unwrap();
        assert_eq!(position.stop_loss, Some(dec!(105)));

        let up = candle(1, dec!(100), dec!(106), dec!(100), dec!(105));
        let trades = sim.process_candle(&up, "BTCUSDT");
        assert_eq!(trades[0].exit_reason, ExitReason::StopLoss);
        // 숏 손절 → 음수 손익
        assert!(trades[0].net_pnl < Decimal::ZERO);
    }

    #[test]
    fn test_trailing_activates_and_ratchets() {
        let mut sim = MarketSimulator::new(no_friction_config());
        let entry_candle = candle(0, dec!(100), dec!(100), dec!(100), dec!(100));
        sim.open_position(
            Side::Long,
            &entry_candle,
            "BTCUSDT",
            None,
            None,
            Some(&TrailingRule {
                activation_pct: dec!(2),
                trail_pct: dec!(1),
            }),
            dec!(1),
            None,
        )
        .unwrap();

        // 활성화 전
        sim.process_candle(&candle(1, dec!(100), dec!(101), dec!(100), dec!(101)), "BTCUSDT");
        assert!(!sim.position("BTCUSDT").unwrap().trailing.as_ref().unwrap().activated);

        // 2% 수익 → 활성화, 스탑 = 102·0.99 = 100.98
        sim.process_candle(&candle(2, dec!(101), dec!(102), dec!(101), dec!(102)), "BTCUSDT");
        let state = sim.position("BTCUSDT").unwrap().trailing.clone().unwrap();
        assert!(state.activated);
        assert_eq!(state.current_stop, Some(dec!(100.98)));

        // 피크 상승 → 스탑 상승 (104·0.99 = 102.96)
        sim.process_candle(&candle(3, dec!(102), dec!(104), dec!(102), dec!(104)), "BTCUSDT");
        let stop_after_rise = sim
            .position("BTCUSDT")
            .unwrap()
            .trailing
            .clone()
            .unwrap()
            .current_stop
            .unwrap();
        assert_eq!(stop_after_rise, dec!(102.96));

        // 하락해도 스탑은 내려가지 않고, 도달하면 트레일링 청산
        let trades =
            sim.process_candle(&candle(4, dec!(104), dec!(104), dec!(102), dec!(103)), "BTCUSDT");
        assert_eq!(trades.len(), 1);
        assert_eq!(trades[0].exit_reason, ExitReason::TrailingStop);
        assert_eq!(trades[0].exit_price, dec!(102.96));
    }

    #[test]
    fn test_slippage_and_commission_accounting() {
        let config = SimulatorConfig {
            initial_capital: dec!(10_000),
            commission_pct: dec!(0.1),
            slippage_pct: dec!(1),
            ..no_friction_config()
        };
        let mut sim = MarketSimulator::new(config);
        let entry_candle = candle(0, dec!(100), dec!(100), dec!(100), dec!(100));
        let position = sim
            .open_position(
                Side::Long,
                &entry_candle,
                "BTCUSDT",
                None,
                None,
                None,
                dec!(1),
                None,
            )
            .unwrap();
        // 매수 슬리피지: 100 → 101
        assert_eq!(position.entry_price, dec!(101));

        let trade = sim
            .close_symbol_position("BTCUSDT", dec!(110), entry_candle.open_time, ExitReason::Signal)
            .unwrap();
        // 매도 슬리피지: 110 → 108.9
        assert_eq!(trade.exit_price, dec!(108.9));
        assert_eq!(trade.net_pnl, trade.gross_pnl - trade.commission);
    }

    #[test]
    fn test_net_pnl_sums_to_capital_delta() {
        let config = SimulatorConfig {
            commission_pct: dec!(0.1),
            slippage_pct: dec!(0.05),
            ..no_friction_config()
        };
        let mut sim = MarketSimulator::new(config);

        for i in 0..5 {
            let base = dec!(100) + Decimal::from(i);
            let entry_candle = candle(i * 2, base, base, base, base);
            sim.open_position(
                Side::Long,
                &entry_candle,
                "BTCUSDT",
                Some(&fixed_sl(dec!(3))),
                None,
                None,
                dec!(1),
                None,
            );
            let exit_candle = candle(i * 2 + 1, base, base, base, base + dec!(1));
            sim.close_symbol_position(
                "BTCUSDT",
                base + dec!(1),
                exit_candle.open_time,
                ExitReason::Signal,
            );
        }

        let net_sum: Decimal = sim.trades().iter().map(|t| t.net_pnl).sum();
        let delta = sim.portfolio().current_capital - sim.portfolio().initial_capital;
        assert_eq!(net_sum, delta);
    }

    #[test]
    fn test_max_open_positions_enforced() {
        let config = SimulatorConfig {
            max_open_positions: 2,
            ..no_friction_config()
        };
        let mut sim = MarketSimulator::new(config);
        let entry_candle = candle(0, dec!(100), dec!(100), dec!(100), dec!(100));

        for _ in 0..2 {
            assert!(sim
                .open_position(
                    Side::Long,
                    &entry_candle,
                    "BTCUSDT",
                    Some(&fixed_sl(dec!(5))),
                    None,
                    None,
                    dec!(1),
                    None,
                )
                .is_some());
        }
        assert!(sim
            .open_position(
                Side::Long,
                &entry_candle,
                "BTCUSDT",
                Some(&fixed_sl(dec!(5))),
                None,
                None,
                dec!(1),
                None,
            )
            .is_none());
        assert_eq!(sim.open_position_count(), 2);
    }

    #[test]
    fn test_insufficient_available_capital_rejected() {
        let mut sim = MarketSimulator::new(no_friction_config());
        let entry_candle = candle(0, dec!(100), dec!(100), dec!(100), dec!(100));
        // 리스크 100%에 타이트한 손절 → 명목 가치가 가용 자본 초과
        let result = sim.open_position(
            Side::Long,
            &entry_candle,
            "BTCUSDT",
            Some(&fixed_sl(dec!(0.1))),
            None,
            None,
            dec!(100),
            None,
        );
        assert!(result.is_none());
        assert_eq!(sim.portfolio().available_capital, dec!(10_000));
    }

    #[test]
    fn test_force_close_all_uses_manual_reason() {
        let config = SimulatorConfig {
            max_open_positions: 3,
            ..no_friction_config()
        };
        let mut sim = MarketSimulator::new(config);
        let entry_candle = candle(0, dec!(100), dec!(100), dec!(100), dec!(100));
        for _ in 0..3 {
            sim.open_position(
                Side::Long,
                &entry_candle,
                "BTCUSDT",
                Some(&fixed_sl(dec!(5))),
                None,
                None,
                dec!(1),
                None,
            );
        }

        let time = entry_candle.open_time + Duration::minutes(10);
        let trades = sim.force_close_all(dec!(102), time, ExitReason::Manual);
        assert_eq!(trades.len(), 3);
        assert!(trades.iter().all(|t| t.exit_reason == ExitReason::Manual));
        assert_eq!(sim.open_position_count(), 0);
    }

    #[test]
    fn test_atr_multiple_stop() {
        let mut sim = MarketSimulator::new(no_friction_config());
        let entry_candle = candle(0, dec!(100), dec!(100), dec!(100), dec!(100));
        let position = sim
            .open_position(
                Side::Long,
                &entry_candle,
                "BTCUSDT",
                Some(&StopLossRule {
                    mode: StopMode::AtrMultiple,
                    value: dec!(2),
                }),
                Some(&TakeProfitRule {
                    mode: TakeProfitMode::RiskReward,
                    value: dec!(3),
                }),
                None,
                dec!(1),
                Some(1.5),
            )
            .unwrap();

        // SL = 100 − 1.5·2 = 97, TP = 100 + 3·3 = 109
        assert_eq!(position.stop_loss, Some(dec!(97)));
        assert_eq!(position.take_profit, Some(dec!(109)));
    }
}
