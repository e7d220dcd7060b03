//! 성과 지표 계산기.
//!
//! 거래 기록과 자산 곡선에서 수익률, 낙폭, 리스크 조정 수익률, 거래
//! 통계를 계산합니다. 순수 함수이며 거래가 없으면 모든 지표가 0입니다.

use chrono::{DateTime, Datelike, Utc};
use quantlab_core::{Side, Trade};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// 연율화 기준 일수.
const DAYS_PER_YEAR: f64 = 365.0;
/// CAGR 연 환산 (밀리초).
const MS_PER_YEAR: f64 = 365.25 * 86_400_000.0;

/// 자산 곡선의 한 점.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    /// 캔들 시각
    pub timestamp: DateTime<Utc>,
    /// 총자산 (자본 + 미실현)
    pub equity: Decimal,
    /// 고점 대비 낙폭 (절대값, ≥ 0)
    pub drawdown_abs: Decimal,
    /// 고점 대비 낙폭 (%, 0~100)
    pub drawdown_pct: f64,
    /// 열린 포지션 수
    pub open_positions: usize,
}

/// 성과 지표.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    // === 수익률 ===
    /// 총 수익률 (%)
    pub total_return_pct: f64,
    /// 총 수익 (절대값)
    pub total_return_abs: Decimal,
    /// 연복리 수익률 (%, 기간 0이면 총 수익률)
    pub cagr_pct: f64,
    /// 월평균 수익률 (%)
    pub monthly_avg_return_pct: f64,

    // === 낙폭 ===
    /// 최대 낙폭 (%)
    pub max_drawdown_pct: f64,
    /// 최대 낙폭 (절대값)
    pub max_drawdown_abs: Decimal,
    /// 최장 낙폭 지속 기간 (일)
    pub max_drawdown_duration_days: f64,

    // === 리스크 조정 ===
    /// 샤프 비율 (무위험 수익률 0)
    pub sharpe_ratio: f64,
    /// 소르티노 비율
    pub sortino_ratio: f64,
    /// 칼마 비율 (CAGR / 최대 낙폭, 낙폭 0이면 0)
    pub calmar_ratio: f64,

    // === 거래 통계 ===
    pub total_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    /// 승률 (%)
    pub win_rate_pct: f64,
    /// 프로핏 팩터. 손실이 없고 이익이 있으면 무한대이며 직렬화 시
    /// "inf" 문자열로 보존됩니다.
    #[serde(with = "profit_factor_serde")]
    pub profit_factor: f64,
    /// 평균 수익 거래 (%)
    pub avg_win_pct: f64,
    /// 평균 손실 거래 (%)
    pub avg_loss_pct: f64,
    /// 평균 거래 (%)
    pub avg_trade_pct: f64,
    /// 최대 수익 거래 (%)
    pub largest_win_pct: f64,
    /// 최대 손실 거래 (%)
    pub largest_loss_pct: f64,
    pub max_consecutive_wins: usize,
    pub max_consecutive_losses: usize,

    // === 노출 ===
    pub long_trades: usize,
    pub short_trades: usize,
    pub long_win_rate_pct: f64,
    pub short_win_rate_pct: f64,
    /// 평균 보유 시간 (분)
    pub avg_holding_minutes: f64,
    /// 시장 노출 시간 비율 (%)
    pub time_in_market_pct: f64,

    // === 자본 ===
    pub initial_capital: Decimal,
    pub final_capital: Decimal,
    pub peak_capital: Decimal,
    pub total_commission: Decimal,
}

impl Default for PerformanceMetrics {
    fn default() -> Self {
        Self {
            total_return_pct: 0.0,
            total_return_abs: Decimal::ZERO,
            cagr_pct: 0.0,
            monthly_avg_return_pct: 0.0,
            max_drawdown_pct: 0.0,
            max_drawdown_abs: Decimal::ZERO,
            max_drawdown_duration_days: 0.0,
            sharpe_ratio: 0.0,
            sortino_ratio: 0.0,
            calmar_ratio: 0.0,
            total_trades: 0,
            winning_trades: 0,
            losing_trades: 0,
            win_rate_pct: 0.0,
            profit_factor: 0.0,
            avg_win_pct: 0.0,
            avg_loss_pct: 0.0,
            avg_trade_pct: 0.0,
            largest_win_pct: 0.0,
            largest_loss_pct: 0.0,
            max_consecutive_wins: 0,
            max_consecutive_losses: 0,
            long_trades: 0,
            short_trades: 0,
            long_win_rate_pct: 0.0,
            short_win_rate_pct: 0.0,
            avg_holding_minutes: 0.0,
            time_in_market_pct: 0.0,
            initial_capital: Decimal::ZERO,
            final_capital: Decimal::ZERO,
            peak_capital: Decimal::ZERO,
            total_commission: Decimal::ZERO,
        }
    }
}

/// 거래/자산 곡선에서 전체 지표를 계산합니다.
///
/// `range`는 백테스트가 실제로 다룬 `[t₀, t₁]` 구간입니다.
pub fn calculate_metrics(
    trades: &[Trade],
    equity_curve: &[EquityPoint],
    initial_capital: Decimal,
    total_commission: Decimal,
    range: (DateTime<Utc>, DateTime<Utc>),
) -> PerformanceMetrics {
    if trades.is_empty() {
        return PerformanceMetrics {
            initial_capital,
            final_capital: equity_curve
                .last()
                .map(|p| p.equity)
                .unwrap_or(initial_capital),
            ..Default::default()
        };
    }

    let mut metrics = PerformanceMetrics {
        initial_capital,
        total_commission,
        ..Default::default()
    };

    let final_equity = equity_curve
        .last()
        .map(|p| p.equity)
        .unwrap_or(initial_capital);
    metrics.final_capital = final_equity;
    metrics.peak_capital = equity_curve
        .iter()
        .map(|p| p.equity)
        .max()
        .unwrap_or(initial_capital);

    // === 수익률 ===
    let initial_f = initial_capital.to_f64().unwrap_or(0.0);
    let final_f = final_equity.to_f64().unwrap_or(0.0);
    if initial_f > 0.0 {
        metrics.total_return_pct = (final_f / initial_f - 1.0) * 100.0;
    }
    metrics.total_return_abs = final_equity - initial_capital;

    let (t0, t1) = range;
    let years = (t1 - t0).num_milliseconds() as f64 / MS_PER_YEAR;
    metrics.cagr_pct = if years > 0.0 && initial_f > 0.0 && final_f > 0.0 {
        ((final_f / initial_f).powf(1.0 / years) - 1.0) * 100.0
    } else {
        metrics.total_return_pct
    };
    metrics.monthly_avg_return_pct = monthly_avg_return(equity_curve);

    // === 낙폭 ===
    let (max_dd_pct, max_dd_abs, max_dd_days) = drawdown_stats(equity_curve);
    metrics.max_drawdown_pct = max_dd_pct;
    metrics.max_drawdown_abs = max_dd_abs;
    metrics.max_drawdown_duration_days = max_dd_days;

    // === 리스크 조정 ===
    let returns = point_returns(equity_curve);
    let (sharpe, sortino) = risk_ratios(&returns);
    metrics.sharpe_ratio = sharpe;
    metrics.sortino_ratio = sortino;
    metrics.calmar_ratio = if max_dd_pct > 0.0 {
        metrics.cagr_pct / max_dd_pct
    } else {
        0.0
    };

    // === 거래 통계 ===
    trade_stats(trades, &mut metrics);

    // === 노출 ===
    exposure_stats(trades, t0, t1, &mut metrics);

    metrics
}

/// 자산 곡선의 점별 수익률.
fn point_returns(equity_curve: &[EquityPoint]) -> Vec<f64> {
    equity_curve
        .windows(2)
        .filter_map(|w| {
            let prev = w[0].equity.to_f64()?;
            let curr = w[1].equity.to_f64()?;
            (prev > 0.0).then(|| curr / prev - 1.0)
        })
        .collect()
}

/// 샤프/소르티노 (일 단위 연율화: 평균 ·365, 표준편차 ·√365).
fn risk_ratios(returns: &[f64]) -> (f64, f64) {
    if returns.is_empty() {
        return (0.0, 0.0);
    }
    let n = returns.len() as f64;
    let mean = returns.iter().sum::<f64>() / n;
    let variance = returns.iter().map(|r| (r - mean) * (r - mean)).sum::<f64>() / n;
    let std = variance.sqrt();

    let annual_return = mean * DAYS_PER_YEAR;
    let annual_std = std * DAYS_PER_YEAR.sqrt();
    let sharpe = if annual_std > 0.0 {
        annual_return / annual_std
    } else {
        0.0
    };

    // 하방 편차: 음수 수익률의 RMS
    let downside_sq: f64 = returns.iter().filter(|r| **r < 0.0).map(|r| r * r).sum();
    let downside = (downside_sq / n).sqrt() * DAYS_PER_YEAR.sqrt();
    let sortino = if downside > 0.0 {
        annual_return / downside
    } else {
        0.0
    };
    (sharpe, sortino)
}

/// 최대 낙폭(%·절대값)과 최장 낙폭 지속 기간(일).
fn drawdown_stats(equity_curve: &[EquityPoint]) -> (f64, Decimal, f64) {
    let mut max_pct = 0.0f64;
    let mut max_abs = Decimal::ZERO;
    let mut longest_days = 0.0f64;
    let mut dd_start: Option<DateTime<Utc>> = None;

    for point in equity_curve {
        if point.drawdown_pct > max_pct {
            max_pct = point.drawdown_pct;
            max_abs = point.drawdown_abs;
        }
        if point.drawdown_pct > 0.0 {
            let start = *dd_start.get_or_insert(point.timestamp);
            let days = (point.timestamp - start).num_milliseconds() as f64 / 86_400_000.0;
            longest_days = longest_days.max(days);
        } else {
            dd_start = None;
        }
    }
    (max_pct, max_abs, longest_days)
}

/// 월말 자산 기준 월평균 수익률 (%).
fn monthly_avg_return(equity_curve: &[EquityPoint]) -> f64 {
    let mut month_ends: Vec<(i32, u32, f64)> = Vec::new();
    for point in equity_curve {
        let Some(equity) = point.equity.to_f64() else {
            continue;
        };
        let key = (point.timestamp.year(), point.timestamp.month());
        match month_ends.last_mut() {
            Some((y, m, e)) if (*y, *m) == key => *e = equity,
            _ => month_ends.push((key.0, key.1, equity)),
        }
    }
    let returns: Vec<f64> = month_ends
        .windows(2)
        .filter_map(|w| {
            let prev = w[0].2;
            (prev > 0.0).then(|| (w[1].2 - prev) / prev * 100.0)
        })
        .collect();
    if returns.is_empty() {
        0.0
    } else {
        returns.iter().sum::<f64>() / returns.len() as f64
    }
}

fn trade_stats(trades: &[Trade], metrics: &mut PerformanceMetrics) {
    metrics.total_trades = trades.len();

    let mut gross_profit = 0.0f64;
    let mut gross_loss = 0.0f64;
    let mut win_pcts: Vec<f64> = Vec::new();
    let mut loss_pcts: Vec<f64> = Vec::new();
    let mut streak_wins = 0usize;
    let mut streak_losses = 0usize;

    for trade in trades {
        let pct = trade.gross_pnl_pct.to_f64().unwrap_or(0.0);

        if trade.net_pnl > Decimal::ZERO {
            metrics.winning_trades += 1;
            gross_profit += trade.gross_pnl.to_f64().unwrap_or(0.0).max(0.0);
            win_pcts.push(pct);
            streak_wins += 1;
            streak_losses = 0;
        } else if trade.net_pnl < Decimal::ZERO {
            metrics.losing_trades += 1;
            gross_loss += trade.gross_pnl.to_f64().unwrap_or(0.0).min(0.0);
            loss_pcts.push(pct);
            streak_losses += 1;
            streak_wins = 0;
        } else {
            streak_wins = 0;
            streak_losses = 0;
        }
        metrics.max_consecutive_wins = metrics.max_consecutive_wins.max(streak_wins);
        metrics.max_consecutive_losses = metrics.max_consecutive_losses.max(streak_losses);

        metrics.largest_win_pct = metrics.largest_win_pct.max(pct);
        metrics.largest_loss_pct = metrics.largest_loss_pct.min(pct);
    }

    if metrics.total_trades > 0 {
        metrics.win_rate_pct =
            metrics.winning_trades as f64 / metrics.total_trades as f64 * 100.0;
    }

    metrics.profit_factor = if gross_loss.abs() > 0.0 {
        gross_profit / gross_loss.abs()
    } else if gross_profit > 0.0 {
        f64::INFINITY
    } else {
        0.0
    };

    let mean = |values: &[f64]| {
        if values.is_empty() {
            0.0
        } else {
            values.iter().sum::<f64>() / values.len() as f64
        }
    };
    metrics.avg_win_pct = mean(&win_pcts);
    metrics.avg_loss_pct = mean(&loss_pcts);
    let all_pcts: Vec<f64> = trades
        .iter()
        .map(|t| t.gross_pnl_pct.to_f64().unwrap_or(0.0))
        .collect();
    metrics.avg_trade_pct = mean(&all_pcts);
}

fn exposure_stats(
    trades: &[Trade],
    t0: DateTime<Utc>,
    t1: DateTime<Utc>,
    metrics: &mut PerformanceMetrics,
) {
    let mut long_wins = 0usize;
    let mut short_wins = 0usize;
    let mut holding_total_ms = 0i64;

    for trade in trades {
        holding_total_ms += trade.holding_ms;
        match trade.side {
            Side::Long => {
                metrics.long_trades += 1;
                if trade.is_winner() {
                    long_wins += 1;
                }
            }
            Side::Short => {
                metrics.short_trades += 1;
                if trade.is_winner() {
                    short_wins += 1;
                }
            }
        }
    }

    if metrics.long_trades > 0 {
        metrics.long_win_rate_pct = long_wins as f64 / metrics.long_trades as f64 * 100.0;
    }
    if metrics.short_trades > 0 {
        metrics.short_win_rate_pct = short_wins as f64 / metrics.short_trades as f64 * 100.0;
    }
    metrics.avg_holding_minutes =
        holding_total_ms as f64 / trades.len().max(1) as f64 / 60_000.0;

    let span_ms = (t1 - t0).num_milliseconds();
    if span_ms > 0 {
        metrics.time_in_market_pct = holding_total_ms as f64 / span_ms as f64 * 100.0;
    }
}

/// 프로핏 팩터 직렬화: 무한대를 "inf" 문자열로 보존합니다.
mod profit_factor_serde {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if value.is_infinite() {
            serializer.serialize_str("inf")
        } else {
            serializer.serialize_f64(*value)
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Num(f64),
            Text(String),
        }
        Ok(match Repr::deserialize(deserializer)? {
            Repr::Num(n) => n,
            Repr::Text(_) => f64::INFINITY,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use quantlab_core::ExitReason;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn trade(net: Decimal, pct: Decimal, side: Side, holding_minutes: i64) -> Trade {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        Trade {
            id: Uuid::new_v4(),
            symbol: "BTCUSDT".to_string(),
            side,
            entry_price: dec!(100),
            exit_price: dec!(100) + net,
            entry_time: start,
            exit_time: start + Duration::minutes(holding_minutes),
            quantity: Decimal::ONE,
            gross_pnl: net,
            gross_pnl_pct: pct,
            commission: Decimal::ZERO,
            net_pnl: net,
            exit_reason: ExitReason::Signal,
            holding_ms: holding_minutes * 60_000,
        }
    }

    fn equity_points(values: &[f64]) -> Vec<EquityPoint> {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let mut peak = f64::MIN;
        values
            .iter()
            .enumerate()
            .map(|(i, &v)| {
                peak = peak.max(v);
                EquityPoint {
                    timestamp: start + Duration::days(i as i64),
                    equity: Decimal::from_f64_retain(v).unwrap(),
                    drawdown_abs: Decimal::from_f64_retain(peak - v).unwrap(),
                    drawdown_pct: if peak > 0.0 { (peak - v) / peak * 100.0 } else { 0.0 },
                    open_positions: 0,
                }
            })
            .collect()
    }

    #[test]
    fn test_no_trades_all_zero() {
        let now = Utc::now();
        let metrics = calculate_metrics(&[], &[], dec!(10_000), Decimal::ZERO, (now, now));
        assert_eq!(metrics.total_trades, 0);
        assert_eq!(metrics.profit_factor, 0.0);
        assert_eq!(metrics.sharpe_ratio, 0.0);
        assert_eq!(metrics.total_return_pct, 0.0);
    }

    #[test]
    fn test_win_rate_and_streaks() {
        let trades = vec![
            trade(dec!(10), dec!(1), Side::Long, 60),
            trade(dec!(10), dec!(1), Side::Long, 60),
            trade(dec!(-5), dec!(-0.5), Side::Short, 30),
            trade(dec!(10), dec!(1), Side::Long, 60),
        ];
        let curve = equity_points(&[10_000.0, 10_010.0, 10_020.0, 10_015.0, 10_025.0]);
        let t0 = curve[0].timestamp;
        let t1 = curve[4].timestamp;
        let metrics = calculate_metrics(&trades, &curve, dec!(10_000), Decimal::ZERO, (t0, t1));

        assert_eq!(metrics.total_trades, 4);
        assert_eq!(metrics.winning_trades, 3);
        assert_eq!(metrics.losing_trades, 1);
        assert_eq!(metrics.win_rate_pct, 75.0);
        assert_eq!(metrics.max_consecutive_wins, 2);
        assert_eq!(metrics.max_consecutive_losses, 1);
        assert_eq!(metrics.long_trades, 3);
        assert_eq!(metrics.short_trades, 1);
        assert_eq!(metrics.long_win_rate_pct, 100.0);
        assert_eq!(metrics.short_win_rate_pct, 0.0);
        // 프로핏 팩터 = 30 / 5
        assert!((metrics.profit_factor - 6.0).abs() < 1e-9);
    }

    #[test]
    fn test_profit_factor_infinity_serialized_as_sentinel() {
        let trades = vec![trade(dec!(10), dec!(1), Side::Long, 60)];
        let curve = equity_points(&[10_000.0, 10_010.0]);
        let metrics = calculate_metrics(
            &trades,
            &curve,
            dec!(10_000),
            Decimal::ZERO,
            (curve[0].timestamp, curve[1].timestamp),
        );
        assert!(metrics.profit_factor.is_infinite());

        let json = serde_json::to_string(&metrics).unwrap();
        assert!(json.contains("\"profit_factor\":\"inf\""));

        let back: PerformanceMetrics = serde_json::from_str(&json).unwrap();
        assert!(back.profit_factor.is_infinite());
    }

    #[test]
    fn test_drawdown_stats() {
        let curve = equity_points(&[10_000.0, 11_000.0, 9_900.0, 10_450.0, 11_100.0]);
        let (max_pct, _, _) = drawdown_stats(&curve);
        // 고점 11000 → 9900: 10%
        assert!((max_pct - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_single_trade_zero_stddev_sharpe_is_zero() {
        let trades = vec![trade(dec!(0), dec!(0), Side::Long, 60)];
        let curve = equity_points(&[10_000.0, 10_000.0, 10_000.0]);
        let metrics = calculate_metrics(
            &trades,
            &curve,
            dec!(10_000),
            Decimal::ZERO,
            (curve[0].timestamp, curve[2].timestamp),
        );
        assert_eq!(metrics.sharpe_ratio, 0.0);
    }
}
