//! 1분봉 → 상위 타임프레임 집계.
//!
//! 그룹 키는 `floor(ts/Δ)·Δ`이며, 그룹별로 시가=첫 캔들, 종가=마지막
//! 캔들, 고가=최대, 저가=최소, 거래량=합으로 축약합니다. 캔들
//! 타임스탬프는 그룹 시작입니다.

use chrono::{TimeZone, Utc};
use quantlab_core::{Candle, Timeframe};
use rust_decimal::Decimal;

/// 1분봉을 대상 타임프레임으로 집계합니다.
///
/// 입력은 시간 오름차순이어야 하며, 출력의 `Σvolume`은 입력과 같습니다.
pub fn aggregate_candles(minute_candles: &[Candle], target: Timeframe) -> Vec<Candle> {
    group_candles(minute_candles, target)
        .into_iter()
        .map(|(key, group)| reduce_group(key, &group))
        .collect()
}

/// 집계 + 그룹별 동역학 지표.
pub fn aggregate_with_dynamics(
    minute_candles: &[Candle],
    target: Timeframe,
) -> Vec<(Candle, CandleDynamics)> {
    group_candles(minute_candles, target)
        .into_iter()
        .map(|(key, group)| {
            let candle = reduce_group(key, &group);
            let dynamics = CandleDynamics::from_group(&candle, &group);
            (candle, dynamics)
        })
        .collect()
}

/// 그룹 시작 타임스탬프(`floor(ts/Δ)·Δ`) 기준으로 1분봉을 묶습니다.
fn group_candles(minute_candles: &[Candle], target: Timeframe) -> Vec<(i64, Vec<Candle>)> {
    let step = target.duration_ms();
    let mut groups: Vec<(i64, Vec<Candle>)> = Vec::new();

    for candle in minute_candles {
        let key = candle.open_time_ms().div_euclid(step) * step;
        match groups.last_mut() {
            Some((last_key, group)) if *last_key == key => group.push(candle.clone()),
            _ => groups.push((key, vec![candle.clone()])),
        }
    }
    groups
}

fn reduce_group(key: i64, group: &[Candle]) -> Candle {
    let first = &group[0];
    let last = &group[group.len() - 1];

    let mut high = first.high;
    let mut low = first.low;
    let mut volume = Decimal::ZERO;
    for candle in group {
        if candle.high > high {
            high = candle.high;
        }
        if candle.low < low {
            low = candle.low;
        }
        volume += candle.volume;
    }
    Candle {
        open_time: Utc
            .timestamp_millis_opt(key)
            .single()
            .unwrap_or(first.open_time),
        open: first.open,
        high,
        low,
        close: last.close,
        volume,
    }
}

/// 상위 캔들의 그룹 내부 동역학 지표.
///
/// 필터가 선택적으로 소비하는 부가 컨텍스트입니다.
#[derive(Debug, Clone, PartialEq)]
pub struct CandleDynamics {
    /// 분당 가격 변화 (종가−시가)/분
    pub velocity: f64,
    /// 후반부 속도 − 전반부 속도
    pub velocity_acceleration: f64,
    /// 1분봉 거래량이 그룹 평균의 2배를 넘은 적이 있는지
    pub volume_spike: bool,
    /// 중간가 위에서 체결된 거래량 비율 (0~1)
    pub volume_above_mid: f64,
    /// 중간가 아래에서 체결된 거래량 비율 (0~1)
    pub volume_below_mid: f64,
    /// 몸통/꼬리 비율
    pub body_to_wick_ratio: f64,
    /// 종가의 구간 내 위치 (0~1)
    pub close_position_in_range: f64,
    /// 같은 방향 1분봉 최장 연속 수
    pub consecutive_direction: usize,
    /// 1분 수익률 표준편차 (%)
    pub intrabar_volatility: f64,
    /// 최대 |1분 수익률| / 평균 |1분 수익률|
    pub volatility_clustering: f64,
    /// 1분 방향 전환 횟수
    pub direction_reversals: usize,
    /// 그룹 내 최대 낙폭 (%)
    pub max_intrabar_drawdown: f64,
    /// 1분봉 평균 크기 (고저폭, %)
    pub avg_candle_size: f64,
}

impl CandleDynamics {
    fn from_group(candle: &Candle, group: &[Candle]) -> Self {
        let minutes = group.len().max(1) as f64;
        let open = candle.open_f64();
        let close = candle.close_f64();
        let high = candle.high_f64();
        let low = candle.low_f64();

        let velocity = (close - open) / minutes;
        let velocity_acceleration = {
            let mid = group.len() / 2;
            if mid == 0 || mid == group.len() {
                0.0
            } else {
                let first_half = &group[..mid];
                let second_half = &group[mid..];
                let v1 = (first_half[first_half.len() - 1].close_f64()
                    - first_half[0].open_f64())
                    / first_half.len() as f64;
                let v2 = (second_half[second_half.len() - 1].close_f64()
                    - second_half[0].open_f64())
                    / second_half.len() as f64;
                v2 - v1
            }
        };

        let total_volume: f64 = group.iter().map(Candle::volume_f64).sum();
        let avg_volume = total_volume / minutes;
        let volume_spike = avg_volume > 0.0
            && group
                .iter()
                .any(|c| c.volume_f64() > avg_volume * 2.0);

        let mid_price = (high + low) / 2.0;
        let above: f64 = group
            .iter()
            .filter(|c| c.close_f64() > mid_price)
            .map(Candle::volume_f64)
            .sum();
        let (volume_above_mid, volume_below_mid) = if total_volume > 0.0 {
            (above / total_volume, 1.0 - above / total_volume)
        } else {
            (0.0, 0.0)
        };

        let body = (close - open).abs();
        let wick = (high - low) - body;
        let body_to_wick_ratio = if wick > 0.0 { body / wick } else { body };

        let range = high - low;
        let close_position_in_range = if range > 0.0 {
            (close - low) / range
        } else {
            0.5
        };

        // 1분 종가 변화 시퀀스
        let returns: Vec<f64> = group
            .windows(2)
            .map(|w| {
                let prev = w[0].close_f64();
                if prev != 0.0 {
                    (w[1].close_f64() - prev) / prev * 100.0
                } else {
                    0.0
                }
            })
            .collect();

        let mut consecutive_direction = 0usize;
        let mut run = 0usize;
        let mut prev_sign = 0i8;
        let mut direction_reversals = 0usize;
        for &r in &returns {
            let sign = if r > 0.0 {
                1
            } else if r < 0.0 {
                -1
            } else {
                0
            };
            if sign != 0 && sign == prev_sign {
                run += 1;
            } else {
                if sign != 0 && prev_sign != 0 && sign != prev_sign {
                    direction_reversals += 1;
                }
                run = usize::from(sign != 0);
            }
            if sign != 0 {
                prev_sign = sign;
            }
            consecutive_direction = consecutive_direction.max(run);
        }

        let intrabar_volatility = if returns.is_empty() {
            0.0
        } else {
            let mean = returns.iter().sum::<f64>() / returns.len() as f64;
            (returns.iter().map(|r| (r - mean) * (r - mean)).sum::<f64>()
                / returns.len() as f64)
                .sqrt()
        };

        let abs_returns: Vec<f64> = returns.iter().map(|r| r.abs()).collect();
        let avg_abs = if abs_returns.is_empty() {
            0.0
        } else {
            abs_returns.iter().sum::<f64>() / abs_returns.len() as f64
        };
        let volatility_clustering = if avg_abs > 0.0 {
            abs_returns.iter().cloned().fold(0.0, f64::max) / avg_abs
        } else {
            0.0
        };

        let mut peak = f64::MIN;
        let mut max_intrabar_drawdown = 0.0f64;
        for c in group {
            peak = peak.max(c.high_f64());
            if peak > 0.0 {
                let dd = (peak - c.low_f64()) / peak * 100.0;
                max_intrabar_drawdown = max_intrabar_drawdown.max(dd);
            }
        }

        let avg_candle_size = group
            .iter()
            .map(|c| {
                let o = c.open_f64();
                if o != 0.0 {
                    (c.high_f64() - c.low_f64()) / o * 100.0
                } else {
                    0.0
                }
            })
            .sum::<f64>()
            / minutes;

        Self {
            velocity,
            velocity_acceleration,
            volume_spike,
            volume_above_mid,
            volume_below_mid,
            body_to_wick_ratio,
            close_position_in_range,
            consecutive_direction,
            intrabar_volatility,
            volatility_clustering,
            direction_reversals,
            max_intrabar_drawdown,
            avg_candle_size,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use rust_decimal_macros::dec;

    fn minute_series(n: usize) -> Vec<Candle> {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        (0..n)
            .map(|i| {
                let base = Decimal::from(100 + i as i64);
                Candle::new(
                    start + Duration::minutes(i as i64),
                    base,
                    base + dec!(2),
                    base - dec!(1),
                    base + dec!(1),
                    Decimal::from(10 + i as i64),
                )
            })
            .collect()
    }

    #[test]
    fn test_aggregation_reduces_by_group() {
        let minutes = minute_series(10);
        let aggregated = aggregate_candles(&minutes, Timeframe::M5);

        assert_eq!(aggregated.len(), 2);
        let first = &aggregated[0];
        assert_eq!(first.open_time, minutes[0].open_time);
        assert_eq!(first.open, minutes[0].open);
        assert_eq!(first.close, minutes[4].close);
        // 고가 = 구성 1분봉 고가의 최대값
        assert_eq!(first.high, minutes[4].high);
        assert_eq!(first.low, minutes[0].low);
        // 거래량 보존
        assert_eq!(first.volume, dec!(60)); // 10+11+12+13+14
    }

    #[test]
    fn test_aggregation_preserves_total_volume() {
        let minutes = minute_series(17);
        let aggregated = aggregate_candles(&minutes, Timeframe::M5);
        let input_total: Decimal = minutes.iter().map(|c| c.volume).sum();
        let output_total: Decimal = aggregated.iter().map(|c| c.volume).sum();
        assert_eq!(input_total, output_total);
        // ⌈17/5⌉ = 4 그룹
        assert_eq!(aggregated.len(), 4);
    }

    #[test]
    fn test_aggregation_determinism_on_synthetic_series() {
        use crate::synthetic::SyntheticMarketGenerator;

        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let minutes = 2 * 24 * 60;
        let series = SyntheticMarketGenerator::new(42, 50_000.0).generate(start, minutes);

        let m5 = aggregate_candles(&series, Timeframe::M5);
        assert_eq!(m5.len(), (minutes + 4) / 5);

        for (i, candle) in m5.iter().enumerate() {
            let group = &series[i * 5..((i + 1) * 5).min(series.len())];
            assert_eq!(candle.high, group.iter().map(|c| c.high).max().unwrap());
            assert_eq!(candle.low, group.iter().map(|c| c.low).min().unwrap());
            assert_eq!(candle.volume, group.iter().map(|c| c.volume).sum::<Decimal>());
        }

        // 같은 시드로 다시 생성해도 같은 집계 결과
        let series_again = SyntheticMarketGenerator::new(42, 50_000.0).generate(start, minutes);
        assert_eq!(aggregate_candles(&series_again, Timeframe::M5), m5);
    }

    #[test]
    fn test_dynamics_basics() {
        let minutes = minute_series(5);
        let result = aggregate_with_dynamics(&minutes, Timeframe::M5);
        assert_eq!(result.len(), 1);
        let (candle, dynamics) = &result[0];

        // 상승 시퀀스: 방향 전환 없음, 연속 방향 = 변화 수
        assert_eq!(dynamics.direction_reversals, 0);
        assert_eq!(dynamics.consecutive_direction, 4);
        assert!(dynamics.velocity > 0.0);
        assert!(dynamics.close_position_in_range > 0.5);
        assert!(candle.is_valid());
    }
}
