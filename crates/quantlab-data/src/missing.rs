//! 누락 구간 탐색.
//!
//! 요청 구간을 타임프레임 간격으로 열거하고, 캐시에 없는 타임스탬프를
//! 연속 구간으로 접어 반환합니다.

use std::collections::HashSet;

use chrono::{DateTime, TimeZone, Utc};
use quantlab_core::{Candle, Timeframe};

/// 닫힌 시간 구간.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// `[start, end]`에서 캐시에 없는 타임스탬프를 연속 구간으로 반환합니다.
///
/// 요구 타임스탬프는 `t₀, t₀+Δ, … ≤ t₁`이며 t₀는 타임프레임에 정렬되어
/// 있다고 가정합니다 (호출자가 `align_down`으로 정렬).
pub fn missing_ranges(
    existing: &[Candle],
    timeframe: Timeframe,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Vec<TimeRange> {
    let step = timeframe.duration_ms();
    let start_ms = start.timestamp_millis();
    let end_ms = end.timestamp_millis();
    if start_ms > end_ms {
        return Vec::new();
    }

    let present: HashSet<i64> = existing.iter().map(Candle::open_time_ms).collect();

    let mut ranges: Vec<(i64, i64)> = Vec::new();
    let mut open: Option<(i64, i64)> = None;
    let mut ts = start_ms;
    while ts <= end_ms {
        if present.contains(&ts) {
            if let Some(range) = open.take() {
                ranges.push(range);
            }
        } else {
            open = Some(match open {
                Some((first, _)) => (first, ts),
                None => (ts, ts),
            });
        }
        ts += step;
    }
    if let Some(range) = open {
        ranges.push(range);
    }

    ranges
        .into_iter()
        .filter_map(|(a, b)| {
            Some(TimeRange {
                start: Utc.timestamp_millis_opt(a).single()?,
                end: Utc.timestamp_millis_opt(b).single()?,
            })
        })
        .collect()
}

/// 구간에 필요한 전체 캔들 수: `⌊(end − start)/Δ⌋ + 1`.
pub fn expected_count(timeframe: Timeframe, start: DateTime<Utc>, end: DateTime<Utc>) -> usize {
    let span = end.timestamp_millis() - start.timestamp_millis();
    if span < 0 {
        return 0;
    }
    (span / timeframe.duration_ms()) as usize + 1
}
