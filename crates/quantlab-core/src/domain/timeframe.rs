//! 타임프레임 정의와 구간 정렬 헬퍼.
//!
//! 모든 타임프레임은 고정 밀리초 길이를 가지며(1M은 정렬 목적상 30일로
//! 취급), 캔들 타임스탬프는 `align_down`으로 구간 시작에 정렬됩니다.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 밀리초 단위 상수.
const MS_PER_MINUTE: i64 = 60_000;
const MS_PER_HOUR: i64 = 60 * MS_PER_MINUTE;
const MS_PER_DAY: i64 = 24 * MS_PER_HOUR;

/// 캔들 타임프레임.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Timeframe {
    /// 1분
    M1,
    /// 3분
    M3,
    /// 5분
    M5,
    /// 15분
    M15,
    /// 30분
    M30,
    /// 1시간
    H1,
    /// 2시간
    H2,
    /// 4시간
    H4,
    /// 6시간
    H6,
    /// 12시간
    H12,
    /// 1일
    D1,
    /// 1주
    W1,
    /// 1개월 (정렬 목적상 30일)
    Mo1,
}

impl Timeframe {
    /// 전체 타임프레임 목록 (길이 오름차순).
    pub const ALL: [Timeframe; 13] = [
        Timeframe::M1,
        Timeframe::M3,
        Timeframe::M5,
        Timeframe::M15,
        Timeframe::M30,
        Timeframe::H1,
        Timeframe::H2,
        Timeframe::H4,
        Timeframe::H6,
        Timeframe::H12,
        Timeframe::D1,
        Timeframe::W1,
        Timeframe::Mo1,
    ];

    /// 구간 길이 (밀리초).
    pub fn duration_ms(self) -> i64 {
        match self {
            Timeframe::M1 => MS_PER_MINUTE,
            Timeframe::M3 => 3 * MS_PER_MINUTE,
            Timeframe::M5 => 5 * MS_PER_MINUTE,
            Timeframe::M15 => 15 * MS_PER_MINUTE,
            Timeframe::M30 => 30 * MS_PER_MINUTE,
            Timeframe::H1 => MS_PER_HOUR,
            Timeframe::H2 => 2 * MS_PER_HOUR,
            Timeframe::H4 => 4 * MS_PER_HOUR,
            Timeframe::H6 => 6 * MS_PER_HOUR,
            Timeframe::H12 => 12 * MS_PER_HOUR,
            Timeframe::D1 => MS_PER_DAY,
            Timeframe::W1 => 7 * MS_PER_DAY,
            Timeframe::Mo1 => 30 * MS_PER_DAY,
        }
    }

    /// 타임스탬프를 구간 시작으로 내림 정렬.
    pub fn align_down(self, ts: DateTime<Utc>) -> DateTime<Utc> {
        let step = self.duration_ms();
        let ms = ts.timestamp_millis();
        let aligned = ms.div_euclid(step) * step;
        Utc.timestamp_millis_opt(aligned)
            .single()
            .unwrap_or(ts)
    }

    /// 타임스탬프가 구간 시작에 정렬되어 있는지 확인.
    pub fn is_aligned(self, ts: DateTime<Utc>) -> bool {
        ts.timestamp_millis().rem_euclid(self.duration_ms()) == 0
    }

    /// 문자열 태그 ("1m" 등).
    pub fn as_str(self) -> &'static str {
        match self {
            Timeframe::M1 => "1m",
            Timeframe::M3 => "3m",
            Timeframe::M5 => "5m",
            Timeframe::M15 => "15m",
            Timeframe::M30 => "30m",
            Timeframe::H1 => "1h",
            Timeframe::H2 => "2h",
            Timeframe::H4 => "4h",
            Timeframe::H6 => "6h",
            Timeframe::H12 => "12h",
            Timeframe::D1 => "1d",
            Timeframe::W1 => "1w",
            Timeframe::Mo1 => "1M",
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Timeframe {
    type Err = String;

    // 분/월 구분("1m" vs "1M") 때문에 대소문자를 구분합니다.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "1m" => Ok(Timeframe::M1),
            "3m" => Ok(Timeframe::M3),
            "5m" => Ok(Timeframe::M5),
            "15m" => Ok(Timeframe::M15),
            "30m" => Ok(Timeframe::M30),
            "1h" => Ok(Timeframe::H1),
            "2h" => Ok(Timeframe::H2),
            "4h" => Ok(Timeframe::H4),
            "6h" => Ok(Timeframe::H6),
            "12h" => Ok(Timeframe::H12),
            "1d" => Ok(Timeframe::D1),
            "1w" => Ok(Timeframe::W1),
            "1M" => Ok(Timeframe::Mo1),
            other => Err(format!("알 수 없는 타임프레임: {other}")),
        }
    }
}

impl TryFrom<String> for Timeframe {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Timeframe> for String {
    fn from(value: Timeframe) -> Self {
        value.as_str().to_string()
    }
}
