//! 진행률 이벤트 타입.
//!
//! 엔진과 데이터 계층이 발행하는 이벤트입니다. HTTP/SSE 변환은 외부
//! 경계의 책임이며, 여기서는 값 타입만 정의합니다.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 백테스트 진행률 이벤트.
///
/// `processed_candles`는 단조 증가합니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEvent {
    /// 백테스트 실행 ID
    pub backtest_id: Uuid,
    /// 진행률 (0 ~ 100)
    pub progress: f64,
    /// 처리한 캔들 수
    pub processed_candles: usize,
    /// 전체 캔들 수
    pub total_candles: usize,
    /// 현재 처리 중인 캔들 시각
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_date: Option<DateTime<Utc>>,
    /// 남은 예상 시간 (밀리초, 경과 시간 선형 외삽)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eta_ms: Option<i64>,
}

/// 데이터 다운로드 이벤트 종류.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DownloadEventKind {
    Progress,
    Complete,
    Error,
}

/// 데이터 다운로드 진행 이벤트.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownloadEvent {
    /// 이벤트 종류
    #[serde(rename = "type")]
    pub kind: DownloadEventKind,
    /// 받은 캔들 수
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loaded: Option<usize>,
    /// 전체 캔들 수 (추정)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<usize>,
    /// 진행률 (%)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub percent: Option<f64>,
    /// 캐시에서 읽은 수
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cached: Option<usize>,
    /// API에서 받은 수
    #[serde(skip_serializing_if = "Option::is_none")]
    pub downloaded: Option<usize>,
    /// 최종 캔들 수
    #[serde(skip_serializing_if = "Option::is_none")]
    pub candles_count: Option<usize>,
    /// 사람이 읽는 메시지
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl DownloadEvent {
    /// 진행 이벤트를 생성합니다.
    pub fn progress(message: impl Into<String>, loaded: Option<usize>, total: Option<usize>) -> Self {
        let percent = match (loaded, total) {
            (Some(l), Some(t)) if t > 0 => Some((l as f64 / t as f64 * 100.0).min(100.0)),
            _ => None,
        };
        Self {
            kind: DownloadEventKind::Progress,
            loaded,
            total,
            percent,
            cached: None,
            downloaded: None,
            candles_count: None,
            message: Some(message.into()),
        }
    }

    /// 완료 이벤트를 생성합니다.
    pub fn complete(cached: usize, downloaded: usize, candles_count: usize) -> Self {
        Self {
            kind: DownloadEventKind::Complete,
            loaded: None,
            total: None,
            percent: Some(100.0),
            cached: Some(cached),
            downloaded: Some(downloaded),
            candles_count: Some(candles_count),
            message: None,
        }
    }

    /// 오류 이벤트를 생성합니다.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            kind: DownloadEventKind::Error,
            loaded: None,
            total: None,
            percent: None,
            cached: None,
            downloaded: None,
            candles_count: None,
            message: Some(message.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_percent_derivation() {
        let event = DownloadEvent::progress("수신 중", Some(250), Some(1000));
        assert_eq!(event.percent, Some(25.0));
    }

    #[test]
    fn test_event_kind_serialization() {
        let event = DownloadEvent::complete(100, 50, 150);
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"complete\""));
    }
}
