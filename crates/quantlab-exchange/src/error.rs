//! 거래소 오류.

use thiserror::Error;

/// 거래소 API 오류.
#[derive(Debug, Clone, Error)]
pub enum ExchangeError {
    /// 네트워크 오류 (일시적)
    #[error("네트워크 오류: {0}")]
    Network(String),

    /// Rate Limit 초과. 서버가 대기 시간을 지정할 수 있습니다.
    #[error("rate limit 초과 (대기 {retry_after_ms:?}ms)")]
    RateLimited { retry_after_ms: Option<u64> },

    /// 요청 시간 초과
    #[error("요청 시간 초과 ({timeout_secs}초)")]
    Timeout { timeout_secs: u64 },

    /// 응답 형식 오류
    #[error("응답 형식 오류: {0}")]
    InvalidResponse(String),

    /// 알 수 없는 심볼
    #[error("알 수 없는 심볼: {0}")]
    SymbolNotFound(String),
}

impl ExchangeError {
    /// 재시도 가능한 일시적 오류인지 확인.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ExchangeError::Network(_)
                | ExchangeError::RateLimited { .. }
                | ExchangeError::Timeout { .. }
        )
    }

    /// 오류에 지정된 재시도 대기 시간 (밀리초).
    pub fn retry_delay_ms(&self) -> Option<u64> {
        match self {
            ExchangeError::RateLimited { retry_after_ms } => *retry_after_ms,
            _ => None,
        }
    }
}
