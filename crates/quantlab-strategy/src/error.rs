//! 전략 크레이트 오류.

use thiserror::Error;

/// 전략 오류.
#[derive(Debug, Clone, Error)]
pub enum StrategyError {
    /// 스키마/파라미터 검증 실패
    #[error("유효하지 않은 전략: {0}")]
    Invalid(String),

    /// 표현식 파싱 실패
    #[error("표현식 오류 (위치 {position}): {message}")]
    Expression { message: String, position: usize },

    /// 전략 조회 실패
    #[error("전략을 찾을 수 없음: {0}")]
    NotFound(String),
}

/// 전략 결과 타입.
pub type Result<T> = std::result::Result<T, StrategyError>;
