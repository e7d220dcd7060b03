//! 데이터 계층 오류.

use quantlab_exchange::ExchangeError;
use thiserror::Error;

/// 데이터 계층 오류.
#[derive(Debug, Error)]
pub enum DataError {
    /// 저장소 질의 실패
    #[error("저장소 질의 오류: {0}")]
    Query(String),

    /// 캐시 사용 불가 (직접 조회로 폴백)
    #[error("캐시 사용 불가: {0}")]
    CacheUnavailable(String),

    /// 거래소 조회 실패 (재시도 소진)
    #[error("거래소 조회 실패: {0}")]
    Exchange(#[from] ExchangeError),

    /// 잘못된 요청 구간
    #[error("잘못된 구간: {0}")]
    InvalidRange(String),
}

/// 데이터 결과 타입.
pub type Result<T> = std::result::Result<T, DataError>;
