//! 거래소 API 재시도 유틸리티.
//!
//! 네트워크 오류, Rate Limit 등 일시적인 오류에 대해 자동 재시도를
//! 수행합니다. 재시도 불가능한 오류는 즉시 반환합니다.
//!
//! # 예시
//!
//! ```rust,ignore
//! use quantlab_exchange::retry::{with_retry, RetryConfig};
//!
//! let config = RetryConfig::default();
//! let candles = with_retry(&config, || async {
//!     provider.fetch_ohlcv("BTCUSDT", Timeframe::M1, None, 200).await
//! })
//! .await?;
//! ```

use std::{future::Future, time::Duration};

use tracing::{debug, warn};

use crate::error::ExchangeError;

/// 재시도 설정.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// 최대 재시도 횟수 (초기 시도 제외)
    pub max_retries: u32,
    /// 기본 대기 시간 (오류에 지정된 대기 시간이 없을 때)
    pub base_delay: Duration,
    /// 최대 대기 시간
    pub max_delay: Duration,
    /// 지수 백오프 배수
    pub backoff_multiplier: f64,
    /// 지터(무작위 지연) 추가 여부
    pub add_jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_secs(60),
            backoff_multiplier: 2.0,
            add_jitter: true,
        }
    }
}

impl RetryConfig {
    /// 빠른 재시도 (짧은 지연, 적은 횟수).
    pub fn fast() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(5),
            ..Default::default()
        }
    }

    /// 재시도 없음.
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            ..Default::default()
        }
    }

    /// 시도 횟수에 따른 대기 시간 계산.
    fn calculate_delay(&self, attempt: u32, error: &ExchangeError) -> Duration {
        let base = error
            .retry_delay_ms()
            .map(Duration::from_millis)
            .unwrap_or(self.base_delay);

        let delay = if attempt > 0 {
            let multiplier = self.backoff_multiplier.powi(attempt as i32);
            Duration::from_secs_f64(base.as_secs_f64() * multiplier)
        } else {
            base
        };
        let delay = delay.min(self.max_delay);

        if self.add_jitter {
            // ±25% 지터
            let jitter_range = delay.as_millis() as f64 * 0.25;
            let jitter = (rand_simple() * 2.0 - 1.0) * jitter_range;
            Duration::from_millis((delay.as_millis() as f64 + jitter).max(0.0) as u64)
        } else {
            delay
        }
    }
}

/// 간단한 난수 생성 (0.0 ~ 1.0).
/// 외부 의존성 없이 시스템 시간 기반으로 생성합니다.
fn rand_simple() -> f64 {
    use std::time::SystemTime;
    let nanos = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or(0);
    nanos as f64 / u32::MAX as f64
}

/// 재시도 루프.
///
/// 재시도 가능한 오류면 백오프 후 다시 시도하고, 아니면 즉시 반환합니다.
pub async fn with_retry<F, Fut, T>(config: &RetryConfig, mut operation: F) -> Result<T, ExchangeError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ExchangeError>>,
{
    let mut last_error = None;

    for attempt in 0..=config.max_retries {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(error) => {
                if !error.is_retryable() {
                    return Err(error);
                }
                if attempt < config.max_retries {
                    let delay = config.calculate_delay(attempt, &error);
                    debug!(
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "일시적 오류, 재시도 대기"
                    );
                    tokio::time::sleep(delay).await;
                } else {
                    warn!(error = %error, "재시도 횟수 소진");
                }
                last_error = Some(error);
            }
        }
    }

    Err(last_error.unwrap_or(ExchangeError::Network("재시도 실패".to_string())))
}
