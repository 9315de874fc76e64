//! 재시도 정책.
//!
//! 일시적 실패(네트워크, 타임아웃, 요청 한도 초과)만 재시도합니다.
//! 영구 실패와 구조적 오류는 즉시 반환합니다.

use ingest_core::{BackoffKind, SyncConfig};
use ingest_data::Result;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// 재시도 대기 방식.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Backoff {
    /// 항상 같은 시간 대기
    Fixed(Duration),
    /// 시도마다 `multiplier`배 증가, `max`에서 멈춤
    Exponential {
        initial: Duration,
        max: Duration,
        multiplier: f64,
    },
}

impl Backoff {
    /// `attempt`번째(0부터) 재시도 전 대기 시간.
    pub fn delay(&self, attempt: u32) -> Duration {
        match *self {
            Backoff::Fixed(delay) => delay,
            Backoff::Exponential {
                initial,
                max,
                multiplier,
            } => {
                let secs = initial.as_secs_f64() * multiplier.powi(attempt as i32);
                if !secs.is_finite() || secs >= max.as_secs_f64() {
                    max
                } else {
                    Duration::from_secs_f64(secs.max(0.0))
                }
            }
        }
    }
}

/// 데이터 소스 호출 재시도 정책.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// 최초 호출 이후 추가 시도 횟수
    pub max_retries: u32,
    pub backoff: Backoff,
    /// 요청 한도 초과 시 최소 대기
    pub rate_limit_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&SyncConfig::default())
    }
}

impl RetryPolicy {
    /// 재시도하지 않는 정책.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            backoff: Backoff::Fixed(Duration::ZERO),
            rate_limit_delay: Duration::ZERO,
        }
    }

    /// 동기화 설정에서 생성.
    pub fn from_config(config: &SyncConfig) -> Self {
        let initial = Duration::from_millis(config.retry_delay_ms);
        let backoff = match config.backoff {
            BackoffKind::Fixed => Backoff::Fixed(initial),
            BackoffKind::Exponential => Backoff::Exponential {
                initial,
                max: Duration::from_millis(config.max_retry_delay_ms),
                multiplier: 2.0,
            },
        };

        Self {
            max_retries: config.max_retries,
            backoff,
            rate_limit_delay: Duration::from_millis(config.rate_limit_delay_ms),
        }
    }

    /// 재시도 전 대기 시간. 요청 한도 초과는 최소 `rate_limit_delay`만큼 기다립니다.
    pub fn delay_for(&self, attempt: u32, rate_limited: bool) -> Duration {
        let delay = self.backoff.delay(attempt);
        if rate_limited {
            delay.max(self.rate_limit_delay)
        } else {
            delay
        }
    }

    /// 재시도 정책에 따라 작업을 실행합니다.
    pub async fn run<T, F, Fut>(&self, operation: &str, mut call: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 0u32;
        loop {
            match call().await {
                Ok(value) => {
                    if attempt > 0 {
                        debug!(operation = operation, attempts = attempt + 1, "재시도 후 성공");
                    }
                    return Ok(value);
                }
                Err(e) if e.is_retryable() && attempt < self.max_retries => {
                    let delay = self.delay_for(attempt, e.is_rate_limited());
                    warn!(
                        operation = operation,
                        attempt = attempt + 1,
                        max_retries = self.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "재시도 예정"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    if e.is_retryable() {
                        warn!(
                            operation = operation,
                            attempts = attempt + 1,
                            error = %e,
                            "재시도 한도 초과"
                        );
                    }
                    return Err(e);
                }
            }
        }
    }
}
