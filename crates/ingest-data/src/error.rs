//! 데이터 모듈 오류 타입.

use ingest_core::CoreError;
use std::fmt;
use thiserror::Error;

/// 데이터 제공 불가 유형.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnavailableKind {
    /// 네트워크, 타임아웃 등 다시 시도하면 성공할 수 있는 실패
    Transient,
    /// 존재하지 않는 종목 등 다시 시도해도 같은 결과인 실패
    Permanent,
}

impl fmt::Display for UnavailableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnavailableKind::Transient => write!(f, "transient"),
            UnavailableKind::Permanent => write!(f, "permanent"),
        }
    }
}

/// 데이터 관련 오류.
#[derive(Debug, Error)]
pub enum DataError {
    /// 제공자가 요청을 처리할 수 없음
    #[error("Data unavailable ({kind}): {message}")]
    DataUnavailable {
        kind: UnavailableKind,
        message: String,
    },

    /// 요청 한도 초과
    #[error("Rate limit exceeded: {0}")]
    RateLimited(String),

    /// 데이터베이스 연결 오류
    #[error("Database connection error: {0}")]
    ConnectionError(String),

    /// 쿼리 실행 오류
    #[error("Query error: {0}")]
    QueryError(String),

    /// 직렬화/역직렬화 오류
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// 설정 오류 (토큰 누락, 잘못된 테이블 등)
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// 잘못된 데이터 형식
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// 도메인 오류
    #[error(transparent)]
    Core(#[from] CoreError),
}

impl DataError {
    /// 일시적 제공 불가 오류 생성.
    pub fn transient(message: impl Into<String>) -> Self {
        DataError::DataUnavailable {
            kind: UnavailableKind::Transient,
            message: message.into(),
        }
    }

    /// 영구적 제공 불가 오류 생성.
    pub fn permanent(message: impl Into<String>) -> Self {
        DataError::DataUnavailable {
            kind: UnavailableKind::Permanent,
            message: message.into(),
        }
    }

    /// 재시도 가능한 에러인지 확인.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            DataError::DataUnavailable {
                kind: UnavailableKind::Transient,
                ..
            } | DataError::RateLimited(_)
        )
    }

    /// 다시 시도해도 같은 결과인 제공 불가 에러인지 확인.
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            DataError::DataUnavailable {
                kind: UnavailableKind::Permanent,
                ..
            }
        )
    }

    /// 요청 한도 초과인지 확인.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, DataError::RateLimited(_))
    }

    /// 실행 전체를 중단해야 하는 구조적 에러인지 확인.
    ///
    /// 제공 불가와 날짜 형식 오류는 심볼 단위 실패로 기록하고 계속 진행합니다.
    pub fn is_structural(&self) -> bool {
        match self {
            DataError::DataUnavailable { .. }
            | DataError::RateLimited(_)
            | DataError::InvalidData(_) => false,
            DataError::Core(core) => core.is_fatal(),
            _ => true,
        }
    }
}

impl From<sqlx::Error> for DataError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                DataError::ConnectionError(err.to_string())
            }
            sqlx::Error::Database(db_err) => DataError::QueryError(db_err.message().to_string()),
            _ => DataError::QueryError(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for DataError {
    fn from(err: serde_json::Error) -> Self {
        DataError::SerializationError(err.to_string())
    }
}

impl From<reqwest::Error> for DataError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() || err.is_connect() || err.is_request() || err.is_body() {
            return DataError::transient(err.to_string());
        }
        match err.status() {
            Some(status) if status.as_u16() == 429 => DataError::RateLimited(err.to_string()),
            Some(status) if status.is_server_error() => DataError::transient(err.to_string()),
            Some(_) => DataError::permanent(err.to_string()),
            None => DataError::transient(err.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, DataError>;
