//! 에러 타입 정의.

use ingest_core::CoreError;
use ingest_data::DataError;
use std::fmt;

/// Collector 에러 타입
#[derive(Debug)]
pub enum CollectorError {
    /// 데이터베이스 에러
    Database(sqlx::Error),
    /// 데이터 소스 / 저장소 에러
    Data(DataError),
    /// 도메인 에러 (데이터셋 정의, 병합 충돌 등)
    Core(CoreError),
    /// 설정 에러
    Config(String),
    /// 일반 에러
    Other(Box<dyn std::error::Error + Send + Sync>),
}

impl CollectorError {
    /// 데이터셋 정의 오류 생성.
    pub fn invalid_descriptor(message: impl Into<String>) -> Self {
        Self::Core(CoreError::InvalidDescriptor(message.into()))
    }
}

impl fmt::Display for CollectorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Database(e) => write!(f, "Database error: {}", e),
            Self::Data(e) => write!(f, "Data error: {}", e),
            Self::Core(e) => write!(f, "Sync error: {}", e),
            Self::Config(msg) => write!(f, "Configuration error: {}", msg),
            Self::Other(e) => write!(f, "Error: {}", e),
        }
    }
}

impl std::error::Error for CollectorError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Database(e) => Some(e),
            Self::Data(e) => Some(e),
            Self::Core(e) => Some(e),
            Self::Config(_) => None,
            Self::Other(e) => Some(e.as_ref()),
        }
    }
}

impl From<sqlx::Error> for CollectorError {
    fn from(err: sqlx::Error) -> Self {
        Self::Database(err)
    }
}

impl From<DataError> for CollectorError {
    fn from(err: DataError) -> Self {
        match err {
            // 도메인 에러는 감싸지 않고 그대로 노출
            DataError::Core(core) => Self::Core(core),
            other => Self::Data(other),
        }
    }
}

impl From<CoreError> for CollectorError {
    fn from(err: CoreError) -> Self {
        Self::Core(err)
    }
}

impl From<config::ConfigError> for CollectorError {
    fn from(err: config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<Box<dyn std::error::Error + Send + Sync>> for CollectorError {
    fn from(err: Box<dyn std::error::Error + Send + Sync>) -> Self {
        Self::Other(err)
    }
}

/// Result 타입 별칭
pub type Result<T> = std::result::Result<T, CollectorError>;
