//! 설정 관리.
//!
//! 설정 파일(TOML, 선택)과 `INGEST__` 접두사 환경 변수에서 설정을 읽습니다.
//! 프로세스 전역 상태 대신 로드한 `AppConfig`를 각 구성 요소 생성자에 넘깁니다.
//!
//! ```text
//! INGEST__DATABASE__URL=postgres://...
//! INGEST__SOURCE__TUSHARE__TOKEN=...
//! INGEST__SYNC__START_DATE=20180101
//! ```

use crate::domain::{DateFormats, DEFAULT_DATE_FORMATS};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// 애플리케이션 설정.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    /// 데이터베이스 설정
    pub database: DatabaseConfig,
    /// 데이터 소스 설정
    pub source: SourceConfig,
    /// 커버리지 저장소 설정
    pub store: StoreConfig,
    /// 동기화 설정
    pub sync: SyncConfig,
    /// 로깅 설정
    pub logging: LoggingConfig,
}

/// 데이터베이스 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// 연결 URL
    pub url: String,
    /// 최대 연결 수
    pub max_connections: u32,
    /// 연결 타임아웃 (초)
    pub connection_timeout_secs: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_connections: 5,
            connection_timeout_secs: 30,
        }
    }
}

/// 데이터 소스 종류.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DataSourceKind {
    /// 원격 제공자 API
    #[default]
    Remote,
    /// 저장된 테이블 조회
    Database,
}

impl std::str::FromStr for DataSourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "remote" | "tushare" => Ok(Self::Remote),
            "database" | "db" => Ok(Self::Database),
            _ => Err(format!("Unknown data source: {}", s)),
        }
    }
}

/// 데이터 소스 설정.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct SourceConfig {
    /// 사용할 구현
    pub kind: DataSourceKind,
    /// Tushare Pro API 설정
    pub tushare: TushareConfig,
    /// 저장소 기반 소스가 읽는 테이블
    pub tables: StoreTables,
}

/// Tushare Pro API 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TushareConfig {
    /// API 토큰
    pub token: String,
    /// API 엔드포인트
    pub base_url: String,
    /// 요청 타임아웃 (초)
    pub timeout_secs: u64,
}

impl Default for TushareConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            base_url: "http://api.tushare.pro".to_string(),
            timeout_secs: 30,
        }
    }
}

/// 저장소 기반 데이터 소스의 테이블 이름.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StoreTables {
    /// 일봉 테이블 기본 이름 (수정 방식 접미사가 붙음)
    pub daily: String,
    pub daily_basic: String,
    pub fina_indicator: String,
    pub index_daily: String,
    pub index_weight: String,
    pub trade_cal: String,
    pub stock_basic: String,
}

impl Default for StoreTables {
    fn default() -> Self {
        Self {
            daily: "daily".to_string(),
            daily_basic: "daily_basic".to_string(),
            fina_indicator: "fina_indicator".to_string(),
            index_daily: "index_daily".to_string(),
            index_weight: "index_weight".to_string(),
            trade_cal: "trade_cal".to_string(),
            stock_basic: "stock_basic".to_string(),
        }
    }
}

/// 커버리지 저장소 종류.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    /// PostgreSQL
    #[default]
    Postgres,
    /// 프로세스 메모리 (dry run)
    Memory,
}

impl std::str::FromStr for StoreKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "postgres" | "pg" => Ok(Self::Postgres),
            "memory" | "mem" => Ok(Self::Memory),
            _ => Err(format!("Unknown store: {}", s)),
        }
    }
}

/// 커버리지 저장소 설정.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct StoreConfig {
    pub kind: StoreKind,
}

/// 재시도 대기 방식.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BackoffKind {
    /// 고정 대기
    Fixed,
    /// 지수 증가 대기
    #[default]
    Exponential,
}

/// 동기화 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SyncConfig {
    /// 수집 시작 날짜 (YYYYMMDD)
    pub start_date: String,
    /// 수집 종료 날짜 (YYYYMMDD, 없으면 오늘)
    pub end_date: Option<String>,
    /// 날짜 형식 후보 (쉼표 구분)
    pub date_formats: String,
    /// 일시적 실패 재시도 횟수
    pub max_retries: u32,
    /// 재시도 대기 방식
    pub backoff: BackoffKind,
    /// 첫 재시도 대기 (밀리초)
    pub retry_delay_ms: u64,
    /// 최대 재시도 대기 (밀리초)
    pub max_retry_delay_ms: u64,
    /// 요청 한도 초과 시 최소 대기 (밀리초)
    pub rate_limit_delay_ms: u64,
    /// API 요청 간 딜레이 (밀리초)
    pub request_delay_ms: u64,
    /// 빈 결과 확인에 쓰는 거래소 달력
    pub calendar_exchange: String,
    /// 다중 심볼 조회 시 배치당 최대 심볼 수
    pub max_batch_size: usize,
    /// 수집 대상 종목 (비어 있으면 데이터 소스에서 상장 목록 조회)
    pub symbols: Vec<String>,
    /// 상장 목록 조회 시 거래소 필터
    pub listing_exchange: Option<String>,
    /// 수집 대상 지수
    pub index_codes: Vec<String>,
    /// 거래 달력을 수집할 거래소
    pub exchanges: Vec<String>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            start_date: "20080101".to_string(),
            end_date: None,
            date_formats: DEFAULT_DATE_FORMATS.to_string(),
            max_retries: 3,
            backoff: BackoffKind::Exponential,
            retry_delay_ms: 1_000,
            max_retry_delay_ms: 30_000,
            rate_limit_delay_ms: 60_000,
            request_delay_ms: 300,
            calendar_exchange: "SSE".to_string(),
            max_batch_size: 100,
            symbols: Vec::new(),
            listing_exchange: None,
            index_codes: vec![
                "000001.SH".to_string(),
                "000300.SH".to_string(),
                "000905.SH".to_string(),
            ],
            exchanges: vec!["SSE".to_string(), "SZSE".to_string()],
        }
    }
}

impl SyncConfig {
    /// 날짜 형식 후보 목록.
    pub fn date_formats(&self) -> DateFormats {
        DateFormats::parse_list(&self.date_formats)
    }
}

/// 로깅 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// 로그 레벨
    pub level: String,
    /// 로그 형식 (pretty, json, compact)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl AppConfig {
    /// 파일(선택)과 환경 변수에서 설정을 로드합니다.
    ///
    /// 파일이 없으면 기본값과 환경 변수만 사용합니다.
    pub fn load(path: Option<&Path>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(false));
        }

        let config = builder
            // 환경 변수로 오버라이드
            .add_source(
                config::Environment::with_prefix("INGEST")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("sync.symbols")
                    .with_list_parse_key("sync.index_codes")
                    .with_list_parse_key("sync.exchanges")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// 기본 경로(`config/default.toml`)에서 설정을 로드합니다.
    pub fn load_default() -> Result<Self, config::ConfigError> {
        Self::load(Some(Path::new("config/default.toml")))
    }
}
