//! 데이터 소스 인터페이스.
//!
//! 모든 조회는 심볼과 날짜 범위 단위이며 [`Table`]을 반환합니다.
//! 구현은 두 가지입니다:
//!
//! - [`TushareDataSource`]: 원격 제공자 API 호출
//! - [`DatabaseDataSource`]: 수집되어 저장된 테이블 조회
//!
//! 호출자는 [`create_data_source`]가 돌려주는 `Arc<dyn DataSource>`만 사용하며
//! 구체 구현에 의존하지 않습니다.

pub mod database;
pub mod tushare;

use crate::error::{DataError, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use ingest_core::{Adjust, DataSourceKind, SourceConfig, Table};
use sqlx::PgPool;
use std::sync::Arc;

pub use database::DatabaseDataSource;
pub use tushare::TushareDataSource;

/// 시세 데이터 조회 인터페이스.
#[async_trait]
pub trait DataSource: Send + Sync {
    /// 구현 이름 (로그용).
    fn name(&self) -> &'static str;

    /// 일봉. 여러 심볼이면 심볼별 결과를 이어붙입니다 (중복 제거는 호출자 몫).
    async fn daily(
        &self,
        symbols: &[String],
        start: NaiveDate,
        end: NaiveDate,
        adjust: Adjust,
    ) -> Result<Table>;

    /// 일별 지표 (시가총액, PER 등).
    async fn daily_basic(&self, symbols: &[String], start: NaiveDate, end: NaiveDate)
        -> Result<Table>;

    /// 재무 지표 (공시일 기준).
    async fn fina_indicator(
        &self,
        symbols: &[String],
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Table>;

    /// 지수 일봉.
    async fn index_daily(&self, codes: &[String], start: NaiveDate, end: NaiveDate)
        -> Result<Table>;

    /// 지수 구성 종목과 비중.
    async fn index_weight(&self, codes: &[String], start: NaiveDate, end: NaiveDate)
        -> Result<Table>;

    /// 거래 달력 (`exchange`, `cal_date`, `is_open`).
    async fn trade_cal(&self, start: NaiveDate, end: NaiveDate, exchange: &str) -> Result<Table>;

    /// 상장 종목 목록 (`ts_code` 포함).
    async fn stock_basic(&self, exchange: Option<&str>) -> Result<Table>;
}

/// 거래 달력에서 개장일 수를 셉니다.
///
/// `is_open`은 제공자에 따라 `1`, `"1"`, `true` 등으로 옵니다.
/// 달력이 비어 있거나 `is_open` 컬럼이 없거나 해석할 수 없는 값이 있으면
/// 개장 여부를 확인할 수 없으므로 `None`입니다.
pub fn count_open_days(calendar: &Table) -> Option<usize> {
    if calendar.is_empty() {
        return None;
    }
    let idx = calendar.column_index("is_open")?;

    let mut open = 0usize;
    for row in &calendar.items {
        let is_open = match row.get(idx) {
            Some(serde_json::Value::Number(n)) => match n.as_i64() {
                Some(1) => true,
                Some(0) => false,
                _ => return None,
            },
            Some(serde_json::Value::String(s)) => match s.trim() {
                "1" => true,
                "0" => false,
                _ => return None,
            },
            Some(serde_json::Value::Bool(b)) => *b,
            _ => return None,
        };
        if is_open {
            open += 1;
        }
    }
    Some(open)
}

/// 설정에 따라 데이터 소스를 생성합니다.
///
/// 저장소 기반 소스는 연결 풀이 필요합니다.
pub fn create_data_source(
    config: &SourceConfig,
    pool: Option<PgPool>,
) -> Result<Arc<dyn DataSource>> {
    match config.kind {
        DataSourceKind::Remote => {
            let source = TushareDataSource::new(&config.tushare)?;
            tracing::info!(source = source.name(), "데이터 소스 생성");
            Ok(Arc::new(source))
        }
        DataSourceKind::Database => {
            let pool = pool.ok_or_else(|| {
                DataError::ConfigError(
                    "저장소 기반 데이터 소스에는 데이터베이스 연결이 필요합니다".to_string(),
                )
            })?;
            let source = DatabaseDataSource::new(pool, config.tables.clone());
            tracing::info!(source = source.name(), "데이터 소스 생성");
            Ok(Arc::new(source))
        }
    }
}
