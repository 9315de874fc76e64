//! 저장소 기반 데이터 소스.
//!
//! 이미 수집되어 [`PgCoverageStore`](crate::storage::PgCoverageStore)에 저장된
//! 데이터셋 테이블의 `payload`를 읽어 원격 응답과 같은 모양의 [`Table`]로
//! 돌려줍니다. 원격 API 없이 다른 저장소로 복제하거나 재처리할 때 사용합니다.

use crate::error::Result;
use crate::source::DataSource;
use async_trait::async_trait;
use chrono::NaiveDate;
use ingest_core::{Adjust, StoreTables, Table, TableSpec};
use serde_json::{Map, Value};
use sqlx::PgPool;
use tracing::debug;

/// PostgreSQL 데이터셋 테이블을 읽는 데이터 소스.
#[derive(Clone)]
pub struct DatabaseDataSource {
    pool: PgPool,
    tables: StoreTables,
}

impl DatabaseDataSource {
    pub fn new(pool: PgPool, tables: StoreTables) -> Self {
        Self { pool, tables }
    }

    /// 심볼 목록과 날짜 범위로 payload를 조회합니다.
    async fn select(
        &self,
        spec: TableSpec,
        symbols: &[String],
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Table> {
        spec.validate()?;

        let sql = format!(
            r#"
            SELECT payload
            FROM {table}
            WHERE {symbol} = ANY($1) AND {date} >= $2 AND {date} <= $3
            ORDER BY {symbol} ASC, {date} ASC, sub_key ASC
            "#,
            table = spec.name,
            symbol = spec.symbol_column,
            date = spec.date_column,
        );

        let payloads: Vec<Value> = sqlx::query_scalar(&sql)
            .bind(symbols)
            .bind(start)
            .bind(end)
            .fetch_all(&self.pool)
            .await?;

        debug!(table = %spec.name, rows = payloads.len(), "저장소 조회");
        Ok(into_table(payloads))
    }
}

/// 수정 방식별 일봉 테이블.
fn daily_spec(tables: &StoreTables, adjust: Adjust) -> TableSpec {
    TableSpec::new(adjust.daily_table(&tables.daily), "ts_code", "trade_date")
}

/// 객체가 아닌 payload는 건너뜁니다.
fn into_table(payloads: Vec<Value>) -> Table {
    let objects: Vec<Map<String, Value>> = payloads
        .into_iter()
        .filter_map(|payload| match payload {
            Value::Object(object) => Some(object),
            _ => None,
        })
        .collect();
    Table::from_objects(objects)
}

#[async_trait]
impl DataSource for DatabaseDataSource {
    fn name(&self) -> &'static str {
        "database"
    }

    async fn daily(
        &self,
        symbols: &[String],
        start: NaiveDate,
        end: NaiveDate,
        adjust: Adjust,
    ) -> Result<Table> {
        self.select(daily_spec(&self.tables, adjust), symbols, start, end)
            .await
    }

    async fn daily_basic(
        &self,
        symbols: &[String],
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Table> {
        let spec = TableSpec::new(self.tables.daily_basic.as_str(), "ts_code", "trade_date");
        self.select(spec, symbols, start, end).await
    }

    async fn fina_indicator(
        &self,
        symbols: &[String],
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Table> {
        let spec = TableSpec::new(self.tables.fina_indicator.as_str(), "ts_code", "ann_date");
        self.select(spec, symbols, start, end).await
    }

    async fn index_daily(
        &self,
        codes: &[String],
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Table> {
        let spec = TableSpec::new(self.tables.index_daily.as_str(), "ts_code", "trade_date");
        self.select(spec, codes, start, end).await
    }

    async fn index_weight(
        &self,
        codes: &[String],
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Table> {
        let spec = TableSpec::new(self.tables.index_weight.as_str(), "index_code", "trade_date");
        self.select(spec, codes, start, end).await
    }

    async fn trade_cal(&self, start: NaiveDate, end: NaiveDate, exchange: &str) -> Result<Table> {
        let spec = TableSpec::new(self.tables.trade_cal.as_str(), "exchange", "cal_date");
        self.select(spec, &[exchange.to_string()], start, end).await
    }

    async fn stock_basic(&self, exchange: Option<&str>) -> Result<Table> {
        let spec = TableSpec::new(self.tables.stock_basic.as_str(), "ts_code", "list_date");
        spec.validate()?;

        let sql = format!(
            r#"
            SELECT payload
            FROM {table}
            WHERE ($1::text IS NULL OR payload->>'exchange' = $1)
            ORDER BY {symbol} ASC
            "#,
            table = spec.name,
            symbol = spec.symbol_column,
        );

        let payloads: Vec<Value> = sqlx::query_scalar(&sql)
            .bind(exchange)
            .fetch_all(&self.pool)
            .await?;

        Ok(into_table(payloads))
    }
}
