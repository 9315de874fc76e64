//! PostgreSQL 커버리지 저장소.
//!
//! # 스키마
//!
//! 데이터셋마다 테이블 하나를 사용하며, 키 컬럼 이름은 데이터셋 정의를 따릅니다.
//!
//! ```sql
//! CREATE TABLE daily_hfq (
//!     ts_code    TEXT NOT NULL,
//!     trade_date DATE NOT NULL,
//!     sub_key    TEXT NOT NULL DEFAULT '',
//!     payload    JSONB NOT NULL,
//!     fetched_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
//!     PRIMARY KEY (ts_code, trade_date, sub_key)
//! );
//!
//! CREATE TABLE sync_watermark (
//!     dataset         TEXT NOT NULL,
//!     symbol          TEXT NOT NULL,
//!     covered_through DATE NOT NULL,
//!     updated_at      TIMESTAMPTZ NOT NULL DEFAULT NOW(),
//!     PRIMARY KEY (dataset, symbol)
//! );
//! ```
//!
//! 행 upsert와 워터마크 갱신은 하나의 트랜잭션에서 실행됩니다.

use super::{CoverageStore, Watermark, WATERMARK_TABLE};
use crate::error::{DataError, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use ingest_core::{DatabaseConfig, Record, TableSpec};
use serde_json::Value;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::{debug, instrument};

/// UNNEST 일괄 삽입 청크 크기.
const INSERT_CHUNK_SIZE: usize = 500;

/// PostgreSQL 커버리지 저장소.
#[derive(Clone)]
pub struct PgCoverageStore {
    pool: PgPool,
}

impl PgCoverageStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// 설정으로 연결 풀을 만들어 저장소를 생성합니다.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        if config.url.is_empty() {
            return Err(DataError::ConfigError(
                "데이터베이스 URL이 설정되지 않았습니다 (INGEST__DATABASE__URL)".to_string(),
            ));
        }

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.connection_timeout_secs))
            .connect(&config.url)
            .await
            .map_err(|e| DataError::ConnectionError(e.to_string()))?;

        Ok(Self { pool })
    }

    /// 연결 풀 (저장소 기반 데이터 소스와 공유).
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl CoverageStore for PgCoverageStore {
    fn name(&self) -> &'static str {
        "postgres"
    }

    #[instrument(skip(self), fields(table = %spec.name))]
    async fn ensure_table(&self, spec: &TableSpec) -> Result<()> {
        spec.validate()?;

        let create_table = format!(
            r#"
            CREATE TABLE IF NOT EXISTS {table} (
                {symbol} TEXT NOT NULL,
                {date} DATE NOT NULL,
                sub_key TEXT NOT NULL DEFAULT '',
                payload JSONB NOT NULL,
                fetched_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                PRIMARY KEY ({symbol}, {date}, sub_key)
            )
            "#,
            table = spec.name,
            symbol = spec.symbol_column,
            date = spec.date_column,
        );
        sqlx::query(&create_table).execute(&self.pool).await?;

        let create_watermark = format!(
            r#"
            CREATE TABLE IF NOT EXISTS {WATERMARK_TABLE} (
                dataset TEXT NOT NULL,
                symbol TEXT NOT NULL,
                covered_through DATE NOT NULL,
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                PRIMARY KEY (dataset, symbol)
            )
            "#
        );
        sqlx::query(&create_watermark).execute(&self.pool).await?;

        debug!(table = %spec.name, "데이터셋 테이블 확인 완료");
        Ok(())
    }

    async fn latest_covered(&self, spec: &TableSpec, symbol: &str) -> Result<Option<NaiveDate>> {
        spec.validate()?;

        // GREATEST는 NULL을 무시하므로 워터마크나 행 중 하나만 있어도 됩니다.
        let sql = format!(
            r#"
            SELECT GREATEST(
                (SELECT covered_through FROM {WATERMARK_TABLE} WHERE dataset = $1 AND symbol = $2),
                (SELECT MAX({date}) FROM {table} WHERE {symbol} = $2)
            )
            "#,
            table = spec.name,
            symbol = spec.symbol_column,
            date = spec.date_column,
        );

        let latest: Option<NaiveDate> = sqlx::query_scalar(&sql)
            .bind(&spec.name)
            .bind(symbol)
            .fetch_one(&self.pool)
            .await?;

        Ok(latest)
    }

    #[instrument(skip(self, records, watermarks), fields(table = %spec.name, rows = records.len()))]
    async fn merge(
        &self,
        spec: &TableSpec,
        records: &[Record],
        watermarks: &[Watermark],
    ) -> Result<usize> {
        spec.validate()?;

        let upsert_rows = format!(
            r#"
            INSERT INTO {table} ({symbol}, {date}, sub_key, payload, fetched_at)
            SELECT t.symbol, t.date, t.sub_key, t.payload, NOW()
            FROM UNNEST($1::text[], $2::date[], $3::text[], $4::jsonb[])
                AS t(symbol, date, sub_key, payload)
            ON CONFLICT ({symbol}, {date}, sub_key) DO UPDATE SET
                payload = EXCLUDED.payload,
                fetched_at = NOW()
            "#,
            table = spec.name,
            symbol = spec.symbol_column,
            date = spec.date_column,
        );

        let mut tx = self.pool.begin().await?;
        let mut merged = 0usize;

        // UNNEST 패턴으로 일괄 삽입
        for chunk in records.chunks(INSERT_CHUNK_SIZE) {
            let symbols: Vec<&str> = chunk.iter().map(|r| r.symbol.as_str()).collect();
            let dates: Vec<NaiveDate> = chunk.iter().map(|r| r.date).collect();
            let sub_keys: Vec<&str> = chunk.iter().map(|r| r.sub_key.as_str()).collect();
            let payloads: Vec<Value> = chunk
                .iter()
                .map(|r| Value::Object(r.payload.clone()))
                .collect();

            let result = sqlx::query(&upsert_rows)
                .bind(&symbols)
                .bind(&dates)
                .bind(&sub_keys)
                .bind(&payloads)
                .execute(&mut *tx)
                .await?;
            merged += result.rows_affected() as usize;
        }

        if !watermarks.is_empty() {
            let symbols: Vec<&str> = watermarks.iter().map(|w| w.symbol.as_str()).collect();
            let dates: Vec<NaiveDate> = watermarks.iter().map(|w| w.covered_through).collect();

            let upsert_watermarks = format!(
                r#"
                INSERT INTO {WATERMARK_TABLE} (dataset, symbol, covered_through, updated_at)
                SELECT $1, t.symbol, t.covered_through, NOW()
                FROM UNNEST($2::text[], $3::date[]) AS t(symbol, covered_through)
                ON CONFLICT (dataset, symbol) DO UPDATE SET
                    covered_through = GREATEST({WATERMARK_TABLE}.covered_through, EXCLUDED.covered_through),
                    updated_at = NOW()
                "#
            );

            sqlx::query(&upsert_watermarks)
                .bind(&spec.name)
                .bind(&symbols)
                .bind(&dates)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        debug!(
            table = %spec.name,
            merged = merged,
            watermarks = watermarks.len(),
            "병합 커밋 완료"
        );

        Ok(merged)
    }
}
