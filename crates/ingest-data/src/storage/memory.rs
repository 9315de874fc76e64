//! 프로세스 메모리 커버리지 저장소.
//!
//! DB 없이 수집 계획을 확인하는 dry run과 테스트에서 사용합니다.
//! 하나의 락 안에서 검증 후 반영하므로 `merge`는 원자적입니다.

use super::{CoverageStore, Watermark};
use crate::error::{DataError, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use ingest_core::{Record, RecordKey, TableSpec};
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;

#[derive(Debug, Default)]
struct MemoryTable {
    rows: BTreeMap<RecordKey, Record>,
    watermarks: HashMap<String, NaiveDate>,
}

/// 메모리 기반 커버리지 저장소.
#[derive(Debug, Default)]
pub struct MemoryCoverageStore {
    tables: RwLock<HashMap<String, MemoryTable>>,
}

impl MemoryCoverageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 테이블의 전체 행 수.
    pub async fn row_count(&self, table: &str) -> usize {
        self.tables
            .read()
            .await
            .get(table)
            .map(|t| t.rows.len())
            .unwrap_or(0)
    }

    /// 테이블의 전체 행 (키 순서).
    pub async fn rows(&self, table: &str) -> Vec<Record> {
        self.tables
            .read()
            .await
            .get(table)
            .map(|t| t.rows.values().cloned().collect())
            .unwrap_or_default()
    }

    /// 저장된 워터마크 (행 최대 날짜는 반영하지 않음).
    pub async fn watermark(&self, table: &str, symbol: &str) -> Option<NaiveDate> {
        self.tables
            .read()
            .await
            .get(table)
            .and_then(|t| t.watermarks.get(symbol).copied())
    }
}

fn missing_table(name: &str) -> DataError {
    DataError::QueryError(format!("relation \"{}\" does not exist", name))
}

#[async_trait]
impl CoverageStore for MemoryCoverageStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn ensure_table(&self, spec: &TableSpec) -> Result<()> {
        spec.validate()?;
        self.tables
            .write()
            .await
            .entry(spec.name.clone())
            .or_default();
        Ok(())
    }

    async fn latest_covered(&self, spec: &TableSpec, symbol: &str) -> Result<Option<NaiveDate>> {
        let tables = self.tables.read().await;
        let table = tables.get(&spec.name).ok_or_else(|| missing_table(&spec.name))?;

        let max_row_date = table
            .rows
            .values()
            .filter(|r| r.symbol == symbol)
            .map(|r| r.date)
            .max();
        let watermark = table.watermarks.get(symbol).copied();

        Ok(max_row_date.max(watermark))
    }

    async fn merge(
        &self,
        spec: &TableSpec,
        records: &[Record],
        watermarks: &[Watermark],
    ) -> Result<usize> {
        let mut tables = self.tables.write().await;
        let table = tables
            .get_mut(&spec.name)
            .ok_or_else(|| missing_table(&spec.name))?;

        for record in records {
            table.rows.insert(record.key(), record.clone());
        }
        for mark in watermarks {
            let entry = table
                .watermarks
                .entry(mark.symbol.clone())
                .or_insert(mark.covered_through);
            if *entry < mark.covered_through {
                *entry = mark.covered_through;
            }
        }

        Ok(records.len())
    }
}
