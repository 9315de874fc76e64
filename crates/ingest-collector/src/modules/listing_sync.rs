//! 상장 종목 목록 동기화 모듈.
//!
//! 데이터 소스의 상장 종목을 `stock_basic` 테이블(키 `ts_code`)에 upsert 합니다.
//! 저장소 기반 데이터 소스는 이 테이블로 유니버스를 조회합니다.

use crate::{Result, SymbolOutcome, SyncSummary};
use ingest_core::{dedup_records, value_as_string, DateFormats, TableSpec};
use ingest_data::{CoverageStore, DataSource};
use std::time::Instant;

/// 상장 종목 목록 동기화
pub async fn sync_listing(
    source: &dyn DataSource,
    store: &dyn CoverageStore,
    table: &str,
    exchange: Option<&str>,
    formats: &DateFormats,
) -> Result<SyncSummary> {
    let start = Instant::now();
    let spec = TableSpec::new(table, "ts_code", "list_date");
    let mut summary = SyncSummary::new(&spec.name);

    tracing::info!(exchange = exchange.unwrap_or("ALL"), "상장 종목 동기화 시작");

    store.ensure_table(&spec).await?;

    let mut listing = source.stock_basic(exchange).await?;
    let listed = listing.len();

    // 상장일이 없는 종목은 키를 만들 수 없어 제외
    let date_idx = listing.column_index("list_date");
    listing.retain_rows(|_, row| {
        date_idx
            .and_then(|idx| row.get(idx))
            .and_then(value_as_string)
            .is_some()
    });
    if listing.len() < listed {
        tracing::warn!(dropped = listed - listing.len(), "상장일 없는 종목 제외");
    }

    let records = dedup_records(&spec.name, listing.to_records(&spec, formats)?)?;
    let merged = store.merge(&spec, &records, &[]).await?;

    for record in &records {
        summary.record(record.symbol.as_str(), None, SymbolOutcome::Fetched { rows: 1 });
    }

    tracing::info!(listed = listed, merged = merged, "상장 종목 동기화 완료");

    summary.elapsed = start.elapsed();
    Ok(summary)
}
