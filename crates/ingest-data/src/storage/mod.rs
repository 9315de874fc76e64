//! 커버리지 저장소.
//!
//! 데이터셋별 테이블에 수집된 행을 저장하고, 심볼별로 어디까지 수집했는지
//! (워터마크)를 기록합니다. 마지막 수집 날짜는 워터마크와 테이블의 최대 날짜 중
//! 큰 값입니다.

pub mod memory;
pub mod postgres;

use crate::error::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use ingest_core::{Record, TableSpec};

pub use memory::MemoryCoverageStore;
pub use postgres::PgCoverageStore;

/// 워터마크 테이블 이름.
pub const WATERMARK_TABLE: &str = "sync_watermark";

/// 심볼별 워터마크 갱신 요청.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Watermark {
    pub symbol: String,
    pub covered_through: NaiveDate,
}

impl Watermark {
    pub fn new(symbol: impl Into<String>, covered_through: NaiveDate) -> Self {
        Self {
            symbol: symbol.into(),
            covered_through,
        }
    }
}

/// 데이터셋 행과 워터마크를 저장하는 저장소.
#[async_trait]
pub trait CoverageStore: Send + Sync {
    /// 저장소 이름 (로그용).
    fn name(&self) -> &'static str;

    /// 데이터셋 테이블과 워터마크 테이블이 없으면 생성합니다.
    async fn ensure_table(&self, spec: &TableSpec) -> Result<()>;

    /// 심볼의 마지막 수집 날짜. 수집 이력이 없으면 `None`.
    async fn latest_covered(&self, spec: &TableSpec, symbol: &str) -> Result<Option<NaiveDate>>;

    /// 레코드를 병합하고 워터마크를 함께 갱신합니다.
    ///
    /// 전부 반영되거나 전부 반영되지 않습니다. 키가 겹치는 행은 덮어쓰고,
    /// 워터마크는 뒤로 가지 않습니다. 반영된 행 수를 반환합니다.
    async fn merge(
        &self,
        spec: &TableSpec,
        records: &[Record],
        watermarks: &[Watermark],
    ) -> Result<usize>;

    /// 행 없이 워터마크만 전진시킵니다.
    async fn advance_watermark(&self, spec: &TableSpec, watermark: &Watermark) -> Result<()> {
        self.merge(spec, &[], std::slice::from_ref(watermark)).await.map(|_| ())
    }
}
