//! 데이터셋 드라이버.
//!
//! 드라이버는 데이터셋 정의와 유니버스만 가지고, 실제 동기화는
//! [`SyncEngine`]에 맡깁니다.

pub mod daily;
pub mod daily_basic;
pub mod fina_indicator;
pub mod index_daily;
pub mod index_weight;
pub mod listing_sync;
pub mod trade_cal;
pub mod universe;

pub use daily::DailyDownloader;
pub use daily_basic::DailyBasicDownloader;
pub use fina_indicator::FinaIndicatorDownloader;
pub use index_daily::IndexDailyDownloader;
pub use index_weight::IndexWeightDownloader;
pub use listing_sync::sync_listing;
pub use trade_cal::TradeCalDownloader;
pub use universe::Universe;

use crate::engine::{DatasetDescriptor, SymbolPlan, SyncEngine};
use crate::{Result, SyncSummary};
use async_trait::async_trait;
use chrono::NaiveDate;
use ingest_core::{Adjust, StoreTables};
use std::sync::Arc;

/// 드라이버 공통 실행 환경.
#[derive(Clone)]
pub struct DownloadContext {
    pub engine: Arc<SyncEngine>,
    /// 종목 데이터셋 유니버스
    pub stocks: Universe,
    /// 지수 데이터셋 유니버스
    pub indexes: Universe,
    /// 거래 달력 대상 거래소
    pub exchanges: Vec<String>,
    pub start: NaiveDate,
    pub end: NaiveDate,
    /// 데이터셋 테이블 이름
    pub tables: StoreTables,
}

/// 데이터셋 드라이버.
#[async_trait]
pub trait Downloader: Send + Sync {
    fn descriptor(&self) -> &DatasetDescriptor;

    fn context(&self) -> &DownloadContext;

    /// 동기화할 심볼 목록.
    async fn universe(&self) -> Result<Vec<String>>;

    /// 유니버스 전체를 목표 구간까지 동기화합니다.
    async fn download(&self) -> Result<SyncSummary> {
        let symbols = self.universe().await?;
        let context = self.context();
        let descriptor = self.descriptor();

        if symbols.is_empty() {
            tracing::warn!(dataset = %descriptor.name, "수집할 심볼이 없습니다");
            return Ok(SyncSummary::new(&descriptor.name));
        }

        context
            .engine
            .synchronize(descriptor, &symbols, context.start, context.end)
            .await
    }

    /// 조회 없이 심볼별 윈도우만 계산합니다.
    async fn plan(&self) -> Result<Vec<SymbolPlan>> {
        let symbols = self.universe().await?;
        let context = self.context();
        context
            .engine
            .plan(self.descriptor(), &symbols, context.start, context.end)
            .await
    }

    fn get_table_name(&self) -> &str {
        &self.descriptor().table.name
    }

    fn get_date_column_name(&self) -> &str {
        &self.descriptor().table.date_column
    }
}

/// 전체 드라이버 (실행 순서).
///
/// 거래 달력을 먼저 수집합니다.
pub fn all_downloaders(context: &DownloadContext, adjust: Adjust) -> Vec<Box<dyn Downloader>> {
    vec![
        Box::new(TradeCalDownloader::new(context.clone())),
        Box::new(DailyDownloader::new(context.clone(), adjust)),
        Box::new(DailyBasicDownloader::new(context.clone())),
        Box::new(FinaIndicatorDownloader::new(context.clone())),
        Box::new(IndexDailyDownloader::new(context.clone())),
        Box::new(IndexWeightDownloader::new(context.clone())),
    ]
}
