//! 일봉 드라이버.

use super::{DownloadContext, Downloader};
use crate::engine::{DatasetDescriptor, FetchFn};
use crate::Result;
use async_trait::async_trait;
use ingest_core::{Adjust, TableSpec};

/// 종목 일봉 (수정 방식별 테이블).
pub struct DailyDownloader {
    context: DownloadContext,
    descriptor: DatasetDescriptor,
}

impl DailyDownloader {
    pub fn new(context: DownloadContext, adjust: Adjust) -> Self {
        let table = TableSpec::new(
            adjust.daily_table(&context.tables.daily),
            "ts_code",
            "trade_date",
        );
        Self {
            context,
            descriptor: DatasetDescriptor::new(FetchFn::Daily { adjust }, table),
        }
    }
}

#[async_trait]
impl Downloader for DailyDownloader {
    fn descriptor(&self) -> &DatasetDescriptor {
        &self.descriptor
    }

    fn context(&self) -> &DownloadContext {
        &self.context
    }

    async fn universe(&self) -> Result<Vec<String>> {
        self.context
            .stocks
            .resolve(self.context.engine.source().as_ref())
            .await
    }
}
