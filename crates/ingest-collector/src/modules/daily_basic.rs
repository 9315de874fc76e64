//! 일별 지표 드라이버.

use super::{DownloadContext, Downloader};
use crate::engine::{DatasetDescriptor, FetchFn};
use crate::Result;
use async_trait::async_trait;
use ingest_core::TableSpec;

/// 종목 일별 지표. 여러 종목을 한 번에 조회합니다.
pub struct DailyBasicDownloader {
    context: DownloadContext,
    descriptor: DatasetDescriptor,
}

impl DailyBasicDownloader {
    pub fn new(context: DownloadContext) -> Self {
        let table = TableSpec::new(context.tables.daily_basic.as_str(), "ts_code", "trade_date");
        Self {
            descriptor: DatasetDescriptor::new(FetchFn::DailyBasic, table).with_multistocks(true),
            context,
        }
    }
}

#[async_trait]
impl Downloader for DailyBasicDownloader {
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
