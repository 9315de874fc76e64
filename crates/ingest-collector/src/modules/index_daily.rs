//! 지수 일봉 드라이버.

use super::{DownloadContext, Downloader};
use crate::engine::{DatasetDescriptor, FetchFn};
use crate::Result;
use async_trait::async_trait;
use ingest_core::TableSpec;

pub struct IndexDailyDownloader {
    context: DownloadContext,
    descriptor: DatasetDescriptor,
}

impl IndexDailyDownloader {
    pub fn new(context: DownloadContext) -> Self {
        let table = TableSpec::new(context.tables.index_daily.as_str(), "ts_code", "trade_date");
        Self {
            descriptor: DatasetDescriptor::new(FetchFn::IndexDaily, table),
            context,
        }
    }
}

#[async_trait]
impl Downloader for IndexDailyDownloader {
    fn descriptor(&self) -> &DatasetDescriptor {
        &self.descriptor
    }

    fn context(&self) -> &DownloadContext {
        &self.context
    }

    async fn universe(&self) -> Result<Vec<String>> {
        self.context
            .indexes
            .resolve(self.context.engine.source().as_ref())
            .await
    }
}
