//! 지수 구성 종목 비중 드라이버.

use super::{DownloadContext, Downloader};
use crate::engine::{DatasetDescriptor, FetchFn};
use crate::Result;
use async_trait::async_trait;
use ingest_core::TableSpec;

/// 지수별 구성 종목(`con_code`)과 비중. 같은 날짜에 구성 종목 수만큼 행이 있습니다.
pub struct IndexWeightDownloader {
    context: DownloadContext,
    descriptor: DatasetDescriptor,
}

impl IndexWeightDownloader {
    pub fn new(context: DownloadContext) -> Self {
        let table =
            TableSpec::new(context.tables.index_weight.as_str(), "index_code", "trade_date")
                .with_sub_key("con_code");
        Self {
            descriptor: DatasetDescriptor::new(FetchFn::IndexWeight, table),
            context,
        }
    }
}

#[async_trait]
impl Downloader for IndexWeightDownloader {
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
